// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

mod common;

use common::{random_tensor, rng, write_jpeg, GRAY, YCC_420};
use dctjpeg::jpegio::FlatCoefficients;
use dctjpeg::{flat_to_native, native_to_flat, to_jpegio, BlockGrid, DctJpeg, Error};
use test_log::test;

#[test]
fn flat_layout_roundtrips_random_tensors() {
    let mut rng = rng(100);
    for (h, w) in [(1, 1), (1, 7), (5, 2), (13, 13)] {
        let tensor = random_tensor(BlockGrid::new(h, w), &mut rng);
        let flat = native_to_flat(&tensor);
        assert_eq!(flat.shape(), (h * 8, w * 8));
        for br in 0..h {
            for bc in 0..w {
                for i in 0..8 {
                    for j in 0..8 {
                        assert_eq!(flat.get(br * 8 + i, bc * 8 + j), tensor.get(br, bc, i, j) as i32);
                    }
                }
            }
        }
        assert_eq!(flat_to_native(&flat).unwrap(), tensor, "{h}x{w}");
    }
}

#[test]
fn jpegio_view_matches_native() {
    let dir = tempfile::tempdir().unwrap();
    let fx = write_jpeg(dir.path(), "io.jpg", 100, 60, YCC_420, 101);
    let mut jpeg = DctJpeg::open(&fx.path).unwrap();
    let tables = *jpeg.quant_tables().unwrap();

    let mut io = to_jpegio(jpeg);
    let arrays = io.coef_arrays().unwrap().to_vec();
    assert_eq!(arrays.len(), 3);
    assert_eq!(arrays[0].shape(), (64, 104));
    assert_eq!(arrays[1].shape(), (32, 56));
    for (flat, native) in arrays.iter().zip(&fx.tensors) {
        assert_eq!(&flat_to_native(flat).unwrap(), native);
    }

    let flat_tables = io.quant_tables().unwrap();
    assert_eq!(flat_tables.len(), 2);
    assert_eq!(flat_tables[0][0][1] as u16, tables.get(0).get(0, 1));
    assert_eq!(flat_tables[1][7][7] as u16, tables.get(1).get(7, 7));
}

#[test]
fn grayscale_view_pads_second_table() {
    let dir = tempfile::tempdir().unwrap();
    let fx = write_jpeg(dir.path(), "gray.jpg", 24, 24, GRAY, 102);
    let mut io = to_jpegio(DctJpeg::open(&fx.path).unwrap());

    assert_eq!(io.coef_arrays().unwrap().len(), 1);
    let tables = io.quant_tables().unwrap();
    assert_eq!(tables.len(), 2);
    assert_ne!(tables[0], [[0; 8]; 8]);
    assert_eq!(tables[1], [[0; 8]; 8]);
}

#[test]
fn writing_the_view_is_not_implemented() {
    let dir = tempfile::tempdir().unwrap();
    let fx = write_jpeg(dir.path(), "w.jpg", 16, 16, GRAY, 103);
    let out = dir.path().join("out.jpg");
    let mut io = to_jpegio(DctJpeg::open(&fx.path).unwrap());

    assert!(matches!(io.write(Some(&out), -1), Err(Error::NotImplemented(_))));
    io.coef_arrays_mut().unwrap()[0].set(0, 0, 5);
    assert!(matches!(io.write(None, 75), Err(Error::NotImplemented(_))));
    assert!(!out.exists());
}

#[test]
fn flat_edits_fold_back_into_native_tensors() {
    let dir = tempfile::tempdir().unwrap();
    let fx = write_jpeg(dir.path(), "edit.jpg", 40, 40, YCC_420, 104);
    let out = dir.path().join("edited.jpg");

    let mut io = to_jpegio(DctJpeg::open(&fx.path).unwrap());
    {
        let arrays = io.coef_arrays_mut().unwrap();
        // Block (2, 3), row 1, column 4.
        arrays[0].set(2 * 8 + 1, 3 * 8 + 4, -77);
        arrays[2].set(0, 0, 250);
    }
    let mut jpeg = io.into_inner().unwrap();
    assert_eq!(jpeg.y().unwrap().get(2, 3, 1, 4), -77);
    jpeg.write_dct(Some(&out), -1).unwrap();

    let mut reread = DctJpeg::open(&out).unwrap();
    assert_eq!(reread.y().unwrap().get(2, 3, 1, 4), -77);
    assert_eq!(reread.cr().unwrap().unwrap().get(0, 0, 0, 0), 250);
    assert_eq!(reread.cb().unwrap().unwrap(), &fx.tensors[1]);
}

#[test]
fn replaced_tables_fold_back() {
    let dir = tempfile::tempdir().unwrap();
    let fx = write_jpeg(dir.path(), "qt.jpg", 16, 16, YCC_420, 105);
    let mut io = to_jpegio(DctJpeg::open(&fx.path).unwrap());

    let mut tables = io.quant_tables().unwrap().to_vec();
    tables[0][0][0] = 3;
    tables[1][4][2] = 9;
    io.set_quant_tables(tables).unwrap();
    let mut jpeg = io.into_inner().unwrap();
    let held = jpeg.quant_tables().unwrap();
    assert_eq!(held.get(0).get(0, 0), 3);
    assert_eq!(held.get(1).get(4, 2), 9);
}

#[test]
fn replacement_arrays_are_validated() {
    let dir = tempfile::tempdir().unwrap();
    let fx = write_jpeg(dir.path(), "bad.jpg", 32, 16, YCC_420, 106);
    let mut io = to_jpegio(DctJpeg::open(&fx.path).unwrap());

    let one = vec![FlatCoefficients::zeroed(16, 32)];
    assert!(matches!(io.set_coef_arrays(one), Err(Error::InvariantViolation(_))));

    let wrong_shape = vec![
        FlatCoefficients::zeroed(16, 32),
        FlatCoefficients::zeroed(16, 16),
        FlatCoefficients::zeroed(8, 8),
    ];
    assert!(matches!(io.set_coef_arrays(wrong_shape), Err(Error::InvariantViolation(_))));

    let right = vec![
        FlatCoefficients::zeroed(16, 32),
        FlatCoefficients::zeroed(8, 16),
        FlatCoefficients::zeroed(8, 16),
    ];
    io.set_coef_arrays(right).unwrap();
    assert!(matches!(io.set_quant_tables(vec![[[1; 8]; 8]]), Err(Error::InvariantViolation(_))));

    let mut jpeg = io.into_inner().unwrap();
    assert!(jpeg.y().unwrap().as_slice().iter().all(|&v| v == 0));
}
