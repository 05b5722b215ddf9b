// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Shared fixtures: synthetic JPEGs written by the built-in codec, seeded
//! random tensors, and a bridge that counts its calls.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dctjpeg::{
    BaselineCodec, BlockGrid, CodecBridge, CodecError, ColorSpace, ComponentTensor, DecodeBuffers,
    EncodeRequest, JpegInfo, Marker, MarkerKind, SamplingFactor,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

pub const GRAY: &[SamplingFactor] = &[SamplingFactor::ONE];
pub const YCC_444: &[SamplingFactor] = &[SamplingFactor::ONE, SamplingFactor::ONE, SamplingFactor::ONE];
pub const YCC_422: &[SamplingFactor] = &[SamplingFactor::new(2, 1), SamplingFactor::ONE, SamplingFactor::ONE];
pub const YCC_420: &[SamplingFactor] = &[SamplingFactor::new(2, 2), SamplingFactor::ONE, SamplingFactor::ONE];

pub fn rng(seed: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed)
}

/// Sparse coefficients in the range a real baseline encoder produces.
pub fn random_coefficients(grid: BlockGrid, rng: &mut ChaCha20Rng) -> ComponentTensor {
    let mut tensor = ComponentTensor::zeroed(grid);
    for block in tensor.blocks_mut() {
        block[0] = rng.gen_range(-300..=300);
        for _ in 0..rng.gen_range(0..12) {
            let k = rng.gen_range(1..64);
            block[k] = rng.gen_range(-60..=60);
        }
    }
    tensor
}

/// Any 16-bit values; for layout tests only.
pub fn random_tensor(grid: BlockGrid, rng: &mut ChaCha20Rng) -> ComponentTensor {
    let mut tensor = ComponentTensor::zeroed(grid);
    for v in tensor.as_mut_slice() {
        *v = rng.gen();
    }
    tensor
}

pub fn sample_markers() -> Vec<Marker> {
    vec![
        Marker::new(MarkerKind::App(1), b"Exif\0\0fixture".to_vec()).unwrap(),
        Marker::new(MarkerKind::Com, b"synthetic test image".to_vec()).unwrap(),
    ]
}

/// A JPEG written to disk together with the coefficients it holds.
pub struct Fixture {
    pub path: PathBuf,
    pub tensors: Vec<ComponentTensor>,
}

/// Write a `width`×`height` JPEG with random coefficients and quality-90
/// tables.
pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32, sampling: &[SamplingFactor], seed: u64) -> Fixture {
    write_jpeg_with(&BaselineCodec::new(), dir, name, width, height, sampling, seed)
}

/// [`write_jpeg`] through a configured codec, e.g. one with restart
/// intervals.
pub fn write_jpeg_with(
    codec: &BaselineCodec,
    dir: &Path,
    name: &str,
    width: u32,
    height: u32,
    sampling: &[SamplingFactor],
    seed: u64,
) -> Fixture {
    let grids = dctjpeg::geometry::block_grids(width, height, sampling).unwrap();
    let mut rng = rng(seed);
    let tensors: Vec<ComponentTensor> = grids.iter().map(|&g| random_coefficients(g, &mut rng)).collect();
    let ids: Vec<u8> = (0..sampling.len()).map(|i| u8::from(i > 0)).collect();
    let markers = sample_markers();
    let path = dir.join(name);

    codec
        .encode(&EncodeRequest {
            source: None,
            destination: &path,
            y: &tensors[0],
            chroma: (tensors.len() == 3).then(|| (&tensors[1], &tensors[2])),
            width,
            height,
            block_grids: &grids,
            sampling,
            color_space: ColorSpace::default_for(sampling.len()),
            num_components: sampling.len(),
            quant_table_ids: &ids,
            quant_tables: None,
            quality: 90,
            markers: &markers,
        })
        .unwrap();

    Fixture { path, tensors }
}

/// Forwards to [`BaselineCodec`] and counts calls per operation.
#[derive(Default)]
pub struct CountingBridge {
    inner: BaselineCodec,
    reads: AtomicUsize,
    decodes: AtomicUsize,
    encodes: AtomicUsize,
}

impl CountingBridge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }
}

impl CodecBridge for CountingBridge {
    fn name(&self) -> &str {
        "counting"
    }

    fn read_info(&self, src: &Path) -> Result<JpegInfo, CodecError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_info(src)
    }

    fn decode(&self, src: &Path, out: DecodeBuffers<'_>) -> Result<(), CodecError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(src, out)
    }

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), CodecError> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        self.inner.encode(request)
    }
}
