// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! The jpegio interchange layout.
//!
//! jpegio exposes each component as one flat `i32` raster of shape
//! `(blocks_height * 8, blocks_width * 8)`: block `(r, c)` occupies rows
//! `8r..8r + 8` and columns `8c..8c + 8`, coefficients in natural order.
//!
//! Tiles are not transposed. Coefficient `(i, j)` of block `(r, c)` (row
//! `i` is the vertical frequency, column `j` the horizontal one) sits at
//! raster position `(8r + i, 8c + j)`, so the raster is row-major within
//! each tile exactly as [`ComponentTensor::get`] indexes a block.
//!
//! Quantization tables are the first two slots as `8×8` `i32` arrays,
//! `table[i][j]` being the divisor of coefficient `(i, j)`.

use std::path::Path;

use crate::dct_jpeg::DctJpeg;
use crate::error::{Error, Result};
use crate::geometry::BlockGrid;
use crate::tensor::{ComponentTensor, QuantTable, QuantTables};

/// A quantization table in interchange form.
pub type FlatQuantTable = [[i32; 8]; 8];

/// One component as a flat coefficient raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatCoefficients {
    rows: usize,
    cols: usize,
    /// Row-major, `rows * cols` values.
    data: Vec<i32>,
}

impl FlatCoefficients {
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<i32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvariantViolation(format!(
                "{} values do not fill a {rows}x{cols} raster",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: i32) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[i32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.data
    }
}

/// Native block tensor → flat raster.
pub fn native_to_flat(tensor: &ComponentTensor) -> FlatCoefficients {
    let grid = tensor.grid();
    let mut flat = FlatCoefficients::zeroed(grid.height * 8, grid.width * 8);
    for br in 0..grid.height {
        for bc in 0..grid.width {
            for (k, &v) in tensor.block(br, bc).iter().enumerate() {
                flat.set(br * 8 + k / 8, bc * 8 + k % 8, v as i32);
            }
        }
    }
    flat
}

/// Flat raster → native block tensor. Exact inverse of [`native_to_flat`].
pub fn flat_to_native(flat: &FlatCoefficients) -> Result<ComponentTensor> {
    if flat.rows % 8 != 0 || flat.cols % 8 != 0 {
        return Err(Error::InvariantViolation(format!(
            "raster {}x{} is not a whole number of 8x8 blocks",
            flat.rows, flat.cols
        )));
    }
    let grid = BlockGrid::new(flat.rows / 8, flat.cols / 8);
    let mut tensor = ComponentTensor::zeroed(grid);
    for br in 0..grid.height {
        for bc in 0..grid.width {
            let block = tensor.block_mut(br, bc);
            for (k, slot) in block.iter_mut().enumerate() {
                let (row, col) = (br * 8 + k / 8, bc * 8 + k % 8);
                let v = flat.get(row, col);
                *slot = i16::try_from(v).map_err(|_| {
                    Error::InvariantViolation(format!("coefficient {v} at ({row}, {col}) exceeds 16 bits"))
                })?;
            }
        }
    }
    Ok(tensor)
}

pub fn quant_table_to_flat(table: &QuantTable) -> FlatQuantTable {
    let mut flat = [[0i32; 8]; 8];
    for (k, &v) in table.values.iter().enumerate() {
        flat[k / 8][k % 8] = v as i32;
    }
    flat
}

pub fn flat_to_quant_table(flat: &FlatQuantTable) -> Result<QuantTable> {
    let mut values = [0u16; 64];
    for (k, slot) in values.iter_mut().enumerate() {
        let v = flat[k / 8][k % 8];
        *slot = u16::try_from(v)
            .map_err(|_| Error::InvariantViolation(format!("quantizer {v} outside 0..=65535")))?;
    }
    Ok(QuantTable::new(values))
}

/// A [`DctJpeg`] seen through the jpegio layout.
///
/// The flat arrays are computed on first access and cached. Edits made to
/// them are folded back into the native tensors by [`into_inner`]; they
/// cannot be written directly.
///
/// [`into_inner`]: DctJpegio::into_inner
#[derive(Debug)]
pub struct DctJpegio {
    inner: DctJpeg,
    coef_arrays: Option<Vec<FlatCoefficients>>,
    quant_tables: Option<Vec<FlatQuantTable>>,
}

/// Wrap `jpeg` in the interchange view.
pub fn to_jpegio(jpeg: DctJpeg) -> DctJpegio {
    DctJpegio {
        inner: jpeg,
        coef_arrays: None,
        quant_tables: None,
    }
}

impl DctJpegio {
    /// `[Y', Cb', Cr']`, or `[Y']` for grayscale.
    pub fn coef_arrays(&mut self) -> Result<&[FlatCoefficients]> {
        Ok(self.cached_coef_arrays()?.as_slice())
    }

    pub fn coef_arrays_mut(&mut self) -> Result<&mut [FlatCoefficients]> {
        Ok(self.cached_coef_arrays()?.as_mut_slice())
    }

    fn cached_coef_arrays(&mut self) -> Result<&mut Vec<FlatCoefficients>> {
        if self.coef_arrays.is_none() {
            let view = self.inner.read_dct()?;
            let mut arrays = vec![native_to_flat(view.y)];
            if let Some((cb, cr)) = view.chroma {
                arrays.push(native_to_flat(cb));
                arrays.push(native_to_flat(cr));
            }
            self.coef_arrays = Some(arrays);
        }
        self.coef_arrays
            .as_mut()
            .ok_or_else(|| Error::InvariantViolation("coefficient arrays not cached".into()))
    }

    /// Tables 0 and 1. Slot 1 is all zeros for grayscale images.
    pub fn quant_tables(&mut self) -> Result<&[FlatQuantTable]> {
        if self.quant_tables.is_none() {
            let tables = self.inner.quant_tables()?;
            self.quant_tables = Some(vec![
                quant_table_to_flat(tables.get(0)),
                quant_table_to_flat(tables.get(1)),
            ]);
        }
        self.quant_tables
            .as_deref()
            .ok_or_else(|| Error::InvariantViolation("quantization tables not cached".into()))
    }

    /// Replace the coefficient arrays; one per component, each the shape of
    /// that component's block grid.
    pub fn set_coef_arrays(&mut self, arrays: Vec<FlatCoefficients>) -> Result<()> {
        if arrays.len() != self.inner.num_components() {
            return Err(Error::InvariantViolation(format!(
                "{} coefficient arrays for {} components",
                arrays.len(),
                self.inner.num_components()
            )));
        }
        for (component, array) in arrays.iter().enumerate() {
            let grid = self.inner.block_grid(component)?;
            if array.shape() != (grid.height * 8, grid.width * 8) {
                return Err(Error::InvariantViolation(format!(
                    "component {component}: raster {:?} does not match {}x{} blocks",
                    array.shape(),
                    grid.height,
                    grid.width
                )));
            }
        }
        self.coef_arrays = Some(arrays);
        Ok(())
    }

    /// Replace tables 0 and 1.
    pub fn set_quant_tables(&mut self, tables: Vec<FlatQuantTable>) -> Result<()> {
        if tables.len() != 2 {
            return Err(Error::InvariantViolation(format!(
                "expected 2 quantization tables, got {}",
                tables.len()
            )));
        }
        self.quant_tables = Some(tables);
        Ok(())
    }

    pub fn inner(&self) -> &DctJpeg {
        &self.inner
    }

    /// Always fails: the interchange view cannot be written. Convert back
    /// with [`into_inner`](Self::into_inner) and use
    /// [`DctJpeg::write_dct`].
    pub fn write(&self, _destination: Option<&Path>, _quality: i32) -> Result<()> {
        Err(Error::NotImplemented("writing the jpegio layout"))
    }

    /// Convert cached or replaced interchange arrays back into native
    /// tensors and return the coefficient object.
    pub fn into_inner(self) -> Result<DctJpeg> {
        let Self {
            mut inner,
            coef_arrays,
            quant_tables,
        } = self;

        if let Some(arrays) = coef_arrays {
            let mut tensors = arrays.iter().map(flat_to_native);
            if let Some(y) = tensors.next() {
                inner.set_y(y?)?;
            }
            if let (Some(cb), Some(cr)) = (tensors.next(), tensors.next()) {
                inner.set_cb(cb?)?;
                inner.set_cr(cr?)?;
            }
        }

        if let Some(flat) = quant_tables {
            let mut tables: QuantTables = *inner.quant_tables()?;
            for (id, table) in flat.iter().enumerate() {
                tables.set(id, flat_to_quant_table(table)?);
            }
            inner.set_quant_tables(tables);
        }

        Ok(inner)
    }
}
