// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Block-grid geometry for subsampled components.
//!
//! Buffers are sized here before the decode bridge fills them, so the
//! padding rule must be exactly the one the bridge uses: ceiling division
//! once for subsampling and once more for the 8×8 block stage.

use crate::error::{Error, Result};

/// Horizontal and vertical sampling factors of one component (1–4 each).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplingFactor {
    pub h: u8,
    pub v: u8,
}

impl SamplingFactor {
    pub const fn new(h: u8, v: u8) -> Self {
        Self { h, v }
    }

    /// Factor of an unsubsampled component.
    pub const ONE: Self = Self::new(1, 1);
}

impl Default for SamplingFactor {
    fn default() -> Self {
        Self::ONE
    }
}

/// Block-grid dimensions of one component plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockGrid {
    /// Number of 8×8 blocks vertically.
    pub height: usize,
    /// Number of 8×8 blocks horizontally.
    pub width: usize,
}

impl BlockGrid {
    pub const fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    pub fn total_blocks(&self) -> usize {
        self.height * self.width
    }

    /// Number of coefficients stored for this grid (64 per block).
    pub fn coefficients(&self) -> usize {
        self.total_blocks() * 64
    }
}

/// Compute the block grid of component `component`.
///
/// `blocks = ceil(ceil(pixels * factor / max_factor) / 8)` along each axis.
pub fn block_grid(
    width: u32,
    height: u32,
    component: usize,
    sampling: &[SamplingFactor],
) -> Result<BlockGrid> {
    let factor = sampling.get(component).ok_or_else(|| {
        Error::invalid_argument(format!(
            "component {component} out of range for {} components",
            sampling.len()
        ))
    })?;
    if sampling.iter().any(|s| s.h == 0 || s.v == 0 || s.h > 4 || s.v > 4) {
        return Err(Error::invalid_argument("sampling factors must be in 1..=4"));
    }
    let max_h = sampling.iter().map(|s| s.h).max().unwrap_or(1) as u64;
    let max_v = sampling.iter().map(|s| s.v).max().unwrap_or(1) as u64;

    let comp_width = (width as u64 * factor.h as u64).div_ceil(max_h);
    let comp_height = (height as u64 * factor.v as u64).div_ceil(max_v);

    Ok(BlockGrid {
        height: comp_height.div_ceil(8) as usize,
        width: comp_width.div_ceil(8) as usize,
    })
}

/// Block grids of every component, in component order.
pub fn block_grids(width: u32, height: u32, sampling: &[SamplingFactor]) -> Result<Vec<BlockGrid>> {
    (0..sampling.len())
        .map(|i| block_grid(width, height, i, sampling))
        .collect()
}
