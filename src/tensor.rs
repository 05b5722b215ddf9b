// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Coefficient tensors and quantization tables.
//!
//! [`ComponentTensor`] holds the quantized DCT coefficients of one component
//! as a `(blocks_height, blocks_width, 64)` array of `i16`. The 64 values of
//! a block are in natural row-major order (`index = row * 8 + col`), never
//! zig-zag. [`QuantTables`] always has four slots, indexed by JPEG table id.

use crate::geometry::BlockGrid;

/// Quantized DCT coefficients of one component, block-raster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentTensor {
    grid: BlockGrid,
    /// `grid.height * grid.width` blocks.
    blocks: Vec<[i16; 64]>,
}

impl ComponentTensor {
    /// Allocate a zero-filled tensor for `grid`.
    pub fn zeroed(grid: BlockGrid) -> Self {
        Self {
            grid,
            blocks: vec![[0i16; 64]; grid.total_blocks()],
        }
    }

    /// Wrap existing block-raster data. Returns `None` if the length is not
    /// `grid.coefficients()`.
    pub fn from_vec(grid: BlockGrid, coeffs: Vec<i16>) -> Option<Self> {
        if coeffs.len() != grid.coefficients() {
            return None;
        }
        let blocks = coeffs
            .chunks_exact(64)
            .map(|chunk| std::array::from_fn(|k| chunk[k]))
            .collect();
        Some(Self { grid, blocks })
    }

    pub fn grid(&self) -> BlockGrid {
        self.grid
    }

    pub fn blocks_height(&self) -> usize {
        self.grid.height
    }

    pub fn blocks_width(&self) -> usize {
        self.grid.width
    }

    /// Shape as `(blocks_height, blocks_width, 64)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.grid.height, self.grid.width, 64)
    }

    /// Coefficient `(i, j)` (frequency row / column) of block `(br, bc)`.
    pub fn get(&self, br: usize, bc: usize, i: usize, j: usize) -> i16 {
        debug_assert!(i < 8 && j < 8);
        self.block(br, bc)[i * 8 + j]
    }

    pub fn set(&mut self, br: usize, bc: usize, i: usize, j: usize, val: i16) {
        debug_assert!(i < 8 && j < 8);
        self.block_mut(br, bc)[i * 8 + j] = val;
    }

    /// The 64 coefficients of block `(br, bc)`.
    pub fn block(&self, br: usize, bc: usize) -> &[i16; 64] {
        &self.blocks[self.block_index(br, bc)]
    }

    pub fn block_mut(&mut self, br: usize, bc: usize) -> &mut [i16; 64] {
        let idx = self.block_index(br, bc);
        &mut self.blocks[idx]
    }

    /// Block `(br, bc)` as an 8×8 array.
    pub fn block_8x8(&self, br: usize, bc: usize) -> [[i16; 8]; 8] {
        let block = self.block(br, bc);
        std::array::from_fn(|i| std::array::from_fn(|j| block[i * 8 + j]))
    }

    /// Iterate over blocks in raster order.
    pub fn blocks(&self) -> impl Iterator<Item = &[i16; 64]> {
        self.blocks.iter()
    }

    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut [i16; 64]> {
        self.blocks.iter_mut()
    }

    /// Flat block-raster storage.
    pub fn as_slice(&self) -> &[i16] {
        self.blocks.as_flattened()
    }

    pub fn as_mut_slice(&mut self) -> &mut [i16] {
        self.blocks.as_flattened_mut()
    }

    pub fn into_vec(self) -> Vec<i16> {
        self.blocks.into_iter().flatten().collect()
    }

    fn block_index(&self, br: usize, bc: usize) -> usize {
        assert!(
            br < self.grid.height && bc < self.grid.width,
            "block ({br}, {bc}) outside {}x{} grid",
            self.grid.height,
            self.grid.width
        );
        br * self.grid.width + bc
    }
}

/// One quantization table: 64 divisors in natural (row-major) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantTable {
    pub values: [u16; 64],
}

impl QuantTable {
    pub const fn new(values: [u16; 64]) -> Self {
        Self { values }
    }

    pub const fn zeroed() -> Self {
        Self { values: [0; 64] }
    }

    /// Divisor at frequency `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> u16 {
        self.values[i * 8 + j]
    }

    /// An all-zero slot holds no table.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|&v| v == 0)
    }

    pub fn as_8x8(&self) -> [[u16; 8]; 8] {
        std::array::from_fn(|i| std::array::from_fn(|j| self.values[i * 8 + j]))
    }
}

impl Default for QuantTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// The four quantization table slots of a JPEG image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuantTables {
    slots: [QuantTable; 4],
}

impl QuantTables {
    pub const SLOTS: usize = 4;

    pub const fn zeroed() -> Self {
        Self {
            slots: [QuantTable::zeroed(); 4],
        }
    }

    pub const fn new(slots: [QuantTable; 4]) -> Self {
        Self { slots }
    }

    /// Table in slot `id` (0–3). Panics on an out-of-range id.
    pub fn get(&self, id: usize) -> &QuantTable {
        &self.slots[id]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut QuantTable {
        &mut self.slots[id]
    }

    pub fn set(&mut self, id: usize, table: QuantTable) {
        self.slots[id] = table;
    }

    /// All four slots, including unpopulated ones.
    pub fn all(&self) -> &[QuantTable; 4] {
        &self.slots
    }

    /// The leading slots that are meaningful for an image with
    /// `num_components` components.
    pub fn populated(&self, num_components: usize) -> &[QuantTable] {
        &self.slots[..num_components.min(Self::SLOTS)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_get_set() {
        let mut t = ComponentTensor::zeroed(BlockGrid::new(3, 2));
        assert_eq!(t.shape(), (3, 2, 64));
        assert_eq!(t.get(2, 1, 7, 7), 0);

        t.set(1, 0, 3, 4, 42);
        assert_eq!(t.get(1, 0, 3, 4), 42);
        assert_eq!(t.block(1, 0)[3 * 8 + 4], 42);
        assert_eq!(t.block_8x8(1, 0)[3][4], 42);
        assert_eq!(t.get(0, 0, 3, 4), 0);
    }

    #[test]
    fn block_mut_is_natural_order() {
        let mut t = ComponentTensor::zeroed(BlockGrid::new(2, 2));
        for (i, v) in t.block_mut(1, 1).iter_mut().enumerate() {
            *v = i as i16;
        }
        assert_eq!(t.get(1, 1, 0, 1), 1);
        assert_eq!(t.get(1, 1, 1, 0), 8);
        assert_eq!(t.get(1, 1, 7, 7), 63);
        assert!(t.block(0, 0).iter().all(|&v| v == 0));
    }

    #[test]
    fn blocks_iterate_in_raster_order() {
        let mut t = ComponentTensor::zeroed(BlockGrid::new(2, 3));
        for (n, block) in t.blocks_mut().enumerate() {
            block[0] = n as i16;
        }
        assert_eq!(t.get(0, 2, 0, 0), 2);
        assert_eq!(t.get(1, 0, 0, 0), 3);
        assert_eq!(t.blocks().count(), 6);
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(ComponentTensor::from_vec(BlockGrid::new(1, 1), vec![0; 63]).is_none());
        let t = ComponentTensor::from_vec(BlockGrid::new(1, 2), vec![7; 128]).unwrap();
        assert_eq!(t.get(0, 1, 7, 7), 7);
    }

    #[test]
    #[should_panic]
    fn out_of_grid_block_panics() {
        let t = ComponentTensor::zeroed(BlockGrid::new(1, 1));
        let _ = t.block(0, 1);
    }

    #[test]
    fn quant_tables_always_have_four_slots() {
        let mut qt = QuantTables::zeroed();
        assert_eq!(qt.all().len(), 4);
        assert!(qt.get(3).is_empty());

        let mut vals = [1u16; 64];
        vals[63] = 99;
        qt.set(1, QuantTable::new(vals));
        assert_eq!(qt.get(1).get(7, 7), 99);
        assert_eq!(qt.populated(1).len(), 1);
        assert_eq!(qt.populated(3).len(), 3);
        assert_eq!(qt.populated(9).len(), 4);
    }
}
