// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Frame header (SOF0 / SOF1 / SOF2).

use crate::bridge::CodecError;
use crate::geometry::{self, BlockGrid, SamplingFactor};

use super::marker::{SOF0, SOF1, SOF2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameComponent {
    pub id: u8,
    pub sampling: SamplingFactor,
    pub quant_table_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// SOF marker code the frame was read from or will be written with.
    pub marker: u8,
    pub width: u16,
    pub height: u16,
    pub components: Vec<FrameComponent>,
}

impl Frame {
    pub fn parse(marker: u8, data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < 6 {
            return Err(CodecError::UnexpectedEof);
        }
        let precision = data[0];
        if precision != 8 {
            return Err(CodecError::UnsupportedPrecision(precision));
        }
        let height = u16::from_be_bytes([data[1], data[2]]);
        let width = u16::from_be_bytes([data[3], data[4]]);
        let count = data[5] as usize;
        // Height 0 would defer to a DNL marker, which baseline files never use.
        if width == 0 || height == 0 || count == 0 || count > 4 {
            return Err(CodecError::InvalidDimensions);
        }
        let specs = data
            .get(6..6 + count * 3)
            .ok_or(CodecError::UnexpectedEof)?;

        let mut components = Vec::with_capacity(count);
        for spec in specs.chunks_exact(3) {
            let sampling = SamplingFactor::new(spec[1] >> 4, spec[1] & 0x0F);
            if !(1..=4).contains(&sampling.h) || !(1..=4).contains(&sampling.v) {
                return Err(CodecError::InvalidDimensions);
            }
            if spec[2] > 3 {
                return Err(CodecError::InvalidQuantTableId(spec[2]));
            }
            components.push(FrameComponent {
                id: spec[0],
                sampling,
                quant_table_id: spec[2],
            });
        }

        Ok(Self {
            marker,
            width,
            height,
            components,
        })
    }

    /// Spectral-selection / successive-approximation frame.
    pub fn is_progressive(&self) -> bool {
        self.marker == SOF2
    }

    pub fn max_h(&self) -> u8 {
        self.components.iter().map(|c| c.sampling.h).max().unwrap_or(1)
    }

    pub fn max_v(&self) -> u8 {
        self.components.iter().map(|c| c.sampling.v).max().unwrap_or(1)
    }

    /// MCU columns of an interleaved scan.
    pub fn mcus_x(&self) -> usize {
        (self.width as usize).div_ceil(8 * self.max_h() as usize)
    }

    /// MCU rows of an interleaved scan.
    pub fn mcus_y(&self) -> usize {
        (self.height as usize).div_ceil(8 * self.max_v() as usize)
    }

    pub fn sampling(&self) -> Vec<SamplingFactor> {
        self.components.iter().map(|c| c.sampling).collect()
    }

    pub fn quant_table_ids(&self) -> Vec<u8> {
        self.components.iter().map(|c| c.quant_table_id).collect()
    }

    /// Coefficient block grid of every component.
    pub fn block_grids(&self) -> Result<Vec<BlockGrid>, CodecError> {
        geometry::block_grids(self.width as u32, self.height as u32, &self.sampling())
            .map_err(|_| CodecError::InvalidDimensions)
    }

    pub fn component_index(&self, id: u8) -> Result<usize, CodecError> {
        self.components
            .iter()
            .position(|c| c.id == id)
            .ok_or(CodecError::UnknownComponentId(id))
    }

    /// SOF body (8-bit precision).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6 + self.components.len() * 3);
        out.push(8);
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&self.width.to_be_bytes());
        out.push(self.components.len() as u8);
        for c in &self.components {
            out.push(c.id);
            out.push((c.sampling.h << 4) | c.sampling.v);
            out.push(c.quant_table_id);
        }
        out
    }

    /// Marker to write: SOF1 when any table needs 16-bit precision.
    pub fn marker_for(wide_tables: bool) -> u8 {
        if wide_tables {
            SOF1
        } else {
            SOF0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sof_420(width: u16, height: u16) -> Vec<u8> {
        let mut body = vec![8];
        body.extend_from_slice(&height.to_be_bytes());
        body.extend_from_slice(&width.to_be_bytes());
        body.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
        body
    }

    #[test]
    fn parses_420_frame() {
        let frame = Frame::parse(SOF0, &sof_420(100, 75)).unwrap();
        assert_eq!(frame.components.len(), 3);
        assert_eq!(frame.max_h(), 2);
        assert_eq!(frame.mcus_x(), 7);
        assert_eq!(frame.mcus_y(), 5);
        assert_eq!(frame.quant_table_ids(), vec![0, 1, 1]);
        let grids = frame.block_grids().unwrap();
        assert_eq!(grids[0], BlockGrid::new(10, 13));
        assert_eq!(grids[1], BlockGrid::new(5, 7));
        assert_eq!(frame.component_index(3).unwrap(), 2);
        assert!(matches!(
            frame.component_index(9),
            Err(CodecError::UnknownComponentId(9))
        ));
    }

    #[test]
    fn progressive_frame_keeps_its_marker() {
        let frame = Frame::parse(SOF2, &sof_420(32, 32)).unwrap();
        assert!(frame.is_progressive());
        assert!(!Frame::parse(SOF1, &sof_420(32, 32)).unwrap().is_progressive());
        assert_eq!(Frame::marker_for(false), SOF0);
    }

    #[test]
    fn body_roundtrip() {
        let body = sof_420(640, 480);
        let frame = Frame::parse(SOF0, &body).unwrap();
        assert_eq!(frame.to_bytes(), body);
    }

    #[test]
    fn rejects_12_bit() {
        let mut body = sof_420(8, 8);
        body[0] = 12;
        assert!(matches!(
            Frame::parse(SOF1, &body),
            Err(CodecError::UnsupportedPrecision(12))
        ));
    }

    #[test]
    fn rejects_zero_height() {
        assert!(matches!(
            Frame::parse(SOF0, &sof_420(16, 0)),
            Err(CodecError::InvalidDimensions)
        ));
    }
}
