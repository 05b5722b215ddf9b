// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Image metadata reported by a bridge: dimensions, sampling, color space
//! and the application/comment markers carried through a rewrite.

use std::fmt;

use crate::geometry::{self, BlockGrid, SamplingFactor};
use crate::error::{Error, Result};

/// JPEG color space, named after libjpeg's `J_COLOR_SPACE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    #[default]
    Unknown,
    Grayscale,
    Rgb,
    YCbCr,
    Cmyk,
    Ycck,
}

impl ColorSpace {
    /// The color space a decoder assumes when the stream carries no
    /// explicit indication (JFIF / Adobe marker).
    pub fn default_for(num_components: usize) -> Self {
        match num_components {
            1 => Self::Grayscale,
            3 => Self::YCbCr,
            4 => Self::Cmyk,
            _ => Self::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "JCS_UNKNOWN",
            Self::Grayscale => "JCS_GRAYSCALE",
            Self::Rgb => "JCS_RGB",
            Self::YCbCr => "JCS_YCbCr",
            Self::Cmyk => "JCS_CMYK",
            Self::Ycck => "JCS_YCCK",
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type of a preserved marker segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// `APP0`–`APP15` (0xFFE0–0xFFEF).
    App(u8),
    /// Comment (0xFFFE).
    Com,
    /// Any other marker code that carries a payload.
    Other(u8),
}

impl MarkerKind {
    /// Marker code without the 0xFF prefix.
    pub fn code(self) -> u8 {
        match self {
            Self::App(n) => 0xE0 + (n & 0x0F),
            Self::Com => 0xFE,
            Self::Other(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0xE0..=0xEF => Self::App(code - 0xE0),
            0xFE => Self::Com,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App(n) => write!(f, "APP{n}"),
            Self::Com => f.write_str("COM"),
            Self::Other(code) => write!(f, "0xFF{code:02X}"),
        }
    }
}

/// A marker segment (type, length, payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub payload: Vec<u8>,
}

impl Marker {
    /// Largest payload that fits the 16-bit segment length field.
    pub const MAX_PAYLOAD: usize = u16::MAX as usize - 2;

    pub fn new(kind: MarkerKind, payload: Vec<u8>) -> Result<Self> {
        let marker = Self { kind, payload };
        marker.validate()?;
        Ok(marker)
    }

    /// Segment length as written on the wire (payload + the length field).
    pub fn length(&self) -> usize {
        self.payload.len() + 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.payload.len() > Self::MAX_PAYLOAD {
            return Err(Error::invalid_argument(format!(
                "{} marker payload of {} bytes exceeds {}",
                self.kind,
                self.payload.len(),
                Self::MAX_PAYLOAD
            )));
        }
        Ok(())
    }
}

/// Header information of a JPEG stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Sampling factors, one per component.
    pub sampling: Vec<SamplingFactor>,
    /// Quantization table id used by each component.
    pub quant_table_ids: Vec<u8>,
    pub color_space: ColorSpace,
    /// APPn / COM segments in stream order.
    pub markers: Vec<Marker>,
}

impl JpegInfo {
    pub fn num_components(&self) -> usize {
        self.sampling.len()
    }

    pub fn has_chrominance(&self) -> bool {
        self.num_components() > 1
    }

    pub fn block_grid(&self, component: usize) -> Result<BlockGrid> {
        geometry::block_grid(self.width, self.height, component, &self.sampling)
    }

    pub fn block_grids(&self) -> Result<Vec<BlockGrid>> {
        geometry::block_grids(self.width, self.height, &self.sampling)
    }
}
