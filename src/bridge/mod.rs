// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! The codec bridge: the decode/encode capability the coefficient model
//! calls into.
//!
//! The contract is path based. A decode fills buffers the caller has
//! already sized with [`geometry::block_grid`](crate::geometry::block_grid);
//! an encode entropy-codes the given coefficients under the given tables and
//! writes a complete JPEG stream to the destination path. Neither direction
//! performs a DCT or requantizes coefficients.
//!
//! [`BaselineCodec`] is the built-in implementation. Other implementations
//! can be installed per library version through
//! [`version::register`](crate::version::register).

pub mod baseline;

use std::path::Path;

use thiserror::Error;

use crate::geometry::{BlockGrid, SamplingFactor};
use crate::info::{ColorSpace, JpegInfo, Marker};
use crate::tensor::{ComponentTensor, QuantTables};

pub use baseline::BaselineCodec;

/// Failures reported by a codec bridge.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing SOI marker (not a JPEG)")]
    InvalidSoi,
    #[error("unexpected end of JPEG data")]
    UnexpectedEof,
    #[error("unsupported JPEG marker: 0xFF{0:02X}")]
    UnsupportedMarker(u8),
    #[error("unsupported sample precision: {0}-bit")]
    UnsupportedPrecision(u8),
    #[error("invalid marker data: {0}")]
    InvalidMarkerData(&'static str),
    #[error("invalid quantization table ID: {0}")]
    InvalidQuantTableId(u8),
    #[error("invalid Huffman table ID: {0}")]
    InvalidHuffmanTableId(u8),
    #[error("unknown component ID in SOS: {0}")]
    UnknownComponentId(u8),
    #[error("Huffman decode error")]
    HuffmanDecode,
    #[error("invalid image dimensions or sampling factors")]
    InvalidDimensions,
    #[error("component {component}: stream has {expected:?} blocks, buffer has {actual:?}")]
    GeometryMismatch {
        component: usize,
        expected: BlockGrid,
        actual: BlockGrid,
    },
    #[error("stream has {expected} components, buffers provide {actual}")]
    ComponentCountMismatch { expected: usize, actual: usize },
    #[error("quality {0} outside -1..=100")]
    InvalidQuality(i32),
    #[error("value out of range: {0}")]
    ValueOutOfRange(&'static str),
}

/// Output buffers of a decode call, pre-sized by the caller.
pub struct DecodeBuffers<'a> {
    pub y: &'a mut ComponentTensor,
    /// `Cb` and `Cr`, present for color images only.
    pub chroma: Option<(&'a mut ComponentTensor, &'a mut ComponentTensor)>,
    /// All four table slots; slots the stream does not define are zeroed.
    pub quant_tables: &'a mut QuantTables,
}

/// Everything an encode call needs.
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    /// Scratch copy of the stream the coefficients came from, if any.
    pub source: Option<&'a Path>,
    pub destination: &'a Path,
    pub y: &'a ComponentTensor,
    pub chroma: Option<(&'a ComponentTensor, &'a ComponentTensor)>,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Block grid of each component.
    pub block_grids: &'a [BlockGrid],
    pub sampling: &'a [SamplingFactor],
    pub color_space: ColorSpace,
    pub num_components: usize,
    /// Quantization table id of each component.
    pub quant_table_ids: &'a [u8],
    /// Tables to write verbatim. `None` derives them from `quality`.
    pub quant_tables: Option<&'a QuantTables>,
    /// `-1` keeps `quant_tables` (or the library default); `0..=100` derives
    /// tables from the quality factor.
    pub quality: i32,
    pub markers: &'a [Marker],
}

impl EncodeRequest<'_> {
    /// Component tensors in component order.
    pub fn components(&self) -> Vec<&ComponentTensor> {
        let mut comps = vec![self.y];
        if let Some((cb, cr)) = self.chroma {
            comps.push(cb);
            comps.push(cr);
        }
        comps
    }
}

/// A decode/encode backend for DCT coefficient access.
pub trait CodecBridge: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Read header information without decoding coefficients.
    fn read_info(&self, src: &Path) -> Result<JpegInfo, CodecError>;

    /// Decode coefficients and quantization tables into `out`.
    fn decode(&self, src: &Path, out: DecodeBuffers<'_>) -> Result<(), CodecError>;

    /// Entropy-code the request's coefficients and write a JPEG stream.
    fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), CodecError>;
}
