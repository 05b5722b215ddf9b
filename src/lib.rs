// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! # dctjpeg
//!
//! Read, edit and rewrite the quantized DCT coefficients of JPEG images
//! without going through pixels.
//!
//! - [`DctJpeg`] holds one image. Luminance and chrominance tensors and the
//!   quantization tables are decoded lazily on first access, can be edited
//!   in place, and are written back verbatim by [`DctJpeg::write_dct`].
//! - [`jpegio`] converts between the native `[block_row][block_col][8][8]`
//!   layout and the flat raster layout used by jpegio.
//! - [`version`] selects which codec bridge serves decode and encode calls.
//!   The built-in [`BaselineCodec`] reads sequential and progressive
//!   Huffman JPEG and writes sequential JPEG.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use dctjpeg::DctJpeg;
//!
//! let mut jpeg = DctJpeg::open("photo.jpg")?;
//! let y = jpeg.y_mut()?;
//! y.set(0, 0, 0, 1, y.get(0, 0, 0, 1) + 1);
//! jpeg.write_dct(Some("edited.jpg".as_ref()), -1)?;
//! ```

pub mod bridge;
pub mod dct_jpeg;
pub mod error;
pub mod geometry;
pub mod info;
pub mod jpegio;
pub mod scratch;
pub mod tensor;
pub mod version;

pub use bridge::{BaselineCodec, CodecBridge, CodecError, DecodeBuffers, EncodeRequest};
pub use dct_jpeg::{DctJpeg, DctView, IN_MEMORY_PATH};
pub use error::{Error, Result};
pub use geometry::{block_grid, BlockGrid, SamplingFactor};
pub use info::{ColorSpace, JpegInfo, Marker, MarkerKind};
pub use jpegio::{flat_to_native, native_to_flat, to_jpegio, DctJpegio, FlatCoefficients};
pub use tensor::{ComponentTensor, QuantTable, QuantTables};
pub use version::{Version, VersionGuard};
