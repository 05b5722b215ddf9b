// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! The DCT coefficient object.
//!
//! A [`DctJpeg`] holds the source bytes of one JPEG and its header
//! information. Coefficient tensors and quantization tables are decoded on
//! first access and cached; callers edit them in place or replace them, and
//! [`DctJpeg::write_dct`] re-serializes whatever is held.
//!
//! Each field is materialized independently. The first access to a field
//! that is not yet held runs one decode, which fills only the fields still
//! missing, so a tensor set before the first read is never overwritten.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bridge::{CodecBridge, DecodeBuffers, EncodeRequest};
use crate::error::{Error, Result};
use crate::geometry::{BlockGrid, SamplingFactor};
use crate::info::{ColorSpace, JpegInfo, Marker};
use crate::scratch::ScratchFile;
use crate::tensor::{ComponentTensor, QuantTable, QuantTables};
use crate::version;

/// Path reported in errors about a JPEG that only exists in memory.
pub const IN_MEMORY_PATH: &str = "<memory>";

/// Coefficients and tables returned by [`DctJpeg::read_dct`].
#[derive(Debug, Clone, Copy)]
pub struct DctView<'a> {
    pub y: &'a ComponentTensor,
    /// `(Cb, Cr)` for color images.
    pub chroma: Option<(&'a ComponentTensor, &'a ComponentTensor)>,
    /// The first `num_components` table slots.
    pub quant_tables: &'a [QuantTable],
}

/// DCT-domain view of one JPEG image.
pub struct DctJpeg {
    path: Option<PathBuf>,
    content: Vec<u8>,
    info: JpegInfo,
    bridge: Option<Arc<dyn CodecBridge>>,
    y: Option<ComponentTensor>,
    cb: Option<ComponentTensor>,
    cr: Option<ComponentTensor>,
    quant_tables: Option<QuantTables>,
}

impl DctJpeg {
    /// Open a JPEG file. Only the header is read; coefficients are decoded
    /// on first access with the bridge of the version active at that time.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::load(Some(path.to_path_buf()), content, None)
    }

    /// Wrap an in-memory JPEG.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::load(None, bytes.into(), None)
    }

    /// Like [`open`](Self::open), but every bridge call goes to `bridge`
    /// instead of the version selector.
    pub fn open_with(path: impl AsRef<Path>, bridge: Arc<dyn CodecBridge>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::load(Some(path.to_path_buf()), content, Some(bridge))
    }

    /// Like [`from_bytes`](Self::from_bytes) with a fixed bridge.
    pub fn from_bytes_with(bytes: impl Into<Vec<u8>>, bridge: Arc<dyn CodecBridge>) -> Result<Self> {
        Self::load(None, bytes.into(), Some(bridge))
    }

    fn load(path: Option<PathBuf>, content: Vec<u8>, bridge: Option<Arc<dyn CodecBridge>>) -> Result<Self> {
        let scratch = ScratchFile::with_contents(&content)?;
        let active = bridge.clone().unwrap_or_else(version::bridge);
        let info = active
            .read_info(scratch.path())
            .map_err(|e| Error::codec("read_info", error_path(path.as_deref()), e))?;

        match info.num_components() {
            1 | 3 => {}
            n => {
                return Err(Error::invalid_argument(format!(
                    "{n}-component images are not supported, expected 1 or 3"
                )))
            }
        }
        info.block_grids()?;

        tracing::debug!(
            path = ?path,
            bridge = active.name(),
            width = info.width,
            height = info.height,
            components = info.num_components(),
            "opened JPEG"
        );

        Ok(Self {
            path,
            content,
            info,
            bridge,
            y: None,
            cb: None,
            cr: None,
            quant_tables: None,
        })
    }

    fn bridge(&self) -> Arc<dyn CodecBridge> {
        self.bridge.clone().unwrap_or_else(version::bridge)
    }


    fn is_materialized(&self) -> bool {
        let chroma_ok = !self.has_chrominance() || (self.cb.is_some() && self.cr.is_some());
        self.y.is_some() && self.quant_tables.is_some() && chroma_ok
    }

    /// Decode once and fill every field that is not yet held.
    fn materialize(&mut self) -> Result<()> {
        if self.is_materialized() {
            return Ok(());
        }
        let grids = self.info.block_grids()?;
        let mut y = ComponentTensor::zeroed(grids[0]);
        let mut chroma = self
            .has_chrominance()
            .then(|| (ComponentTensor::zeroed(grids[1]), ComponentTensor::zeroed(grids[2])));
        let mut tables = QuantTables::zeroed();

        let scratch = ScratchFile::with_contents(&self.content)?;
        let bridge = self.bridge();
        bridge
            .decode(
                scratch.path(),
                DecodeBuffers {
                    y: &mut y,
                    chroma: chroma.as_mut().map(|(cb, cr)| (cb, cr)),
                    quant_tables: &mut tables,
                },
            )
            .map_err(|e| Error::codec("decode", error_path(self.path.as_deref()), e))?;

        tracing::debug!(
            bridge = bridge.name(),
            y = self.y.is_none(),
            chroma = chroma.is_some() && self.cb.is_none(),
            quant_tables = self.quant_tables.is_none(),
            "materialized DCT coefficients"
        );

        if self.y.is_none() {
            self.y = Some(y);
        }
        if let Some((cb, cr)) = chroma {
            if self.cb.is_none() {
                self.cb = Some(cb);
            }
            if self.cr.is_none() {
                self.cr = Some(cr);
            }
        }
        if self.quant_tables.is_none() {
            self.quant_tables = Some(tables);
        }
        Ok(())
    }

    /// Decode (if needed) and return every tensor and the populated tables.
    pub fn read_dct(&mut self) -> Result<DctView<'_>> {
        self.materialize()?;
        let y = held(self.y.as_ref(), "Y")?;
        let chroma = if self.has_chrominance() {
            Some((held(self.cb.as_ref(), "Cb")?, held(self.cr.as_ref(), "Cr")?))
        } else {
            None
        };
        let tables = held(self.quant_tables.as_ref(), "quantization tables")?;
        Ok(DctView {
            y,
            chroma,
            quant_tables: tables.populated(self.info.num_components()),
        })
    }

    pub fn y(&mut self) -> Result<&ComponentTensor> {
        if self.y.is_none() {
            self.materialize()?;
        }
        held(self.y.as_ref(), "Y")
    }

    pub fn y_mut(&mut self) -> Result<&mut ComponentTensor> {
        if self.y.is_none() {
            self.materialize()?;
        }
        held(self.y.as_mut(), "Y")
    }

    /// Blue-difference chroma, `None` for grayscale images.
    pub fn cb(&mut self) -> Result<Option<&ComponentTensor>> {
        if !self.has_chrominance() {
            return Ok(None);
        }
        if self.cb.is_none() {
            self.materialize()?;
        }
        held(self.cb.as_ref(), "Cb").map(Some)
    }

    pub fn cb_mut(&mut self) -> Result<Option<&mut ComponentTensor>> {
        if !self.has_chrominance() {
            return Ok(None);
        }
        if self.cb.is_none() {
            self.materialize()?;
        }
        held(self.cb.as_mut(), "Cb").map(Some)
    }

    /// Red-difference chroma, `None` for grayscale images.
    pub fn cr(&mut self) -> Result<Option<&ComponentTensor>> {
        if !self.has_chrominance() {
            return Ok(None);
        }
        if self.cr.is_none() {
            self.materialize()?;
        }
        held(self.cr.as_ref(), "Cr").map(Some)
    }

    pub fn cr_mut(&mut self) -> Result<Option<&mut ComponentTensor>> {
        if !self.has_chrominance() {
            return Ok(None);
        }
        if self.cr.is_none() {
            self.materialize()?;
        }
        held(self.cr.as_mut(), "Cr").map(Some)
    }

    /// All four table slots.
    pub fn quant_tables(&mut self) -> Result<&QuantTables> {
        if self.quant_tables.is_none() {
            self.materialize()?;
        }
        held(self.quant_tables.as_ref(), "quantization tables")
    }

    pub fn quant_tables_mut(&mut self) -> Result<&mut QuantTables> {
        if self.quant_tables.is_none() {
            self.materialize()?;
        }
        held(self.quant_tables.as_mut(), "quantization tables")
    }

    pub fn set_y(&mut self, y: ComponentTensor) -> Result<()> {
        self.check_grid(0, &y)?;
        self.y = Some(y);
        Ok(())
    }

    pub fn set_cb(&mut self, cb: ComponentTensor) -> Result<()> {
        self.check_chroma("Cb")?;
        self.check_grid(1, &cb)?;
        self.cb = Some(cb);
        Ok(())
    }

    pub fn set_cr(&mut self, cr: ComponentTensor) -> Result<()> {
        self.check_chroma("Cr")?;
        self.check_grid(2, &cr)?;
        self.cr = Some(cr);
        Ok(())
    }

    pub fn set_quant_tables(&mut self, tables: QuantTables) {
        self.quant_tables = Some(tables);
    }

    /// Drop all tensors and tables; the next access decodes again.
    pub fn free(&mut self) {
        self.y = None;
        self.cb = None;
        self.cr = None;
        self.quant_tables = None;
    }

    fn check_chroma(&self, name: &str) -> Result<()> {
        if self.has_chrominance() {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!("{name} set on a grayscale image")))
        }
    }

    fn check_grid(&self, component: usize, tensor: &ComponentTensor) -> Result<()> {
        let expected = self.info.block_grid(component)?;
        if tensor.grid() != expected {
            return Err(Error::invalid_argument(format!(
                "component {component} has {}x{} blocks, image needs {}x{}",
                tensor.blocks_height(),
                tensor.blocks_width(),
                expected.height,
                expected.width
            )));
        }
        Ok(())
    }

    /// Write the held coefficients as a JPEG file.
    ///
    /// `destination` defaults to the source path. `quality` `-1` writes the
    /// held quantization tables unchanged; `0..=100` writes tables derived
    /// from the quality factor instead. Coefficients are written verbatim
    /// either way.
    pub fn write_dct(&mut self, destination: Option<&Path>, quality: i32) -> Result<()> {
        check_quality(quality)?;
        let destination = match destination {
            Some(path) => path.to_path_buf(),
            None => self
                .path
                .clone()
                .ok_or_else(|| Error::invalid_argument("no destination given for an in-memory JPEG"))?,
        };
        self.encode(&destination, &destination, quality)
    }

    /// Encode into memory and return the JPEG bytes.
    pub fn to_bytes(&mut self, quality: i32) -> Result<Vec<u8>> {
        check_quality(quality)?;
        let out = ScratchFile::empty()?;
        self.encode(out.path(), Path::new(IN_MEMORY_PATH), quality)?;
        out.read()
    }

    /// Encode to `destination`; codec errors name `reported` instead.
    fn encode(&mut self, destination: &Path, reported: &Path, quality: i32) -> Result<()> {
        self.materialize()?;
        let y = held(self.y.as_ref(), "Y")?;
        self.check_grid(0, y)?;
        let chroma = if self.has_chrominance() {
            let cb = held(self.cb.as_ref(), "Cb")?;
            let cr = held(self.cr.as_ref(), "Cr")?;
            self.check_grid(1, cb)?;
            self.check_grid(2, cr)?;
            Some((cb, cr))
        } else {
            None
        };
        let tables = held(self.quant_tables.as_ref(), "quantization tables")?;
        let grids = self.info.block_grids()?;

        let source = ScratchFile::with_contents(&self.content)?;
        let request = EncodeRequest {
            source: Some(source.path()),
            destination,
            y,
            chroma,
            width: self.info.width,
            height: self.info.height,
            block_grids: &grids,
            sampling: &self.info.sampling,
            color_space: self.info.color_space,
            num_components: self.info.num_components(),
            quant_table_ids: &self.info.quant_table_ids,
            quant_tables: (quality == -1).then_some(tables),
            quality,
            markers: &self.info.markers,
        };

        let bridge = self.bridge();
        bridge
            .encode(&request)
            .map_err(|e| Error::codec("encode", reported, e))?;
        tracing::debug!(
            bridge = bridge.name(),
            path = %destination.display(),
            quality,
            "wrote DCT coefficients"
        );
        Ok(())
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn num_components(&self) -> usize {
        self.info.num_components()
    }

    pub fn has_chrominance(&self) -> bool {
        self.info.has_chrominance()
    }

    pub fn color_space(&self) -> ColorSpace {
        self.info.color_space
    }

    pub fn sampling_factors(&self) -> &[SamplingFactor] {
        &self.info.sampling
    }

    /// Quantization table id of each component.
    pub fn quant_table_ids(&self) -> &[u8] {
        &self.info.quant_table_ids
    }

    /// APPn / COM markers carried through writes.
    pub fn markers(&self) -> &[Marker] {
        &self.info.markers
    }

    pub fn info(&self) -> &JpegInfo {
        &self.info
    }

    /// Source path, `None` for in-memory JPEGs.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Source bytes as opened.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn block_grid(&self, component: usize) -> Result<BlockGrid> {
        self.info.block_grid(component)
    }
}

impl fmt::Debug for DctJpeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DctJpeg")
            .field("path", &self.path)
            .field("width", &self.info.width)
            .field("height", &self.info.height)
            .field("color_space", &self.info.color_space)
            .field("y", &self.y.is_some())
            .field("cb", &self.cb.is_some())
            .field("cr", &self.cr.is_some())
            .field("quant_tables", &self.quant_tables.is_some())
            .finish_non_exhaustive()
    }
}

fn check_quality(quality: i32) -> Result<()> {
    if (-1..=100).contains(&quality) {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!(
            "quality must be in -1..=100, got {quality}"
        )))
    }
}

/// Path reported in codec errors: the source file, or a placeholder for an
/// in-memory JPEG whose scratch copy is already gone.
fn error_path(path: Option<&Path>) -> PathBuf {
    path.map_or_else(|| PathBuf::from(IN_MEMORY_PATH), Path::to_path_buf)
}

/// A field `materialize` has just filled.
fn held<T>(field: Option<T>, name: &str) -> Result<T> {
    field.ok_or_else(|| Error::InvariantViolation(format!("{name} missing after decode")))
}
