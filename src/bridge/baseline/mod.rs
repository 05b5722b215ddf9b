// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Built-in pure-Rust codec bridge for Huffman-coded JPEG.
//!
//! Decoding reads quantized coefficients straight out of the entropy-coded
//! scans; encoding writes them back with optimized Huffman tables. Neither
//! direction touches pixels, so a decode/encode cycle with the original
//! tables is lossless at the coefficient level.
//!
//! Supported: SOF0/SOF1/SOF2 frames with 8-bit samples, any sampling
//! factors, single- and multi-scan streams, restart intervals. Progressive
//! input (spectral selection and successive approximation) is decoded, but
//! output is always sequential. Lossless, hierarchical and arithmetic-coded
//! streams are rejected with [`CodecError::UnsupportedMarker`].

mod bitio;
mod frame;
mod huffman;
mod marker;
mod scan;
mod tables;

use std::path::Path;

use crate::bridge::{CodecBridge, CodecError, DecodeBuffers, EncodeRequest};
use crate::geometry::{BlockGrid, SamplingFactor};
use crate::info::{ColorSpace, JpegInfo, Marker, MarkerKind};
use crate::tensor::{ComponentTensor, QuantTable, QuantTables};

use frame::{Frame, FrameComponent};
use marker::{ScanHeader, APP0, APP14, COM, DHT, DQT, DRI, EOI, SOF0, SOF1, SOF2, SOS};
use scan::{Band, FrequencyCounter, HuffmanWriter, ScanComponent, ScanLayout};
use tables::HuffmanSpec;

pub use tables::DEFAULT_QUALITY;

/// Most blocks an interleaved MCU may hold (T.81 B.2.3).
const MAX_BLOCKS_PER_MCU: usize = 10;

/// Baseline JPEG codec.
#[derive(Debug, Clone, Default)]
pub struct BaselineCodec {
    restart_interval: Option<u16>,
}

impl BaselineCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write restart markers every `mcus` MCUs (0 disables them) instead of
    /// keeping the source stream's interval.
    pub fn with_restart_interval(mut self, mcus: u16) -> Self {
        self.restart_interval = Some(mcus);
        self
    }
}

/// Header state accumulated while walking a stream.
#[derive(Default)]
struct StreamState {
    frame: Option<Frame>,
    quant: [Option<QuantTable>; 4],
    dc: [Option<HuffmanSpec>; 4],
    ac: [Option<HuffmanSpec>; 4],
    restart_interval: u16,
    markers: Vec<Marker>,
    jfif: bool,
    adobe_transform: Option<u8>,
}

impl StreamState {
    /// Consume segments from `pos` up to the next SOS or EOI.
    ///
    /// Returns the scan header with the offset of its entropy-coded data, or
    /// `None` at EOI.
    fn advance(&mut self, data: &[u8], mut pos: usize) -> Result<Option<(ScanHeader, usize)>, CodecError> {
        loop {
            let (segment, next) = marker::next_segment(data, pos)?;
            pos = next;
            match segment.marker {
                SOF0 | SOF1 | SOF2 => {
                    if self.frame.is_some() {
                        return Err(CodecError::InvalidMarkerData("multiple SOF markers"));
                    }
                    self.frame = Some(Frame::parse(segment.marker, &segment.data)?);
                }
                DQT => {
                    for (id, table) in tables::parse_dqt(&segment.data)? {
                        self.quant[id as usize] = Some(table);
                    }
                }
                DHT => {
                    for spec in tables::parse_dht(&segment.data)? {
                        let slots = if spec.class == 0 { &mut self.dc } else { &mut self.ac };
                        let id = spec.id as usize;
                        slots[id] = Some(spec);
                    }
                }
                DRI => self.restart_interval = marker::parse_dri(&segment.data)?,
                SOS => {
                    let header = ScanHeader::parse(&segment.data)?;
                    return Ok(Some((header, pos)));
                }
                EOI => return Ok(None),
                code @ (0xE0..=0xEF | COM) => self.keep_marker(code, segment.data),
                // DNL, DAC, DHP, EXP and reserved codes carry nothing we need.
                _ => {}
            }
        }
    }

    fn keep_marker(&mut self, code: u8, payload: Vec<u8>) {
        if code == APP0 && payload.starts_with(b"JFIF\0") {
            self.jfif = true;
        }
        if code == APP14 && payload.starts_with(b"Adobe") && payload.len() >= 12 {
            self.adobe_transform = Some(payload[11]);
        }
        self.markers.push(Marker {
            kind: MarkerKind::from_code(code),
            payload,
        });
    }

    fn frame(&self) -> Result<&Frame, CodecError> {
        self.frame
            .as_ref()
            .ok_or(CodecError::InvalidMarkerData("scan before SOF"))
    }

    /// Color space as libjpeg infers it from JFIF / Adobe markers and
    /// component ids.
    fn color_space(&self, frame: &Frame) -> ColorSpace {
        let ids: Vec<u8> = frame.components.iter().map(|c| c.id).collect();
        match ids.len() {
            1 => ColorSpace::Grayscale,
            3 if self.jfif => ColorSpace::YCbCr,
            3 => match self.adobe_transform {
                Some(0) => ColorSpace::Rgb,
                Some(_) => ColorSpace::YCbCr,
                None if ids == b"RGB" => ColorSpace::Rgb,
                None => ColorSpace::YCbCr,
            },
            4 => match self.adobe_transform {
                Some(2) => ColorSpace::Ycck,
                _ => ColorSpace::Cmyk,
            },
            _ => ColorSpace::Unknown,
        }
    }

    fn scan_components(&self, header: &ScanHeader) -> Result<Vec<ScanComponent>, CodecError> {
        let frame = self.frame()?;
        header
            .selectors
            .iter()
            .map(|&(id, dc, ac)| {
                if dc > 3 {
                    return Err(CodecError::InvalidHuffmanTableId(dc));
                }
                if ac > 3 {
                    return Err(CodecError::InvalidHuffmanTableId(0x10 | ac));
                }
                Ok(ScanComponent {
                    index: frame.component_index(id)?,
                    dc_table: dc as usize,
                    ac_table: ac as usize,
                })
            })
            .collect()
    }
}

/// Walk the stream header up to the first scan.
fn read_header(data: &[u8]) -> Result<(StreamState, Option<(ScanHeader, usize)>), CodecError> {
    let pos = marker::expect_soi(data)?;
    let mut state = StreamState::default();
    let first_scan = state.advance(data, pos)?;
    state.frame()?;
    Ok((state, first_scan))
}

impl CodecBridge for BaselineCodec {
    fn name(&self) -> &str {
        "baseline"
    }

    fn read_info(&self, src: &Path) -> Result<JpegInfo, CodecError> {
        let data = std::fs::read(src)?;
        let (state, _) = read_header(&data)?;
        let frame = state.frame()?;

        let info = JpegInfo {
            width: frame.width as u32,
            height: frame.height as u32,
            sampling: frame.sampling(),
            quant_table_ids: frame.quant_table_ids(),
            color_space: state.color_space(frame),
            markers: state.markers.clone(),
        };
        tracing::debug!(
            path = %src.display(),
            width = info.width,
            height = info.height,
            components = info.num_components(),
            color_space = %info.color_space,
            markers = info.markers.len(),
            "read JPEG header"
        );
        Ok(info)
    }

    fn decode(&self, src: &Path, out: DecodeBuffers<'_>) -> Result<(), CodecError> {
        let data = std::fs::read(src)?;
        let (mut state, first_scan) = read_header(&data)?;
        let frame = state.frame()?.clone();

        let DecodeBuffers {
            y,
            chroma,
            quant_tables,
        } = out;
        let mut tensors: Vec<&mut ComponentTensor> = vec![y];
        if let Some((cb, cr)) = chroma {
            tensors.push(cb);
            tensors.push(cr);
        }
        if tensors.len() != frame.components.len() {
            return Err(CodecError::ComponentCountMismatch {
                expected: frame.components.len(),
                actual: tensors.len(),
            });
        }

        let grids = frame.block_grids()?;
        for (component, (tensor, &expected)) in tensors.iter().zip(&grids).enumerate() {
            if tensor.grid() != expected {
                return Err(CodecError::GeometryMismatch {
                    component,
                    expected,
                    actual: tensor.grid(),
                });
            }
        }
        let sampling = frame.sampling();
        let progressive = frame.is_progressive();
        if progressive {
            // Progressive scans refine what earlier scans left behind.
            for tensor in tensors.iter_mut() {
                tensor.as_mut_slice().fill(0);
            }
        }

        let mut next = first_scan;
        let mut scans = 0usize;
        while let Some((header, start)) = next.take() {
            let components = state.scan_components(&header)?;
            let layout = scan_layout(&frame, &components, &sampling, &grids, state.restart_interval);
            let end = if progressive {
                let band = Band::new(&header)?;
                scan::decode_progressive_scan(&data, start, &layout, band, &state.dc, &state.ac, &mut tensors)?
            } else if header.is_sequential() {
                scan::decode_scan(&data, start, &layout, &state.dc, &state.ac, &mut tensors)?
            } else {
                return Err(CodecError::InvalidMarkerData("spectral selection in a sequential frame"));
            };
            scans += 1;

            let pos = match marker::skip_entropy_data(&data, end) {
                Ok(pos) => pos,
                Err(CodecError::UnexpectedEof) => {
                    tracing::warn!(path = %src.display(), "JPEG stream ends without EOI");
                    break;
                }
                Err(err) => return Err(err),
            };
            next = state.advance(&data, pos)?;
        }
        if scans == 0 {
            return Err(CodecError::InvalidMarkerData("no scan in stream"));
        }

        for component in &frame.components {
            let id = component.quant_table_id;
            if state.quant[id as usize].is_none() {
                return Err(CodecError::InvalidQuantTableId(id));
            }
        }
        for (id, table) in state.quant.iter().enumerate() {
            quant_tables.set(id, table.unwrap_or_default());
        }

        tracing::debug!(path = %src.display(), scans, progressive, "decoded DCT coefficients");
        Ok(())
    }

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), CodecError> {
        if !(-1..=100).contains(&request.quality) {
            return Err(CodecError::InvalidQuality(request.quality));
        }
        let tensors = request.components();
        let n = request.num_components;
        if tensors.len() != n {
            return Err(CodecError::ComponentCountMismatch {
                expected: n,
                actual: tensors.len(),
            });
        }
        if request.sampling.len() != n || request.quant_table_ids.len() != n {
            return Err(CodecError::InvalidDimensions);
        }
        let width = u16::try_from(request.width).map_err(|_| CodecError::InvalidDimensions)?;
        let height = u16::try_from(request.height).map_err(|_| CodecError::InvalidDimensions)?;
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidDimensions);
        }

        let tables = resolve_tables(request)?;
        let used_ids = used_table_ids(request.quant_table_ids)?;
        for &id in &used_ids {
            if tables.get(id as usize).values.contains(&0) {
                return Err(CodecError::ValueOutOfRange("quantization table contains zero"));
            }
        }
        let wide = used_ids
            .iter()
            .any(|&id| tables::needs_16bit(tables.get(id as usize)));

        let frame = Frame {
            marker: Frame::marker_for(wide),
            width,
            height,
            components: request
                .sampling
                .iter()
                .zip(request.quant_table_ids)
                .enumerate()
                .map(|(i, (&sampling, &quant_table_id))| FrameComponent {
                    id: i as u8 + 1,
                    sampling,
                    quant_table_id,
                })
                .collect(),
        };
        let grids = frame.block_grids()?;
        for (component, (&expected, tensor)) in grids.iter().zip(&tensors).enumerate() {
            let claimed = request.block_grids.get(component).copied();
            if tensor.grid() != expected || claimed != Some(expected) {
                return Err(CodecError::GeometryMismatch {
                    component,
                    expected,
                    actual: tensor.grid(),
                });
            }
        }

        let restart_interval = match (self.restart_interval, request.source) {
            (Some(ri), _) => ri,
            (None, Some(source)) => read_header(&std::fs::read(source)?)?.0.restart_interval,
            (None, None) => 0,
        };

        let scans = plan_scans(n, request.sampling);
        let mut counter = FrequencyCounter::new();
        for components in &scans {
            let layout = scan_layout(&frame, components, request.sampling, &grids, restart_interval);
            scan::encode_scan(&layout, &tensors, &mut counter)?;
        }
        let huffman = huffman_specs(n, &counter);

        let mut out = vec![0xFF, marker::SOI];
        write_markers(&mut out, request.color_space, request.markers)?;
        for &id in &used_ids {
            marker::write_segment(&mut out, DQT, &tables::dqt_body(id, tables.get(id as usize)));
        }
        marker::write_segment(&mut out, frame.marker, &frame.to_bytes());
        marker::write_segment(&mut out, DHT, &tables::dht_body(&huffman));
        if restart_interval > 0 {
            marker::write_segment(&mut out, DRI, &restart_interval.to_be_bytes());
        }
        for components in &scans {
            let header = ScanHeader {
                selectors: components
                    .iter()
                    .map(|sc| (frame.components[sc.index].id, sc.dc_table as u8, sc.ac_table as u8))
                    .collect(),
                ss: 0,
                se: 63,
                ah_al: 0,
            };
            marker::write_segment(&mut out, SOS, &header.to_bytes());
            let layout = scan_layout(&frame, components, request.sampling, &grids, restart_interval);
            let mut writer = HuffmanWriter::new(&huffman);
            scan::encode_scan(&layout, &tensors, &mut writer)?;
            out.extend_from_slice(&writer.finish());
        }
        out.extend_from_slice(&[0xFF, EOI]);

        std::fs::write(request.destination, &out)?;
        tracing::debug!(
            path = %request.destination.display(),
            bytes = out.len(),
            quality = request.quality,
            scans = scans.len(),
            restart_interval,
            "wrote JPEG"
        );
        Ok(())
    }
}

fn scan_layout<'a>(
    frame: &Frame,
    components: &'a [ScanComponent],
    sampling: &'a [SamplingFactor],
    grids: &'a [BlockGrid],
    restart_interval: u16,
) -> ScanLayout<'a> {
    ScanLayout {
        components,
        sampling,
        grids,
        mcus_x: frame.mcus_x(),
        mcus_y: frame.mcus_y(),
        restart_interval,
    }
}

/// Table set an encode writes. Quality `-1` keeps the caller's tables;
/// anything else derives all four slots from the quality factor.
fn resolve_tables(request: &EncodeRequest<'_>) -> Result<QuantTables, CodecError> {
    let quality = match (request.quality, request.quant_tables) {
        (-1, Some(tables)) => return Ok(*tables),
        (-1, None) => DEFAULT_QUALITY,
        (q, _) => q,
    };
    Ok(QuantTables::new(std::array::from_fn(|id| {
        tables::quality_table(id as u8, quality)
    })))
}

/// Distinct table ids in first-use order.
fn used_table_ids(ids: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut used = Vec::new();
    for &id in ids {
        if id > 3 {
            return Err(CodecError::InvalidQuantTableId(id));
        }
        if !used.contains(&id) {
            used.push(id);
        }
    }
    Ok(used)
}

/// One interleaved scan when the MCU is small enough, otherwise one scan
/// per component. Luminance uses Huffman tables 0, chrominance tables 1.
fn plan_scans(num_components: usize, sampling: &[SamplingFactor]) -> Vec<Vec<ScanComponent>> {
    let components: Vec<ScanComponent> = (0..num_components)
        .map(|index| {
            let table = usize::from(index > 0);
            ScanComponent {
                index,
                dc_table: table,
                ac_table: table,
            }
        })
        .collect();
    let blocks_per_mcu: usize = sampling.iter().map(|s| s.h as usize * s.v as usize).sum();
    if num_components == 1 || blocks_per_mcu > MAX_BLOCKS_PER_MCU {
        components.into_iter().map(|c| vec![c]).collect()
    } else {
        vec![components]
    }
}

fn huffman_specs(num_components: usize, counter: &FrequencyCounter) -> Vec<HuffmanSpec> {
    let table_count = if num_components > 1 { 2 } else { 1 };
    let mut specs = Vec::with_capacity(table_count * 2);
    for id in 0..table_count {
        specs.push(huffman::optimal_spec(0, id as u8, &counter.dc[id]));
        specs.push(huffman::optimal_spec(1, id as u8, &counter.ac[id]));
    }
    specs
}

/// APPn / COM segments, preceded by a JFIF or Adobe header when the caller
/// supplied none and the color space calls for one.
fn write_markers(out: &mut Vec<u8>, color_space: ColorSpace, markers: &[Marker]) -> Result<(), CodecError> {
    let has = |kind| markers.iter().any(|m| m.kind == kind);
    match color_space {
        ColorSpace::Grayscale | ColorSpace::YCbCr if !has(MarkerKind::App(0)) => {
            // JFIF 1.01, no units, 1:1 density, no thumbnail.
            marker::write_segment(out, APP0, b"JFIF\0\x01\x01\x00\x00\x01\x00\x01\x00\x00");
        }
        ColorSpace::Rgb | ColorSpace::Cmyk | ColorSpace::Ycck if !has(MarkerKind::App(14)) => {
            let transform = u8::from(color_space == ColorSpace::Ycck) * 2;
            let mut body = b"Adobe\x00\x64\x00\x00\x00\x00".to_vec();
            body.push(transform);
            marker::write_segment(out, APP14, &body);
        }
        _ => {}
    }
    for m in markers {
        if m.payload.len() > Marker::MAX_PAYLOAD {
            return Err(CodecError::ValueOutOfRange("marker payload exceeds 65533 bytes"));
        }
        marker::write_segment(out, m.kind.code(), &m.payload);
    }
    Ok(())
}
