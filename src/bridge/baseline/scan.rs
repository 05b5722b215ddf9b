// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Scan decoding and encoding.
//!
//! Sequential scans are decoded and encoded; progressive scans (spectral
//! selection and successive approximation) are decoded only, each one
//! accumulating into coefficients left by the earlier scans.
//!
//! Every pass walks the same block order through [`for_each_mcu`]:
//! a single-component scan visits the component's own block grid in raster
//! order, an interleaved scan visits MCUs and may include padding blocks
//! past the grid edge. Padding blocks are decoded and dropped; on encode
//! they are written as a zero DC difference followed by EOB.

use super::bitio::{BitReader, BitWriter};
use super::huffman::{categorize, extend, DecodeTable, EncodeTable};
use super::marker::ScanHeader;
use super::tables::{HuffmanSpec, ZIGZAG_TO_NATURAL};
use crate::bridge::CodecError;
use crate::geometry::{BlockGrid, SamplingFactor};
use crate::tensor::ComponentTensor;

/// One component of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    /// Index into the frame's component list.
    pub index: usize,
    pub dc_table: usize,
    pub ac_table: usize,
}

/// Block position in scan order. `pos` is `None` for MCU padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockSlot {
    /// Position within the scan's component list.
    sci: usize,
    pos: Option<(usize, usize)>,
}

/// Layout a scan is walked over.
pub struct ScanLayout<'a> {
    pub components: &'a [ScanComponent],
    /// Sampling factors of every frame component.
    pub sampling: &'a [SamplingFactor],
    /// Block grids of every frame component.
    pub grids: &'a [BlockGrid],
    pub mcus_x: usize,
    pub mcus_y: usize,
    pub restart_interval: u16,
}

/// Call `f(mcu_index, slots)` for every MCU of the scan.
fn for_each_mcu<F>(layout: &ScanLayout<'_>, mut f: F) -> Result<(), CodecError>
where
    F: FnMut(usize, &[BlockSlot]) -> Result<(), CodecError>,
{
    if let [only] = layout.components {
        let grid = layout.grids[only.index];
        let mut mcu = 0;
        for row in 0..grid.height {
            for col in 0..grid.width {
                f(mcu, &[BlockSlot { sci: 0, pos: Some((row, col)) }])?;
                mcu += 1;
            }
        }
        return Ok(());
    }

    let mut slots = Vec::new();
    let mut mcu = 0;
    for mcu_row in 0..layout.mcus_y {
        for mcu_col in 0..layout.mcus_x {
            slots.clear();
            for (sci, sc) in layout.components.iter().enumerate() {
                let factor = layout.sampling[sc.index];
                let grid = layout.grids[sc.index];
                for v in 0..factor.v as usize {
                    for h in 0..factor.h as usize {
                        let row = mcu_row * factor.v as usize + v;
                        let col = mcu_col * factor.h as usize + h;
                        let pos = (row < grid.height && col < grid.width).then_some((row, col));
                        slots.push(BlockSlot { sci, pos });
                    }
                }
            }
            f(mcu, &slots)?;
            mcu += 1;
        }
    }
    Ok(())
}

fn starts_interval(layout: &ScanLayout<'_>, mcu: usize) -> bool {
    let ri = layout.restart_interval as usize;
    ri > 0 && mcu > 0 && mcu % ri == 0
}

/// Decode one scan into `tensors` (indexed by frame component).
///
/// Returns the byte offset where the reader stopped; the next marker is at
/// or after it.
pub fn decode_scan(
    data: &[u8],
    start: usize,
    layout: &ScanLayout<'_>,
    dc_specs: &[Option<HuffmanSpec>; 4],
    ac_specs: &[Option<HuffmanSpec>; 4],
    tensors: &mut [&mut ComponentTensor],
) -> Result<usize, CodecError> {
    let mut dc_tables = Vec::with_capacity(layout.components.len());
    let mut ac_tables = Vec::with_capacity(layout.components.len());
    for sc in layout.components {
        let dc = dc_specs[sc.dc_table]
            .as_ref()
            .ok_or(CodecError::InvalidHuffmanTableId(sc.dc_table as u8))?;
        let ac = ac_specs[sc.ac_table]
            .as_ref()
            .ok_or(CodecError::InvalidHuffmanTableId(0x10 | sc.ac_table as u8))?;
        dc_tables.push(DecodeTable::new(dc)?);
        ac_tables.push(DecodeTable::new(ac)?);
    }

    let mut reader = BitReader::new(data, start);
    let mut pred = vec![0i32; layout.components.len()];

    for_each_mcu(layout, |mcu, slots| {
        if starts_interval(layout, mcu) {
            if reader.take_restart().is_none() {
                tracing::warn!(mcu, "expected restart marker not found");
            }
            pred.fill(0);
        }
        for slot in slots {
            let block = decode_block(
                &mut reader,
                &dc_tables[slot.sci],
                &ac_tables[slot.sci],
                &mut pred[slot.sci],
            )?;
            if let Some((row, col)) = slot.pos {
                let index = layout.components[slot.sci].index;
                *tensors[index].block_mut(row, col) = block;
            }
        }
        Ok(())
    })?;

    tracing::trace!(marker = ?reader.marker(), end = reader.position(), "scan decoded");
    Ok(reader.position())
}

/// Decode one block into natural order.
fn decode_block(
    reader: &mut BitReader<'_>,
    dc_table: &DecodeTable,
    ac_table: &DecodeTable,
    pred: &mut i32,
) -> Result<[i16; 64], CodecError> {
    let mut block = [0i16; 64];

    let size = dc_table.decode(reader)?;
    if size > 11 {
        return Err(CodecError::HuffmanDecode);
    }
    if size > 0 {
        let bits = reader.read_bits(size)?;
        *pred += extend(bits, size);
    }
    block[0] = (*pred).clamp(i16::MIN as i32, i16::MAX as i32) as i16;

    let mut k = 1;
    while k < 64 {
        let rs = ac_table.decode(reader)?;
        let run = (rs >> 4) as usize;
        let size = rs & 0x0F;
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            break;
        }
        k += run;
        if k > 63 {
            return Err(CodecError::HuffmanDecode);
        }
        let bits = reader.read_bits(size)?;
        block[ZIGZAG_TO_NATURAL[k]] = extend(bits, size) as i16;
        k += 1;
    }

    Ok(block)
}

/// Spectral band and successive-approximation bits of a progressive scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub ss: usize,
    pub se: usize,
    pub ah: u8,
    pub al: u8,
}

impl Band {
    pub fn new(header: &ScanHeader) -> Result<Self, CodecError> {
        let band = Self {
            ss: header.ss as usize,
            se: header.se as usize,
            ah: header.ah(),
            al: header.al(),
        };
        if band.ss > band.se || band.se > 63 || band.ah > 13 || band.al > 13 {
            return Err(CodecError::InvalidMarkerData("progressive scan band out of range"));
        }
        if band.ss == 0 && band.se != 0 {
            return Err(CodecError::InvalidMarkerData("progressive DC scan with AC coefficients"));
        }
        if band.ss > 0 && header.selectors.len() != 1 {
            return Err(CodecError::InvalidMarkerData("interleaved progressive AC scan"));
        }
        Ok(band)
    }

    fn is_dc(&self) -> bool {
        self.ss == 0
    }

    fn is_first(&self) -> bool {
        self.ah == 0
    }
}

/// Decode one progressive scan, refining `tensors` in place.
///
/// The tensors must start zeroed before the first scan of a frame. Returns
/// the byte offset where the reader stopped.
pub fn decode_progressive_scan(
    data: &[u8],
    start: usize,
    layout: &ScanLayout<'_>,
    band: Band,
    dc_specs: &[Option<HuffmanSpec>; 4],
    ac_specs: &[Option<HuffmanSpec>; 4],
    tensors: &mut [&mut ComponentTensor],
) -> Result<usize, CodecError> {
    // DC refinement reads raw bits; every other pass needs one table per
    // component.
    let mut tables = Vec::with_capacity(layout.components.len());
    for sc in layout.components {
        let spec = match (band.is_dc(), band.is_first()) {
            (true, true) => Some(
                dc_specs[sc.dc_table]
                    .as_ref()
                    .ok_or(CodecError::InvalidHuffmanTableId(sc.dc_table as u8))?,
            ),
            (true, false) => None,
            (false, _) => Some(
                ac_specs[sc.ac_table]
                    .as_ref()
                    .ok_or(CodecError::InvalidHuffmanTableId(0x10 | sc.ac_table as u8))?,
            ),
        };
        tables.push(spec.map(DecodeTable::new).transpose()?);
    }

    let mut reader = BitReader::new(data, start);
    let mut pred = vec![0i32; layout.components.len()];
    let mut eob_run = 0u32;
    let mut padding = [0i16; 64];

    for_each_mcu(layout, |mcu, slots| {
        if starts_interval(layout, mcu) {
            if reader.take_restart().is_none() {
                tracing::warn!(mcu, "expected restart marker not found");
            }
            pred.fill(0);
            eob_run = 0;
        }
        for slot in slots {
            let block = match slot.pos {
                Some((row, col)) => tensors[layout.components[slot.sci].index].block_mut(row, col),
                None => {
                    padding = [0; 64];
                    &mut padding
                }
            };
            let table = tables[slot.sci].as_ref();
            match (band.is_dc(), table) {
                (true, None) => dc_refine(&mut reader, band.al, block)?,
                (true, Some(table)) => dc_first(&mut reader, table, &mut pred[slot.sci], band.al, block)?,
                (false, Some(table)) if band.is_first() => {
                    ac_first(&mut reader, table, band, &mut eob_run, block)?
                }
                (false, Some(table)) => ac_refine(&mut reader, table, band, &mut eob_run, block)?,
                (false, None) => return Err(CodecError::HuffmanDecode),
            }
        }
        Ok(())
    })?;

    tracing::trace!(?band, marker = ?reader.marker(), end = reader.position(), "progressive scan decoded");
    Ok(reader.position())
}

fn dc_first(
    reader: &mut BitReader<'_>,
    table: &DecodeTable,
    pred: &mut i32,
    al: u8,
    block: &mut [i16; 64],
) -> Result<(), CodecError> {
    let size = table.decode(reader)?;
    if size > 11 {
        return Err(CodecError::HuffmanDecode);
    }
    if size > 0 {
        let bits = reader.read_bits(size)?;
        *pred += extend(bits, size);
    }
    block[0] = to_coefficient(*pred, al);
    Ok(())
}

fn dc_refine(reader: &mut BitReader<'_>, al: u8, block: &mut [i16; 64]) -> Result<(), CodecError> {
    if reader.read_bit()? == 1 {
        block[0] |= 1 << al;
    }
    Ok(())
}

fn ac_first(
    reader: &mut BitReader<'_>,
    table: &DecodeTable,
    band: Band,
    eob_run: &mut u32,
    block: &mut [i16; 64],
) -> Result<(), CodecError> {
    if *eob_run > 0 {
        *eob_run -= 1;
        return Ok(());
    }
    let mut k = band.ss;
    while k <= band.se {
        let rs = table.decode(reader)?;
        let run = rs >> 4;
        let size = rs & 0x0F;
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            // This block is the first of the run.
            *eob_run = eob_length(reader, run)? - 1;
            break;
        }
        k += run as usize;
        if k > band.se {
            return Err(CodecError::HuffmanDecode);
        }
        let bits = reader.read_bits(size)?;
        block[ZIGZAG_TO_NATURAL[k]] = to_coefficient(extend(bits, size), band.al);
        k += 1;
    }
    Ok(())
}

/// Successive-approximation AC pass (T.81 G.1.2.3): correction bits for
/// coefficients that are already nonzero, interleaved with newly nonzero
/// coefficients of magnitude `1 << al`.
fn ac_refine(
    reader: &mut BitReader<'_>,
    table: &DecodeTable,
    band: Band,
    eob_run: &mut u32,
    block: &mut [i16; 64],
) -> Result<(), CodecError> {
    let p1 = 1i16 << band.al;
    let mut k = band.ss;

    if *eob_run == 0 {
        while k <= band.se {
            let rs = table.decode(reader)?;
            let mut run = rs >> 4;
            let value = match rs & 0x0F {
                0 if run < 15 => {
                    *eob_run = eob_length(reader, run)?;
                    break;
                }
                // ZRL: sixteen zero-history coefficients, nothing placed.
                0 => 0,
                1 => {
                    if reader.read_bit()? == 1 {
                        p1
                    } else {
                        -p1
                    }
                }
                _ => return Err(CodecError::HuffmanDecode),
            };
            while k <= band.se {
                let coef = &mut block[ZIGZAG_TO_NATURAL[k]];
                if *coef != 0 {
                    refine_bit(reader, coef, p1)?;
                } else if run == 0 {
                    *coef = value;
                    k += 1;
                    break;
                } else {
                    run -= 1;
                }
                k += 1;
            }
        }
    }

    if *eob_run > 0 {
        while k <= band.se {
            let coef = &mut block[ZIGZAG_TO_NATURAL[k]];
            if *coef != 0 {
                refine_bit(reader, coef, p1)?;
            }
            k += 1;
        }
        *eob_run -= 1;
    }
    Ok(())
}

/// Apply one correction bit, moving the magnitude away from zero.
fn refine_bit(reader: &mut BitReader<'_>, coef: &mut i16, p1: i16) -> Result<(), CodecError> {
    if reader.read_bit()? == 1 && (*coef & p1) == 0 {
        if *coef > 0 {
            *coef += p1;
        } else {
            *coef -= p1;
        }
    }
    Ok(())
}

/// Blocks covered by an `EOBn` symbol with run nibble `run`.
fn eob_length(reader: &mut BitReader<'_>, run: u8) -> Result<u32, CodecError> {
    let mut length = 1u32 << run;
    if run > 0 {
        length += reader.read_bits(run)? as u32;
    }
    Ok(length)
}

fn to_coefficient(value: i32, al: u8) -> i16 {
    (value << al).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Receives the symbol stream of an encode pass.
pub trait SymbolSink {
    fn dc(&mut self, table: usize, symbol: u8) -> Result<(), CodecError>;
    fn ac(&mut self, table: usize, symbol: u8) -> Result<(), CodecError>;
    fn bits(&mut self, value: u16, size: u8);
    fn restart(&mut self, n: u8);
}

/// First pass: symbol frequencies per table id.
pub struct FrequencyCounter {
    pub dc: [[u32; 256]; 4],
    pub ac: [[u32; 256]; 4],
}

impl FrequencyCounter {
    pub fn new() -> Self {
        Self {
            dc: [[0; 256]; 4],
            ac: [[0; 256]; 4],
        }
    }
}

impl Default for FrequencyCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolSink for FrequencyCounter {
    fn dc(&mut self, table: usize, symbol: u8) -> Result<(), CodecError> {
        self.dc[table][symbol as usize] += 1;
        Ok(())
    }

    fn ac(&mut self, table: usize, symbol: u8) -> Result<(), CodecError> {
        self.ac[table][symbol as usize] += 1;
        Ok(())
    }

    fn bits(&mut self, _value: u16, _size: u8) {}

    fn restart(&mut self, _n: u8) {}
}

/// Second pass: Huffman-coded output.
pub struct HuffmanWriter {
    writer: BitWriter,
    dc: [Option<EncodeTable>; 4],
    ac: [Option<EncodeTable>; 4],
}

impl HuffmanWriter {
    pub fn new<'a>(specs: impl IntoIterator<Item = &'a HuffmanSpec>) -> Self {
        let mut dc: [Option<EncodeTable>; 4] = Default::default();
        let mut ac: [Option<EncodeTable>; 4] = Default::default();
        for spec in specs {
            let slot = if spec.class == 0 { &mut dc } else { &mut ac };
            slot[spec.id as usize & 3] = Some(EncodeTable::new(spec));
        }
        Self {
            writer: BitWriter::new(),
            dc,
            ac,
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.writer.finish()
    }
}

impl SymbolSink for HuffmanWriter {
    fn dc(&mut self, table: usize, symbol: u8) -> Result<(), CodecError> {
        let (code, len) = self.dc[table]
            .as_ref()
            .ok_or(CodecError::InvalidHuffmanTableId(table as u8))?
            .code(symbol)?;
        self.writer.write_bits(code, len);
        Ok(())
    }

    fn ac(&mut self, table: usize, symbol: u8) -> Result<(), CodecError> {
        let (code, len) = self.ac[table]
            .as_ref()
            .ok_or(CodecError::InvalidHuffmanTableId(0x10 | table as u8))?
            .code(symbol)?;
        self.writer.write_bits(code, len);
        Ok(())
    }

    fn bits(&mut self, value: u16, size: u8) {
        if size > 0 {
            self.writer.write_bits(value, size);
        }
    }

    fn restart(&mut self, n: u8) {
        self.writer.restart(n);
    }
}

/// Feed one scan's symbols into `sink`. `tensors` is indexed by frame
/// component.
pub fn encode_scan<S: SymbolSink>(
    layout: &ScanLayout<'_>,
    tensors: &[&ComponentTensor],
    sink: &mut S,
) -> Result<(), CodecError> {
    let mut pred = vec![0i32; layout.components.len()];
    let mut restarts = 0u8;
    let padding = [0i16; 64];

    for_each_mcu(layout, |mcu, slots| {
        if starts_interval(layout, mcu) {
            sink.restart(restarts);
            restarts = restarts.wrapping_add(1) & 0x07;
            pred.fill(0);
        }
        for slot in slots {
            let sc = layout.components[slot.sci];
            match slot.pos {
                Some((row, col)) => {
                    let block = tensors[sc.index].block(row, col);
                    encode_block(sink, sc, block, &mut pred[slot.sci])?;
                }
                None => {
                    // Repeat the predictor so the padding block costs one
                    // DC symbol and an EOB.
                    let mut block = padding;
                    block[0] = pred[slot.sci] as i16;
                    encode_block(sink, sc, &block, &mut pred[slot.sci])?;
                }
            }
        }
        Ok(())
    })
}

fn encode_block<S: SymbolSink>(
    sink: &mut S,
    sc: ScanComponent,
    block: &[i16; 64],
    pred: &mut i32,
) -> Result<(), CodecError> {
    let dc = block[0] as i32;
    let (size, bits) = categorize(dc - *pred);
    if size > 11 {
        return Err(CodecError::ValueOutOfRange("DC difference needs more than 11 bits"));
    }
    *pred = dc;
    sink.dc(sc.dc_table, size)?;
    sink.bits(bits, size);

    let mut run = 0u8;
    for &natural in &ZIGZAG_TO_NATURAL[1..] {
        let value = block[natural];
        if value == 0 {
            run += 1;
            continue;
        }
        while run > 15 {
            sink.ac(sc.ac_table, 0xF0)?;
            run -= 16;
        }
        let (size, bits) = categorize(value as i32);
        if size > 10 {
            return Err(CodecError::ValueOutOfRange("AC coefficient needs more than 10 bits"));
        }
        sink.ac(sc.ac_table, (run << 4) | size)?;
        sink.bits(bits, size);
        run = 0;
    }
    if run > 0 {
        sink.ac(sc.ac_table, 0x00)?;
    }
    Ok(())
}
