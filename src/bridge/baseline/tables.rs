// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Zig-zag order, DQT/DHT segments and quality-scaled quantization tables.

use crate::bridge::CodecError;
use crate::tensor::QuantTable;

/// Zig-zag position → natural (row-major) index.
pub const ZIGZAG_TO_NATURAL: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// ITU-T T.81 Table K.1, natural order.
const LUMA_BASE: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// ITU-T T.81 Table K.2, natural order.
const CHROMA_BASE: [u16; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// Quality used when neither tables nor a quality factor are given.
pub const DEFAULT_QUALITY: i32 = 75;

/// IJG quality → percentage scale factor. Quality 0 is treated as 1.
fn quality_scale(quality: i32) -> u32 {
    let q = quality.clamp(1, 100) as u32;
    if q < 50 { 5000 / q } else { 200 - q * 2 }
}

/// Scale an Annex K table by `quality`, clamped to baseline range 1..=255.
fn scaled(base: &[u16; 64], quality: i32) -> QuantTable {
    let scale = quality_scale(quality);
    let values = std::array::from_fn(|k| {
        let v = (base[k] as u32 * scale + 50) / 100;
        v.clamp(1, 255) as u16
    });
    QuantTable::new(values)
}

/// Quality-derived table for slot `id`: slot 0 is luminance, every other
/// slot gets the chrominance table.
pub fn quality_table(id: u8, quality: i32) -> QuantTable {
    if id == 0 {
        scaled(&LUMA_BASE, quality)
    } else {
        scaled(&CHROMA_BASE, quality)
    }
}

/// Parse a DQT body into `(table_id, table)` pairs.
pub fn parse_dqt(data: &[u8]) -> Result<Vec<(u8, QuantTable)>, CodecError> {
    let mut tables = Vec::new();
    let mut rest = data;

    while let Some((&pq_tq, body)) = rest.split_first() {
        let precision = pq_tq >> 4;
        let id = pq_tq & 0x0F;
        if id > 3 {
            return Err(CodecError::InvalidQuantTableId(id));
        }
        let width = match precision {
            0 => 1,
            1 => 2,
            _ => return Err(CodecError::InvalidMarkerData("invalid DQT precision")),
        };
        if body.len() < 64 * width {
            return Err(CodecError::UnexpectedEof);
        }

        let mut values = [0u16; 64];
        for (zz, &ni) in ZIGZAG_TO_NATURAL.iter().enumerate() {
            values[ni] = if width == 1 {
                body[zz] as u16
            } else {
                u16::from_be_bytes([body[zz * 2], body[zz * 2 + 1]])
            };
        }
        tables.push((id, QuantTable::new(values)));
        rest = &body[64 * width..];
    }

    Ok(tables)
}

/// Whether `table` needs 16-bit DQT precision.
pub fn needs_16bit(table: &QuantTable) -> bool {
    table.values.iter().any(|&v| v > 255)
}

/// DQT body for one table, zig-zag ordered.
pub fn dqt_body(id: u8, table: &QuantTable) -> Vec<u8> {
    let wide = needs_16bit(table);
    let mut out = Vec::with_capacity(1 + if wide { 128 } else { 64 });
    out.push(((wide as u8) << 4) | (id & 0x0F));
    for &ni in &ZIGZAG_TO_NATURAL {
        let v = table.values[ni];
        if wide {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.push(v as u8);
        }
    }
    out
}

/// Huffman table as carried in a DHT segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanSpec {
    /// 0 = DC, 1 = AC.
    pub class: u8,
    pub id: u8,
    /// Number of codes of each length 1–16.
    pub bits: [u8; 16],
    /// Symbols in order of increasing code length.
    pub huffval: Vec<u8>,
}

/// Parse a DHT body. One segment may define several tables.
pub fn parse_dht(data: &[u8]) -> Result<Vec<HuffmanSpec>, CodecError> {
    let mut specs = Vec::new();
    let mut rest = data;

    while let Some((&tc_th, body)) = rest.split_first() {
        let class = tc_th >> 4;
        let id = tc_th & 0x0F;
        if class > 1 || id > 3 {
            return Err(CodecError::InvalidHuffmanTableId(tc_th));
        }
        if body.len() < 16 {
            return Err(CodecError::UnexpectedEof);
        }
        let mut bits = [0u8; 16];
        bits.copy_from_slice(&body[..16]);
        let total: usize = bits.iter().map(|&b| b as usize).sum();
        if total > 256 {
            return Err(CodecError::InvalidMarkerData("DHT defines more than 256 symbols"));
        }
        let symbols = body
            .get(16..16 + total)
            .ok_or(CodecError::UnexpectedEof)?;

        specs.push(HuffmanSpec {
            class,
            id,
            bits,
            huffval: symbols.to_vec(),
        });
        rest = &body[16 + total..];
    }

    Ok(specs)
}

/// DHT body for a list of tables.
pub fn dht_body<'a>(specs: impl IntoIterator<Item = &'a HuffmanSpec>) -> Vec<u8> {
    let mut out = Vec::new();
    for spec in specs {
        out.push((spec.class << 4) | (spec.id & 0x0F));
        out.extend_from_slice(&spec.bits);
        out.extend_from_slice(&spec.huffval);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_is_a_permutation() {
        let mut seen = [false; 64];
        for &natural in &ZIGZAG_TO_NATURAL {
            assert!(!seen[natural]);
            seen[natural] = true;
        }
        assert_eq!(ZIGZAG_TO_NATURAL[2], 8);
        assert_eq!(ZIGZAG_TO_NATURAL[63], 63);
    }

    #[test]
    fn dqt_is_zigzag_ordered() {
        let mut body = vec![0x01u8];
        body.extend(1..=64u8);
        let tables = parse_dqt(&body).unwrap();
        assert_eq!(tables.len(), 1);
        let (id, qt) = tables[0];
        assert_eq!(id, 1);
        assert_eq!(qt.values[0], 1);
        assert_eq!(qt.values[1], 2);
        assert_eq!(qt.values[8], 3);
    }

    #[test]
    fn dqt_body_parses_back() {
        let mut values = [0u16; 64];
        for (k, v) in values.iter_mut().enumerate() {
            *v = (k as u16 + 1) * 5;
        }
        let table = QuantTable::new(values);
        assert!(needs_16bit(&table));
        let parsed = parse_dqt(&dqt_body(2, &table)).unwrap();
        assert_eq!(parsed, vec![(2, table)]);
    }

    #[test]
    fn dqt_rejects_bad_id() {
        let mut body = vec![0x04u8];
        body.extend([1u8; 64]);
        assert!(matches!(parse_dqt(&body), Err(CodecError::InvalidQuantTableId(4))));
    }

    #[test]
    fn dqt_truncated() {
        assert!(matches!(parse_dqt(&[0x00, 1, 2, 3]), Err(CodecError::UnexpectedEof)));
    }

    #[test]
    fn dht_multiple_tables() {
        let dc = HuffmanSpec {
            class: 0,
            id: 0,
            bits: [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0],
            huffval: (0..12).collect(),
        };
        let ac = HuffmanSpec {
            class: 1,
            id: 1,
            bits: [0, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            huffval: vec![0x00, 0x01, 0x11],
        };
        let parsed = parse_dht(&dht_body([&dc, &ac])).unwrap();
        assert_eq!(parsed, vec![dc, ac]);
    }

    #[test]
    fn quality_50_is_annex_k() {
        assert_eq!(quality_table(0, 50).values, LUMA_BASE);
        assert_eq!(quality_table(1, 50).values, CHROMA_BASE);
    }

    #[test]
    fn quality_extremes() {
        assert!(quality_table(0, 100).values.iter().all(|&v| v == 1));
        // Quality 0 behaves like 1: scale 5000 %, clamped to 255.
        assert_eq!(quality_table(0, 0), quality_table(0, 1));
        assert!(quality_table(1, 1).values.iter().all(|&v| v == 255));
        // scale 50 %: (16 * 50 + 50) / 100 = 8
        assert_eq!(quality_table(0, 75).values[0], 8);
    }
}
