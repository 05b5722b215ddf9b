// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Marker segment walking.
//!
//! [`next_segment`] reads one marker segment at a time so the decoder can
//! interleave header parsing with scans (DHT may appear between the scans
//! of a multi-scan or progressive stream).

use crate::bridge::CodecError;

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOF0: u8 = 0xC0;
pub const SOF1: u8 = 0xC1;
pub const SOF2: u8 = 0xC2;
pub const DHT: u8 = 0xC4;
pub const DQT: u8 = 0xDB;
pub const DRI: u8 = 0xDD;
pub const SOS: u8 = 0xDA;
pub const APP0: u8 = 0xE0;
pub const APP14: u8 = 0xEE;
pub const COM: u8 = 0xFE;

/// One marker segment. `data` excludes the marker and the length field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub marker: u8,
    pub data: Vec<u8>,
}

/// Check the SOI marker and return the offset of the first segment.
pub fn expect_soi(data: &[u8]) -> Result<usize, CodecError> {
    match data {
        [0xFF, SOI, ..] => Ok(2),
        _ => Err(CodecError::InvalidSoi),
    }
}

/// Read the marker segment at or after `pos`.
///
/// Returns the segment and the offset just past it. EOI is returned as a
/// segment with empty data. Frame types this codec cannot decode are
/// rejected here.
pub fn next_segment(data: &[u8], mut pos: usize) -> Result<(Segment, usize), CodecError> {
    // Garbage before a marker is tolerated, as libjpeg does with a warning.
    while pos < data.len() && data[pos] != 0xFF {
        pos += 1;
    }
    // Fill bytes.
    while pos + 1 < data.len() && data[pos + 1] == 0xFF {
        pos += 1;
    }
    let marker = *data.get(pos + 1).ok_or(CodecError::UnexpectedEof)?;
    pos += 2;

    match marker {
        EOI => {
            return Ok((
                Segment {
                    marker,
                    data: Vec::new(),
                },
                pos,
            ))
        }
        0x00 | SOI | 0xD0..=0xD7 => {
            return Err(CodecError::InvalidMarkerData("unexpected marker outside scan"))
        }
        m if is_unsupported_frame(m) => return Err(CodecError::UnsupportedMarker(m)),
        _ => {}
    }

    let len_bytes = data.get(pos..pos + 2).ok_or(CodecError::UnexpectedEof)?;
    let length = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    if length < 2 {
        return Err(CodecError::InvalidMarkerData("invalid segment length"));
    }
    let body = data
        .get(pos + 2..pos + length)
        .ok_or(CodecError::UnexpectedEof)?;

    Ok((
        Segment {
            marker,
            data: body.to_vec(),
        },
        pos + length,
    ))
}

/// Lossless, hierarchical and arithmetic-coded frames.
fn is_unsupported_frame(marker: u8) -> bool {
    matches!(marker, 0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF)
}

/// Skip entropy-coded data starting at `pos`; returns the offset of the next
/// non-restart marker.
pub fn skip_entropy_data(data: &[u8], mut pos: usize) -> Result<usize, CodecError> {
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        match data[pos + 1] {
            0x00 | 0xD0..=0xD7 => pos += 2,
            0xFF => pos += 1,
            _ => return Ok(pos),
        }
    }
    Err(CodecError::UnexpectedEof)
}

/// Scan header: component selectors plus spectral / approximation bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    /// `(component_id, dc_table, ac_table)` per scan component.
    pub selectors: Vec<(u8, u8, u8)>,
    pub ss: u8,
    pub se: u8,
    pub ah_al: u8,
}

impl ScanHeader {
    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        let (&n, rest) = data
            .split_first()
            .ok_or(CodecError::InvalidMarkerData("empty SOS"))?;
        let n = n as usize;
        if n == 0 || n > 4 {
            return Err(CodecError::InvalidMarkerData("bad SOS component count"));
        }
        if rest.len() < n * 2 + 3 {
            return Err(CodecError::UnexpectedEof);
        }
        let selectors = rest[..n * 2]
            .chunks_exact(2)
            .map(|sel| (sel[0], sel[1] >> 4, sel[1] & 0x0F))
            .collect();
        let tail = &rest[n * 2..];
        Ok(Self {
            selectors,
            ss: tail[0],
            se: tail[1],
            ah_al: tail[2],
        })
    }

    /// Sequential scans cover the full spectrum without approximation.
    pub fn is_sequential(&self) -> bool {
        self.ss == 0 && self.se == 63 && self.ah_al == 0
    }

    /// Successive approximation bit position high.
    pub fn ah(&self) -> u8 {
        self.ah_al >> 4
    }

    /// Successive approximation bit position low.
    pub fn al(&self) -> u8 {
        self.ah_al & 0x0F
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.selectors.len() * 2 + 3);
        out.push(self.selectors.len() as u8);
        for &(id, dc, ac) in &self.selectors {
            out.push(id);
            out.push((dc << 4) | (ac & 0x0F));
        }
        out.extend_from_slice(&[self.ss, self.se, self.ah_al]);
        out
    }
}

/// Restart interval from a DRI body.
pub fn parse_dri(data: &[u8]) -> Result<u16, CodecError> {
    match data {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(CodecError::UnexpectedEof),
    }
}

/// Append a complete marker segment to `out`.
pub fn write_segment(out: &mut Vec<u8>, marker: u8, body: &[u8]) {
    let length = (body.len() + 2) as u16;
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_segments_to_eoi() {
        let data = [
            0xFF, 0xD8, // SOI
            0xFF, 0xFE, 0x00, 0x05, b'h', b'e', b'y', // COM
            0xFF, 0xFF, 0xD9, // fill byte + EOI
        ];
        let pos = expect_soi(&data).unwrap();
        let (com, pos) = next_segment(&data, pos).unwrap();
        assert_eq!(com.marker, COM);
        assert_eq!(com.data, b"hey");
        let (eoi, end) = next_segment(&data, pos).unwrap();
        assert_eq!(eoi.marker, EOI);
        assert_eq!(end, data.len());
    }

    #[test]
    fn rejects_missing_soi() {
        assert!(matches!(expect_soi(&[0x00, 0xD8]), Err(CodecError::InvalidSoi)));
    }

    #[test]
    fn rejects_lossless_and_arithmetic_frames() {
        for code in [0xC3, 0xC9, 0xCA] {
            let data = [0xFF, code, 0x00, 0x02];
            assert!(matches!(
                next_segment(&data, 0),
                Err(CodecError::UnsupportedMarker(c)) if c == code
            ));
        }
    }

    #[test]
    fn accepts_progressive_frames() {
        let data = [0xFF, SOF2, 0x00, 0x03, 0x08];
        let (seg, _) = next_segment(&data, 0).unwrap();
        assert_eq!(seg.marker, SOF2);
        assert_eq!(seg.data, [0x08]);
    }

    #[test]
    fn truncated_segment() {
        let data = [0xFF, 0xDB, 0x00, 0x43, 0x00];
        assert!(matches!(next_segment(&data, 0), Err(CodecError::UnexpectedEof)));
    }

    #[test]
    fn scan_header_roundtrip() {
        let body = [2, 1, 0x00, 2, 0x11, 0, 63, 0];
        let sos = ScanHeader::parse(&body).unwrap();
        assert_eq!(sos.selectors, vec![(1, 0, 0), (2, 1, 1)]);
        assert!(sos.is_sequential());
        assert_eq!(sos.to_bytes(), body);

        let refine = ScanHeader::parse(&[1, 1, 0x00, 1, 5, 0x21]).unwrap();
        assert!(!refine.is_sequential());
        assert_eq!((refine.ah(), refine.al()), (2, 1));
    }

    #[test]
    fn skips_stuffed_bytes_and_restarts() {
        let data = [0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD0, 0x56, 0xFF, 0xD9];
        assert_eq!(skip_entropy_data(&data, 0).unwrap(), 7);
    }

    #[test]
    fn dri_value() {
        assert_eq!(parse_dri(&[0x00, 0x0A]).unwrap(), 10);
    }

    #[test]
    fn written_segment_reads_back() {
        let mut out = Vec::new();
        write_segment(&mut out, APP0 + 1, b"Exif\0\0");
        let (seg, end) = next_segment(&out, 0).unwrap();
        assert_eq!(seg.marker, 0xE1);
        assert_eq!(seg.data, b"Exif\0\0");
        assert_eq!(end, out.len());
    }
}
