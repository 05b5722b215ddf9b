// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! MSB-first bit I/O over entropy-coded segments with JPEG byte stuffing
//! (a data byte 0xFF is followed by 0x00).

use crate::bridge::CodecError;

/// Reads entropy-coded bits.
///
/// A marker inside the data is never consumed by bit reads; once one is
/// reached the reader supplies zero bits, as libjpeg does, and the caller
/// decides what to do with the marker.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Valid bits are the low `count` bits.
    acc: u32,
    count: u8,
    marker: Option<u8>,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            acc: 0,
            count: 0,
            marker: None,
        }
    }

    /// Read `n` bits (1–16), right-aligned.
    pub fn read_bits(&mut self, n: u8) -> Result<u16, CodecError> {
        debug_assert!((1..=16).contains(&n));
        while self.count < n {
            self.fill()?;
        }
        self.count -= n;
        Ok(((self.acc >> self.count) & ((1u32 << n) - 1)) as u16)
    }

    pub fn read_bit(&mut self) -> Result<u16, CodecError> {
        self.read_bits(1)
    }

    /// Drop buffered bits up to the next byte boundary.
    pub fn align(&mut self) {
        self.acc = 0;
        self.count = 0;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Consume an `RSTn` marker at the current position, skipping fill
    /// bytes. Returns the marker number, or `None` if the next marker is not
    /// a restart marker.
    pub fn take_restart(&mut self) -> Option<u8> {
        self.align();
        while self.data.get(self.pos) == Some(&0xFF) {
            match self.data.get(self.pos + 1) {
                Some(0xFF) => self.pos += 1,
                Some(&m @ 0xD0..=0xD7) => {
                    self.pos += 2;
                    self.marker = None;
                    return Some(m & 0x07);
                }
                _ => break,
            }
        }
        None
    }

    /// Marker byte the reader stopped at, if any.
    pub fn marker(&self) -> Option<u8> {
        self.marker
    }

    fn fill(&mut self) -> Result<(), CodecError> {
        if self.marker.is_some() {
            self.push(0);
            return Ok(());
        }
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        if byte == 0xFF {
            match self.data.get(self.pos + 1) {
                Some(0x00) => self.pos += 2,
                Some(&m) => {
                    self.marker = Some(m);
                    self.push(0);
                    return Ok(());
                }
                None => return Err(CodecError::UnexpectedEof),
            }
        } else {
            self.pos += 1;
        }
        self.push(byte);
        Ok(())
    }

    fn push(&mut self, byte: u8) {
        self.acc = (self.acc << 8) | byte as u32;
        self.count += 8;
    }
}

/// Writes entropy-coded bits with byte stuffing.
#[derive(Default)]
pub struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    count: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            acc: 0,
            count: 0,
        }
    }

    /// Write the low `n` bits (1–16) of `value`.
    pub fn write_bits(&mut self, value: u16, n: u8) {
        debug_assert!((1..=16).contains(&n));
        self.acc = (self.acc << n) | (value as u32 & ((1u32 << n) - 1));
        self.count += n;
        while self.count >= 8 {
            self.count -= 8;
            let byte = (self.acc >> self.count) as u8;
            self.out.push(byte);
            if byte == 0xFF {
                self.out.push(0x00);
            }
        }
        self.acc &= (1u32 << self.count) - 1;
    }

    /// Pad the partial byte with 1-bits.
    pub fn pad(&mut self) {
        if self.count > 0 {
            let fill = 8 - self.count;
            self.write_bits((1u16 << fill) - 1, fill);
        }
    }

    /// Pad, then emit `RSTn` unstuffed.
    pub fn restart(&mut self, n: u8) {
        self.pad();
        self.out.extend_from_slice(&[0xFF, 0xD0 + (n & 0x07)]);
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.pad();
        self.out
    }
}
