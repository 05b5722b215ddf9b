// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Huffman coding for baseline scans: canonical decode/encode tables,
//! magnitude categories, and optimal table generation.

use super::bitio::BitReader;
use super::tables::HuffmanSpec;
use crate::bridge::CodecError;

/// Canonical decode table (T.81 F.2.2.3: MINCODE / MAXCODE / VALPTR).
pub struct DecodeTable {
    mincode: [i32; 17],
    /// `-1` for lengths without codes.
    maxcode: [i32; 17],
    valptr: [usize; 17],
    huffval: Vec<u8>,
}

impl DecodeTable {
    pub fn new(spec: &HuffmanSpec) -> Result<Self, CodecError> {
        let total: usize = spec.bits.iter().map(|&b| b as usize).sum();
        if total != spec.huffval.len() {
            return Err(CodecError::InvalidMarkerData("DHT symbol count mismatch"));
        }

        let mut mincode = [0i32; 17];
        let mut maxcode = [-1i32; 17];
        let mut valptr = [0usize; 17];
        let mut code = 0i32;
        let mut k = 0usize;

        for len in 1..=16 {
            let count = spec.bits[len - 1] as i32;
            valptr[len] = k;
            mincode[len] = code;
            code += count;
            k += count as usize;
            if count > 0 {
                maxcode[len] = code - 1;
            }
            if code > (1 << len) {
                return Err(CodecError::InvalidMarkerData("oversubscribed Huffman table"));
            }
            code <<= 1;
        }

        Ok(Self {
            mincode,
            maxcode,
            valptr,
            huffval: spec.huffval.clone(),
        })
    }

    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u8, CodecError> {
        let mut code = reader.read_bit()? as i32;
        let mut len = 1;
        while code > self.maxcode[len] {
            len += 1;
            if len > 16 {
                return Err(CodecError::HuffmanDecode);
            }
            code = (code << 1) | reader.read_bit()? as i32;
        }
        let idx = self.valptr[len] + (code - self.mincode[len]) as usize;
        self.huffval
            .get(idx)
            .copied()
            .ok_or(CodecError::HuffmanDecode)
    }
}

/// Symbol → (code, length). Length 0 marks an absent symbol.
pub struct EncodeTable {
    codes: [(u16, u8); 256],
}

impl EncodeTable {
    pub fn new(spec: &HuffmanSpec) -> Self {
        let mut codes = [(0u16, 0u8); 256];
        let mut code = 0u32;
        let mut symbols = spec.huffval.iter();
        for len in 1..=16u8 {
            for _ in 0..spec.bits[len as usize - 1] {
                if let Some(&sym) = symbols.next() {
                    codes[sym as usize] = (code as u16, len);
                }
                code += 1;
            }
            code <<= 1;
        }
        Self { codes }
    }

    pub fn code(&self, symbol: u8) -> Result<(u16, u8), CodecError> {
        match self.codes[symbol as usize] {
            (_, 0) => Err(CodecError::InvalidMarkerData("Huffman table missing code for symbol")),
            code => Ok(code),
        }
    }
}

/// Recover a signed value from its magnitude category and extra bits
/// (T.81 Table F.1 / procedure EXTEND).
pub fn extend(bits: u16, size: u8) -> i32 {
    if size == 0 {
        return 0;
    }
    let v = bits as i32;
    if v < 1 << (size - 1) {
        v - (1 << size) + 1
    } else {
        v
    }
}

/// Magnitude category and extra bits of `value`.
pub fn categorize(value: i32) -> (u8, u16) {
    if value == 0 {
        return (0, 0);
    }
    let size = (32 - value.unsigned_abs().leading_zeros()) as u8;
    let bits = if value > 0 { value } else { value - 1 };
    (size, (bits & ((1 << size) - 1)) as u16)
}

/// Build a length-limited optimal table from symbol counts
/// (T.81 Annex K.2, with the reserved all-ones code of K.3).
pub fn optimal_spec(class: u8, id: u8, counts: &[u32; 256]) -> HuffmanSpec {
    let mut freq = [0u64; 257];
    for (f, &c) in freq.iter_mut().zip(counts.iter()) {
        *f = c as u64;
    }
    if freq[..256].iter().all(|&f| f == 0) {
        freq[0] = 1;
    }
    // Pseudo-symbol: keeps every real code from being all ones.
    freq[256] = 1;

    let mut codesize = [0usize; 257];
    let mut others = [usize::MAX; 257];

    loop {
        let Some(c1) = least_frequent(&freq, None) else { break };
        let Some(c2) = least_frequent(&freq, Some(c1)) else { break };

        freq[c1] += freq[c2];
        freq[c2] = 0;

        let mut node = c1;
        codesize[node] += 1;
        while others[node] != usize::MAX {
            node = others[node];
            codesize[node] += 1;
        }
        others[node] = c2;

        let mut node = c2;
        codesize[node] += 1;
        while others[node] != usize::MAX {
            node = others[node];
            codesize[node] += 1;
        }
    }

    let max_size = codesize.iter().copied().max().unwrap_or(0).max(16);
    let mut bits = vec![0usize; max_size + 1];
    for &size in codesize.iter().filter(|&&s| s > 0) {
        bits[size] += 1;
    }

    // Limit code lengths to 16 bits.
    for i in (17..=max_size).rev() {
        while bits[i] > 0 {
            let mut j = i - 2;
            while bits[j] == 0 {
                j -= 1;
            }
            bits[i] -= 2;
            bits[i - 1] += 1;
            bits[j + 1] += 2;
            bits[j] -= 1;
        }
    }

    // Drop the pseudo-symbol, which holds one of the longest codes.
    if let Some(longest) = (1..=16).rev().find(|&i| bits[i] > 0) {
        bits[longest] -= 1;
    }

    let mut huffval = Vec::new();
    for size in 1..=max_size {
        for (sym, &s) in codesize[..256].iter().enumerate() {
            if s == size {
                huffval.push(sym as u8);
            }
        }
    }

    let mut spec_bits = [0u8; 16];
    for (dst, &count) in spec_bits.iter_mut().zip(&bits[1..=16]) {
        *dst = count as u8;
    }

    HuffmanSpec {
        class,
        id,
        bits: spec_bits,
        huffval,
    }
}

/// Index of the smallest nonzero frequency, preferring the larger index on
/// ties, skipping `exclude`.
fn least_frequent(freq: &[u64; 257], exclude: Option<usize>) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &f) in freq.iter().enumerate() {
        if f == 0 || Some(i) == exclude {
            continue;
        }
        if best.map_or(true, |b| f <= freq[b]) {
            best = Some(i);
        }
    }
    best
}
