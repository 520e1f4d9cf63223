//! VLC and UVLC code tables for the HT cleanup pass.
//!
//! The cleanup pass codes, per quad, the significance pattern `rho`, the
//! EMB flags `e_k`/`e_1` and whether the quad carries a non-zero exponent
//! offset (`u_off`) with one variable-length codeword selected by a 3-bit
//! context `c_q`. The exponent offsets of a quad pair are then coded with a
//! unary/binary (UVLC) code. All tables here are built once from a canonical
//! source table and never change afterwards.

use crate::constants::{
    UVLC_ENCODE_ENTRIES, UVLC_INITIAL_TABLE_SIZE, UVLC_TABLE_SIZE, VLC_DECODE_TABLE_SIZE,
    VLC_ENCODE_TABLE_SIZE, VLC_MAX_CODEWORD_LENGTH,
};
use crate::error::HtError;
use std::sync::OnceLock;

/// The two context geometries of the cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadRow {
    /// First row of quads; the context only sees the west neighbour.
    Initial,
    /// Every later row; the context also sees the row above.
    NonInitial,
}

/// One row of a canonical CxtVLC source table.
///
/// `cwd` holds the codeword in stream order: its least significant bit is
/// the first bit read from the VLC segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCodeword {
    pub c_q: u8,
    pub rho: u8,
    pub u_off: u8,
    pub e_k: u8,
    pub e_1: u8,
    pub cwd: u8,
    pub len: u8,
}

/// Decoded CxtVLC symbol. A zero `len` marks an index no codeword reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VlcEntry {
    pub rho: u8,
    pub u_off: u8,
    pub e_k: u8,
    pub e_1: u8,
    pub len: u8,
}

/// CxtVLC codeword chosen by the encoder for a `(c_q, rho, emb)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VlcCode {
    pub cwd: u8,
    pub len: u8,
    pub e_k: u8,
}

/// Partially decoded UVLC codes of a quad pair.
///
/// `u0`/`u1` are the values implied by the prefixes; the suffix bits are
/// added by the caller. `bias0`/`bias1` undo the offsets used at initial-row
/// pairs so the extension test sees the value the encoder actually coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UvlcEntry {
    pub prefix_len: u8,
    pub suffix_len: u8,
    pub suffix_len0: u8,
    pub u0: u8,
    pub u1: u8,
    pub bias0: u8,
    pub bias1: u8,
}

/// UVLC code of a single `u` value: prefix, suffix and extension fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UvlcCode {
    pub pre: u8,
    pub pre_len: u8,
    pub suf: u8,
    pub suf_len: u8,
    pub ext: u8,
    pub ext_len: u8,
}

/// Codeword lengths 1..=7 assigned, in order, to the symbols of one context.
const LENGTH_COUNTS: [u8; 7] = [0, 0, 1, 3, 5, 7, 54];
/// Context zero has no `rho = 0` symbol; that event is carried by MEL.
const LENGTH_COUNTS_ZERO_CONTEXT: [u8; 7] = [0, 0, 1, 3, 5, 8, 52];

/// UVLC prefix decoding, indexed by the next three stream bits:
/// (prefix length, suffix length, u implied by the prefix).
const UVLC_PREFIX: [(u8, u8, u8); 8] = [
    (3, 5, 5), // "000"
    (1, 0, 1), // "xx1"
    (2, 0, 2), // "x10"
    (1, 0, 1), // "xx1"
    (3, 1, 3), // "100"
    (1, 0, 1), // "xx1"
    (2, 0, 2), // "x10"
    (1, 0, 1), // "xx1"
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTables {
    vlc_initial: Vec<VlcEntry>,
    vlc_non_initial: Vec<VlcEntry>,
    vlc_code_initial: Vec<VlcCode>,
    vlc_code_non_initial: Vec<VlcCode>,
    uvlc_initial: Vec<UvlcEntry>,
    uvlc_non_initial: Vec<UvlcEntry>,
    uvlc_code: Vec<UvlcCode>,
}

impl CodeTables {
    /// Process-wide tables, built on first use.
    pub fn get() -> &'static CodeTables {
        static TABLES: OnceLock<CodeTables> = OnceLock::new();
        TABLES.get_or_init(CodeTables::new)
    }

    /// Builds the tables from the built-in source table.
    pub fn new() -> Self {
        let initial = default_source_table(QuadRow::Initial);
        let non_initial = default_source_table(QuadRow::NonInitial);
        Self::build(&initial, &non_initial)
    }

    /// Builds the tables from externally supplied source tables, such as the
    /// CxtVLC tables published with ITU-T T.814.
    pub fn from_source(
        initial: &[SourceCodeword],
        non_initial: &[SourceCodeword],
    ) -> Result<Self, HtError> {
        validate_source(initial)?;
        validate_source(non_initial)?;
        Ok(Self::build(initial, non_initial))
    }

    /// Builds the tables from source text holding one `{c_q, rho, u_off, e_k,
    /// e_1, cwd, len}` row per codeword, as in the table0/table1 headers
    /// distributed with HT codec implementations.
    pub fn from_source_text(initial: &str, non_initial: &str) -> Result<Self, HtError> {
        Self::from_source(&parse_source_table(initial)?, &parse_source_table(non_initial)?)
    }

    fn build(initial: &[SourceCodeword], non_initial: &[SourceCodeword]) -> Self {
        Self {
            vlc_initial: build_vlc_decode(initial),
            vlc_non_initial: build_vlc_decode(non_initial),
            vlc_code_initial: build_vlc_encode(initial),
            vlc_code_non_initial: build_vlc_encode(non_initial),
            uvlc_initial: build_uvlc_decode(QuadRow::Initial),
            uvlc_non_initial: build_uvlc_decode(QuadRow::NonInitial),
            uvlc_code: build_uvlc_encode(),
        }
    }

    /// Looks up the CxtVLC symbol for context `c_q` at the head of the stream.
    #[inline]
    pub fn vlc_entry(&self, row: QuadRow, c_q: u32, head: u64) -> VlcEntry {
        let index = ((c_q as usize & 0x7) << 7) | (head & 0x7F) as usize;
        match row {
            QuadRow::Initial => self.vlc_initial[index],
            QuadRow::NonInitial => self.vlc_non_initial[index],
        }
    }

    /// `mode` is `u_off0 | u_off1 << 1`, or 4 for an initial-row pair whose
    /// MEL event signalled that both offsets exceed two.
    #[inline]
    pub fn uvlc_entry(&self, row: QuadRow, mode: u32, head: u64) -> UvlcEntry {
        let index = ((mode as usize) << 6) | (head & 0x3F) as usize;
        match row {
            QuadRow::Initial => self.uvlc_initial.get(index).copied().unwrap_or_default(),
            QuadRow::NonInitial => self.uvlc_non_initial.get(index).copied().unwrap_or_default(),
        }
    }

    #[inline]
    pub fn vlc_code(&self, row: QuadRow, c_q: u32, rho: u32, emb: u32) -> VlcCode {
        let index = ((c_q as usize & 0x7) << 8) | ((rho as usize & 0xF) << 4) | (emb as usize & 0xF);
        match row {
            QuadRow::Initial => self.vlc_code_initial[index],
            QuadRow::NonInitial => self.vlc_code_non_initial[index],
        }
    }

    /// UVLC code for `u`; values beyond the table get the largest code.
    #[inline]
    pub fn uvlc_code(&self, u: u32) -> UvlcCode {
        let index = (u as usize).min(UVLC_ENCODE_ENTRIES - 1);
        self.uvlc_code[index]
    }
}

impl Default for CodeTables {
    fn default() -> Self {
        Self::new()
    }
}

fn low_mask(len: u8) -> u32 {
    (1u32 << len) - 1
}

/// Target significance count around which a context's shortest codewords are
/// placed: busier neighbourhoods favour denser quads.
fn preferred_popcount(row: QuadRow, c_q: u8) -> u32 {
    let neighbours = c_q.count_ones();
    match row {
        QuadRow::Initial => (neighbours + 1).min(4),
        QuadRow::NonInitial => ((neighbours * 3 + 1) / 2).min(4),
    }
}

/// Deterministic canonical prefix code over the CxtVLC alphabet.
///
/// Every context carries, for each non-zero `rho`, a symbol without offset
/// and an offset symbol with all EMB flags set. Patterns with two or more
/// samples add an offset symbol without EMB flags and one offset symbol per
/// sample that flags only that sample as reaching the maximum exponent.
/// Non-zero contexts add `rho = 0`. Symbols closer to the context's preferred density get shorter
/// codewords; lengths follow a fixed Kraft-complete schedule and codes are
/// assigned canonically, shortest first.
pub fn default_source_table(row: QuadRow) -> Vec<SourceCodeword> {
    let mut table = Vec::new();
    for c_q in 0u8..8 {
        // (rank, rho, u_off, e_k, e_1)
        let mut symbols: Vec<(u32, u8, u8, u8, u8)> = Vec::new();
        let target = preferred_popcount(row, c_q);
        for rho in 0u8..16 {
            if rho == 0 && c_q == 0 {
                continue;
            }
            let density = rho.count_ones();
            let base = 8 * density.abs_diff(target);
            symbols.push((base, rho, 0, 0, 0));
            if rho != 0 {
                symbols.push((base + 1, rho, 1, rho, rho));
            }
            if density >= 2 {
                symbols.push((base + 2, rho, 1, 0, 0));
                for bit in (0..4).map(|b| 1u8 << b).filter(|b| rho & b != 0) {
                    symbols.push((base + 3, rho, 1, bit, bit));
                }
            }
        }
        symbols.sort_by_key(|&(rank, rho, u_off, e_k, _)| (rank, rho, u_off, e_k));

        let counts = if c_q == 0 { &LENGTH_COUNTS_ZERO_CONTEXT } else { &LENGTH_COUNTS };
        let mut code: u32 = 0;
        let mut next = symbols.iter();
        for (i, &count) in counts.iter().enumerate() {
            let len = (i + 1) as u8;
            for _ in 0..count {
                if let Some(&(_, rho, u_off, e_k, e_1)) = next.next() {
                    // canonical codes are MSB first; the stream is read LSB first
                    let cwd = (code.reverse_bits() >> (32 - len as u32)) as u8;
                    table.push(SourceCodeword { c_q, rho, u_off, e_k, e_1, cwd, len });
                }
                code += 1;
            }
            code <<= 1;
        }
    }
    table
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("//") {
            rest = tail.find('\n').map_or("", |end| &tail[end..]);
        } else if let Some(tail) = rest.strip_prefix("/*") {
            rest = tail.find("*/").map_or("", |end| &tail[end + 2..]);
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}

fn parse_field(field: &str) -> Result<u8, HtError> {
    let field = field.trim();
    let parsed = match field.strip_prefix("0x").or_else(|| field.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => field.parse::<u8>(),
    };
    parsed.map_err(|_| HtError::InvalidCodeTable)
}

/// Parses CxtVLC source rows written as brace-delimited tuples of seven
/// decimal or hexadecimal fields. Comments and text outside braces are
/// ignored. The rows are not checked for consistency; [`CodeTables::from_source`]
/// does that.
pub fn parse_source_table(text: &str) -> Result<Vec<SourceCodeword>, HtError> {
    let text = strip_comments(text);
    let mut table = Vec::new();
    for chunk in text.split('{').skip(1) {
        let body = chunk.split('}').next().unwrap_or_default();
        if body.trim().is_empty() {
            continue;
        }
        let fields = body
            .split(',')
            .filter(|f| !f.trim().is_empty())
            .map(parse_field)
            .collect::<Result<Vec<u8>, HtError>>()?;
        let &[c_q, rho, u_off, e_k, e_1, cwd, len] = fields.as_slice() else {
            return Err(HtError::InvalidCodeTable);
        };
        table.push(SourceCodeword { c_q, rho, u_off, e_k, e_1, cwd, len });
    }
    if table.is_empty() {
        return Err(HtError::InvalidCodeTable);
    }
    Ok(table)
}

fn validate_source(table: &[SourceCodeword]) -> Result<(), HtError> {
    for entry in table {
        if entry.c_q > 7
            || entry.rho > 0xF
            || entry.u_off > 1
            || entry.len == 0
            || entry.len > VLC_MAX_CODEWORD_LENGTH
            || entry.cwd as u32 > low_mask(entry.len)
            || entry.e_k & !entry.rho != 0
            || entry.e_1 & !entry.e_k != 0
            || (entry.u_off == 0 && entry.e_k != 0)
            || (entry.rho == 0 && (entry.u_off != 0 || entry.c_q == 0))
        {
            return Err(HtError::InvalidCodeTable);
        }
    }

    for (i, a) in table.iter().enumerate() {
        for b in &table[i + 1..] {
            if a.c_q != b.c_q {
                continue;
            }
            let shorter = a.len.min(b.len);
            let mask = low_mask(shorter);
            if (a.cwd as u32 & mask) == (b.cwd as u32 & mask) {
                return Err(HtError::InvalidCodeTable);
            }
        }
    }

    // every triple the encoder can produce must have a codeword
    let codes = build_vlc_encode(table);
    for c_q in 0u32..8 {
        for rho in 0u32..16 {
            if rho == 0 && c_q == 0 {
                continue;
            }
            let mut emb = rho;
            loop {
                let code = codes[((c_q << 8) | (rho << 4) | emb) as usize];
                let found = table.iter().any(|e| {
                    e.c_q as u32 == c_q && e.rho as u32 == rho && e.len == code.len && e.cwd == code.cwd
                });
                if !found {
                    return Err(HtError::InvalidCodeTable);
                }
                if emb == 0 {
                    break;
                }
                emb = (emb - 1) & rho;
            }
        }
    }
    Ok(())
}

fn build_vlc_decode(source: &[SourceCodeword]) -> Vec<VlcEntry> {
    let mut table = vec![VlcEntry::default(); VLC_DECODE_TABLE_SIZE];
    for (i, slot) in table.iter_mut().enumerate() {
        let c_q = (i >> 7) as u8;
        let head = (i & 0x7F) as u32;
        for entry in source.iter().filter(|e| e.c_q == c_q) {
            if entry.cwd as u32 == head & low_mask(entry.len) {
                *slot = VlcEntry {
                    rho: entry.rho,
                    u_off: entry.u_off,
                    e_k: entry.e_k,
                    e_1: entry.e_1,
                    len: entry.len,
                };
            }
        }
    }
    table
}

fn build_vlc_encode(source: &[SourceCodeword]) -> Vec<VlcCode> {
    let mut table = vec![VlcCode::default(); VLC_ENCODE_TABLE_SIZE];
    for (i, slot) in table.iter_mut().enumerate() {
        let c_q = (i >> 8) as u8;
        let rho = ((i >> 4) & 0xF) as u8;
        let emb = (i & 0xF) as u8;
        if emb & rho != emb || (rho == 0 && c_q == 0) {
            continue;
        }
        let mut candidates = source.iter().filter(|e| e.c_q == c_q && e.rho == rho);
        let best = if emb != 0 {
            // prefer the codeword implying the most EMB bits; the last wins ties
            let mut best: Option<&SourceCodeword> = None;
            for entry in candidates.filter(|e| e.u_off == 1 && (emb & e.e_k) == e.e_1) {
                if best.is_none_or(|b| entry.e_k.count_ones() >= b.e_k.count_ones()) {
                    best = Some(entry);
                }
            }
            best
        } else {
            candidates.find(|e| e.u_off == 0)
        };
        if let Some(entry) = best {
            *slot = VlcCode { cwd: entry.cwd, len: entry.len, e_k: entry.e_k };
        }
    }
    table
}

fn build_uvlc_decode(row: QuadRow) -> Vec<UvlcEntry> {
    let size = match row {
        QuadRow::Initial => UVLC_INITIAL_TABLE_SIZE,
        QuadRow::NonInitial => UVLC_TABLE_SIZE,
    };
    let mut table = vec![UvlcEntry::default(); size];
    for (i, slot) in table.iter_mut().enumerate() {
        let mode = i >> 6;
        let head = i & 0x3F;
        let (p0, s0, u0) = UVLC_PREFIX[head & 0x7];
        *slot = match mode {
            0 => UvlcEntry::default(),
            1 => UvlcEntry {
                prefix_len: p0,
                suffix_len: s0,
                suffix_len0: s0,
                u0,
                ..UvlcEntry::default()
            },
            2 => UvlcEntry {
                prefix_len: p0,
                suffix_len: s0,
                u1: u0,
                ..UvlcEntry::default()
            },
            _ => {
                let rest = head >> p0;
                let (p1, s1, u1) = UVLC_PREFIX[rest & 0x7];
                if mode == 4 {
                    // both u values exceed two; the MEL event removed that offset
                    UvlcEntry {
                        prefix_len: p0 + p1,
                        suffix_len: s0 + s1,
                        suffix_len0: s0,
                        u0: u0 + 2,
                        u1: u1 + 2,
                        bias0: 2,
                        bias1: 2,
                    }
                } else if row == QuadRow::Initial && p0 == 3 {
                    // u0 > 2 leaves u1 in {1, 2}, coded with a single bit
                    UvlcEntry {
                        prefix_len: p0 + 1,
                        suffix_len: s0,
                        suffix_len0: s0,
                        u0,
                        u1: (rest & 1) as u8 + 1,
                        bias0: 0,
                        bias1: 1,
                    }
                } else {
                    UvlcEntry {
                        prefix_len: p0 + p1,
                        suffix_len: s0 + s1,
                        suffix_len0: s0,
                        u0,
                        u1,
                        ..UvlcEntry::default()
                    }
                }
            }
        };
    }
    table
}

fn build_uvlc_encode() -> Vec<UvlcCode> {
    (0..UVLC_ENCODE_ENTRIES)
        .map(|u| match u {
            0 => UvlcCode::default(),
            1 => UvlcCode { pre: 1, pre_len: 1, ..UvlcCode::default() },
            2 => UvlcCode { pre: 2, pre_len: 2, ..UvlcCode::default() },
            3 | 4 => UvlcCode {
                pre: 4,
                pre_len: 3,
                suf: (u - 3) as u8,
                suf_len: 1,
                ..UvlcCode::default()
            },
            5..=32 => UvlcCode {
                pre: 0,
                pre_len: 3,
                suf: (u - 5) as u8,
                suf_len: 5,
                ..UvlcCode::default()
            },
            _ => UvlcCode {
                pre: 0,
                pre_len: 3,
                suf: (28 + (u - 33) % 4) as u8,
                suf_len: 5,
                ext: ((u - 33) / 4) as u8,
                ext_len: 4,
            },
        })
        .collect()
}
