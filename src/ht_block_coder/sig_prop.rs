//! Significance propagation (SigProp) pass.
//!
//! The pass visits the block in stripes of four rows and, within a stripe,
//! in groups of four columns. Significance is tracked as one nibble per
//! column (bit `r` = row `r` of the stripe), so a group is a 16-bit word and
//! two adjacent groups fit in a `u32`. A sample is a candidate when it is not
//! yet significant and one of its eight neighbours is; candidates are visited
//! column by column and each newly significant sample extends the candidate
//! set to the samples after it. The signs of a group's new samples follow its
//! significance bits.

use super::bit_io::{ForwardReader, ForwardWriter};
use super::cleanup::QuadGrid;
use crate::constants::SPP_BUFFER_SIZE;
use crate::error::HtError;
use crate::traits::HtSample;

/// Neighbours that become candidates when the sample in row `r` of a column
/// turns significant: the rest of its column below it and the adjacent rows
/// of the next column.
const PROPAGATION: [u32; 4] = [0x33, 0x76, 0xEC, 0xC8];

/// Rows of a stripe present in the block, indexed by the stripe height.
const STRIPE_PATTERN: [u32; 5] = [0x0000, 0x1111, 0x3333, 0x7777, 0xFFFF];

/// Cleanup-pass significance in stripe/column-group layout, with one zero
/// stripe and one zero group past the block edge.
#[derive(Debug, Clone)]
pub struct SigmaMap {
    groups: usize,
    stripes: usize,
    words: Vec<u16>,
}

impl SigmaMap {
    pub fn from_fn(width: usize, height: usize, significant: impl Fn(usize, usize) -> bool) -> Self {
        let groups = width.div_ceil(4) + 1;
        let stripes = height.div_ceil(4) + 1;
        let mut words = vec![0u16; groups * stripes];
        for y in 0..height {
            for x in 0..width {
                if significant(x, y) {
                    words[(y / 4) * groups + x / 4] |= 1 << ((x % 4) * 4 + y % 4);
                }
            }
        }
        Self { groups, stripes, words }
    }

    pub fn from_grid(grid: &QuadGrid, width: usize, height: usize) -> Self {
        Self::from_fn(width, height, |x, y| grid.is_significant(x, y))
    }

    fn word(&self, stripe: usize, group: usize) -> u32 {
        if stripe >= self.stripes || group >= self.groups {
            return 0;
        }
        self.words[stripe * self.groups + group] as u32
    }

    /// Group `group` in the low half, the group to its right in the high half.
    pub(crate) fn pair(&self, stripe: usize, group: usize) -> u32 {
        self.word(stripe, group) | (self.word(stripe, group + 1) << 16)
    }
}

/// Position of nibble bit `b` relative to the group origin.
#[inline]
pub(crate) fn group_offset(b: u32) -> (usize, usize) {
    ((b >> 2) as usize, (b & 3) as usize)
}

/// Walks the column groups in pass order. `visit` receives the group
/// origin, its initial candidate set and the samples that may still become
/// significant, and returns the samples it made significant.
fn scan_groups(
    sigma: &SigmaMap,
    width: usize,
    height: usize,
    stripe_causal: bool,
    mut visit: impl FnMut(usize, usize, u32, u32) -> Result<u32, HtError>,
) -> Result<(), HtError> {
    let groups = width.div_ceil(4);
    // significance after this pass of the last row of the previous stripe
    let mut prev_row = vec![0u16; groups + 1];

    for stripe in 0..height.div_ceil(4) {
        let y0 = stripe * 4;
        let rows = STRIPE_PATTERN[(height - y0).min(4)];
        let mut prev = 0u32;
        for g in 0..groups {
            let x0 = g * 4;
            let pattern = rows & (0xFFFF >> (4 * (4 - (width - x0).min(4))));

            let ps = prev_row[g] as u32 | ((prev_row[g + 1] as u32) << 16);
            let cs = sigma.pair(stripe, g);
            let mut u = (ps & 0x8888_8888) >> 3;
            if !stripe_causal {
                u |= (sigma.pair(stripe + 1, g) & 0x1111_1111) << 3;
            }

            let mut mbr = cs | ((cs & 0x7777_7777) << 1) | ((cs & 0xEEEE_EEEE) >> 1) | u;
            let t = mbr;
            mbr |= (t << 4) | (t >> 4) | (prev >> 12);
            mbr &= pattern & !cs;

            let new_sig = if mbr != 0 { visit(x0, y0, mbr, !cs & pattern)? } else { 0 };

            let t = (new_sig | cs) & 0xFFFF;
            prev_row[g] = t as u16;
            prev = (t | ((t & 0x7777) << 1) | ((t & 0xEEEE) >> 1) | u) & 0xF000;
        }
    }
    Ok(())
}

/// Visits the candidates of one group column by column. `decide` returns
/// whether the sample at nibble bit `b` became significant.
fn propagate(
    mut candidates: u32,
    open: u32,
    mut decide: impl FnMut(u32) -> Result<bool, HtError>,
) -> Result<u32, HtError> {
    let mut new_sig = 0;
    for col in (0..16).step_by(4) {
        for row in 0..4 {
            let b = col + row;
            if candidates & (1 << b) == 0 {
                continue;
            }
            if decide(b)? {
                new_sig |= 1 << b;
                candidates |= (PROPAGATION[row as usize] << col) & open;
            }
        }
    }
    Ok(new_sig)
}

/// Nibble bits of `set` in column-major order.
fn bits_of(set: u32) -> impl Iterator<Item = u32> {
    (0..16).filter(move |b| set & (1 << b) != 0)
}

/// Decodes the SigProp pass from the start of the refinement segment at
/// bitplane `p - 1`. Newly significant samples are set to the centre of
/// their bin.
#[allow(clippy::too_many_arguments)]
pub fn decode_sig_prop<S: HtSample>(
    sigma: &SigmaMap,
    segment: &[u8],
    p: u32,
    width: usize,
    height: usize,
    stride: usize,
    stripe_causal: bool,
    dst: &mut [S],
) -> Result<(), HtError> {
    let mut reader = ForwardReader::new(segment, 0);
    let value = 3u64 << (p - 2);
    let sign_shift = S::BITS - 1;

    scan_groups(sigma, width, height, stripe_causal, |x0, y0, candidates, open| {
        let new_sig = propagate(candidates, open, |_| Ok(reader.take(1) == 1))?;
        for b in bits_of(new_sig) {
            let (dx, dy) = group_offset(b);
            let sign = reader.take(1);
            dst[(y0 + dy) * stride + x0 + dx] = S::from_u64((sign << sign_shift) | value);
        }
        Ok(new_sig)
    })
}

/// Encodes the SigProp pass: bit `p - 1` of every candidate, then the signs
/// of the samples that became significant.
pub fn encode_sig_prop<S: HtSample>(
    samples: &[S],
    sigma: &SigmaMap,
    width: usize,
    height: usize,
    stride: usize,
    p: u32,
    stripe_causal: bool,
) -> Result<Vec<u8>, HtError> {
    let mut writer = ForwardWriter::new(SPP_BUFFER_SIZE);
    scan_groups(sigma, width, height, stripe_causal, |x0, y0, candidates, open| {
        let sample = |b: u32| {
            let (dx, dy) = group_offset(b);
            samples[(y0 + dy) * stride + x0 + dx]
        };
        let new_sig = propagate(candidates, open, |b| {
            let bit = (sample(b).magnitude() >> (p - 1)) & 1;
            writer.write(bit, 1)?;
            Ok(bit == 1)
        })?;
        for b in bits_of(new_sig) {
            writer.write(sample(b).is_negative() as u64, 1)?;
        }
        Ok(new_sig)
    })?;
    writer.finish_sig_prop()
}
