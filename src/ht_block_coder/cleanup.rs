//! Cleanup pass: quad significance, EMB flags and exponent offsets.
//!
//! Decoding runs in two steps. This module decodes the MEL and VLC streams
//! into one [`QuadInfo`] per quad; `mag_sgn` then reads the MagSgn segment.
//! The encoder does both in a single sweep over the block.

use super::bit_io::{BackwardReader, BackwardWriter};
use super::mag_sgn::{MagSgnEncoder, bit_length};
use super::mel::{MelDecoder, MelEncoder};
use super::tables::{CodeTables, QuadRow, VlcEntry};
use super::vlc::{decode_u_pair, encode_u_pair, initial_row_context, non_initial_context};
use crate::coding_parameters::CodeBlockParams;
use crate::constants::{MAX_SCUP, MEL_BUFFER_SIZE, VLC_BUFFER_SIZE};
use crate::error::HtError;
use crate::traits::HtSample;

/// Column and row offset of quad sample `bit` (rho bit order).
#[inline]
pub(crate) fn quad_sample_offset(bit: usize) -> (usize, usize) {
    (bit >> 1, bit & 1)
}

/// Cleanup-pass metadata of one quad. `u` excludes `kappa`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuadInfo {
    pub rho: u8,
    pub e_k: u8,
    pub e_1: u8,
    pub u: u32,
}

#[derive(Debug, Clone)]
pub struct QuadGrid {
    pub quad_width: usize,
    pub quad_height: usize,
    quads: Vec<QuadInfo>,
}

impl QuadGrid {
    pub fn new(width: usize, height: usize) -> Self {
        let quad_width = width.div_ceil(2);
        let quad_height = height.div_ceil(2);
        Self {
            quad_width,
            quad_height,
            quads: vec![QuadInfo::default(); quad_width * quad_height],
        }
    }

    pub fn row(&self, qy: usize) -> &[QuadInfo] {
        &self.quads[qy * self.quad_width..(qy + 1) * self.quad_width]
    }

    pub fn row_mut(&mut self, qy: usize) -> &mut [QuadInfo] {
        &mut self.quads[qy * self.quad_width..(qy + 1) * self.quad_width]
    }

    /// Significance of sample (x, y) according to the cleanup pass.
    pub fn is_significant(&self, x: usize, y: usize) -> bool {
        let quad = self.quads[(y / 2) * self.quad_width + x / 2];
        let bit = ((x & 1) << 1) | (y & 1);
        quad.rho & (1 << bit) != 0
    }
}

fn context(row: QuadRow, above: &[u8], west: u8, q: usize) -> u32 {
    match row {
        QuadRow::Initial => initial_row_context(west),
        QuadRow::NonInitial => non_initial_context(above, west, q),
    }
}

/// A zero-context quad is only looked up when MEL signals significance.
fn decode_quad(
    tables: &CodeTables,
    row: QuadRow,
    c_q: u32,
    vlc: &mut BackwardReader<'_>,
    mel: &mut MelDecoder<'_>,
) -> VlcEntry {
    if c_q == 0 && !mel.next_event() {
        return VlcEntry::default();
    }
    let entry = tables.vlc_entry(row, c_q, vlc.fetch());
    vlc.advance(entry.len as u32);
    entry
}

/// Decodes the MEL and VLC streams of a cleanup segment of `lcup` bytes
/// whose MEL+VLC part is `scup` bytes long.
pub fn decode_cleanup(
    coded: &[u8],
    lcup: usize,
    scup: usize,
    width: usize,
    height: usize,
    tables: &CodeTables,
) -> QuadGrid {
    let mut grid = QuadGrid::new(width, height);
    let qw = grid.quad_width;
    let mut mel = MelDecoder::new(coded, lcup, scup);
    let mut vlc = BackwardReader::for_vlc(coded, lcup, scup);
    let mut above = vec![0u8; qw];
    let mut current = vec![0u8; qw];

    for qy in 0..grid.quad_height {
        let row = if qy == 0 { QuadRow::Initial } else { QuadRow::NonInitial };
        let mut west = 0u8;
        for q in (0..qw).step_by(2) {
            let first = decode_quad(tables, row, context(row, &above, west, q), &mut vlc, &mut mel);
            west = first.rho;
            let second = if q + 1 < qw {
                let entry = decode_quad(tables, row, context(row, &above, west, q + 1), &mut vlc, &mut mel);
                west = entry.rho;
                entry
            } else {
                VlcEntry::default()
            };

            let mut mode = first.u_off as u32 | ((second.u_off as u32) << 1);
            if row == QuadRow::Initial && mode == 3 && mel.next_event() {
                mode = 4;
            }
            let (u0, u1) = decode_u_pair(tables, row, mode, &mut vlc);

            let quads = grid.row_mut(qy);
            quads[q] = QuadInfo { rho: first.rho, e_k: first.e_k, e_1: first.e_1, u: u0 };
            current[q] = first.rho;
            if q + 1 < qw {
                quads[q + 1] = QuadInfo { rho: second.rho, e_k: second.e_k, e_1: second.e_1, u: u1 };
                current[q + 1] = second.rho;
            }
        }
        std::mem::swap(&mut above, &mut current);
    }
    grid
}

/// Samples of one quad reduced to what the cleanup pass codes.
#[derive(Debug, Clone, Copy, Default)]
struct QuadSamples {
    rho: u8,
    /// Exponent `bitlen(2 mu - 1)` per sample, zero when insignificant.
    e_q: [u32; 4],
    e_max: u32,
    /// `2 (mu - 1) + sign` per significant sample.
    s: [u64; 4],
}

impl QuadSamples {
    fn gather<S: HtSample>(samples: &[S], params: &CodeBlockParams, q: usize, qy: usize, p: u32) -> Self {
        let mut quad = Self::default();
        for bit in 0..4 {
            let (dx, dy) = quad_sample_offset(bit);
            let x = 2 * q + dx;
            let y = 2 * qy + dy;
            if x >= params.width as usize || y >= params.height as usize {
                continue;
            }
            let t = samples[y * params.stride + x];
            let val = ((t.magnitude() << 1) >> p) & !1;
            if val != 0 {
                quad.rho |= 1 << bit;
                quad.e_q[bit] = bit_length(val - 1);
                quad.e_max = quad.e_max.max(quad.e_q[bit]);
                quad.s[bit] = (val - 2) + t.is_negative() as u64;
            }
        }
        quad
    }

    /// Samples whose exponent equals `e`.
    fn emb(&self, e: u32) -> u32 {
        (0..4)
            .filter(|&bit| self.rho & (1 << bit) != 0 && self.e_q[bit] == e)
            .fold(0, |acc, bit| acc | (1 << bit))
    }
}

/// Encodes the cleanup pass at bitplane `p` and lays out the segment
/// `[MagSgn][MEL][VLC reversed]` with the interface locator in its last two
/// bytes.
pub fn encode_cleanup<S: HtSample>(
    samples: &[S],
    params: &CodeBlockParams,
    p: u32,
    tables: &CodeTables,
) -> Result<Vec<u8>, HtError> {
    let qw = (params.width as usize).div_ceil(2);
    let qh = (params.height as usize).div_ceil(2);
    let mut mel = MelEncoder::new(MEL_BUFFER_SIZE);
    let mut vlc = BackwardWriter::for_vlc(VLC_BUFFER_SIZE);
    let mut ms = MagSgnEncoder::new(S::BITS);

    let mut above_rho = vec![0u8; qw];
    let mut current_rho = vec![0u8; qw];
    // max exponent of the bottom samples around each column pair
    let mut above_e = vec![0u32; qw + 2];
    let mut current_e = vec![0u32; qw + 2];

    for qy in 0..qh {
        let row = if qy == 0 { QuadRow::Initial } else { QuadRow::NonInitial };
        current_e.fill(0);
        let mut west = 0u8;
        for pair in (0..qw).step_by(2) {
            let mut u = [0u32; 2];
            for (k, u_k) in u.iter_mut().enumerate() {
                let q = pair + k;
                if q >= qw {
                    break;
                }
                let quad = QuadSamples::gather(samples, params, q, qy, p);
                let c_q = context(row, &above_rho, west, q);
                let kappa = if row == QuadRow::Initial || quad.rho.count_ones() < 2 {
                    1
                } else {
                    above_e[q].max(above_e[q + 1]).saturating_sub(1).max(1)
                };
                let u_q = quad.e_max.max(kappa);
                *u_k = u_q - kappa;
                let eps = if *u_k > 0 { quad.emb(quad.e_max) } else { 0 };

                let code = tables.vlc_code(row, c_q, quad.rho as u32, eps);
                vlc.write(code.cwd as u32, code.len as u32)?;
                if c_q == 0 {
                    mel.encode(quad.rho != 0)?;
                }
                ms.write_quad(quad.rho, &quad.s, u_q, code.e_k)?;

                current_rho[q] = quad.rho;
                west = quad.rho;
                current_e[q] = current_e[q].max(quad.e_q[1]);
                current_e[q + 1] = quad.e_q[3];
            }
            encode_u_pair(tables, row, u[0], u[1], &mut mel, &mut vlc)?;
        }
        std::mem::swap(&mut above_rho, &mut current_rho);
        std::mem::swap(&mut above_e, &mut current_e);
    }

    let mut data = ms.finish()?;
    let (mel_bytes, vlc_bytes) = terminate_mel_vlc(mel, vlc)?;
    let scup = mel_bytes.len() + vlc_bytes.len();
    if scup > MAX_SCUP {
        return Err(HtError::BufferFull);
    }
    data.extend_from_slice(&mel_bytes);
    data.extend(vlc_bytes.iter().rev());
    if let [.., low, high] = data.as_mut_slice() {
        *high = (scup >> 4) as u8;
        // the high nibble still carries VLC bits
        *low = (*low & 0xF0) | (scup & 0xF) as u8;
    }
    log::trace!(
        "cleanup: {}x{} p={} ms={} scup={}",
        params.width,
        params.height,
        p,
        data.len() - scup,
        scup
    );
    Ok(data)
}

/// Flushes MEL and VLC, sharing one byte between them when their pending
/// bits do not overlap.
fn terminate_mel_vlc(mut mel: MelEncoder, mut vlc: BackwardWriter) -> Result<(Vec<u8>, Vec<u8>), HtError> {
    let (mel_tmp, mel_mask) = mel.flush()?;
    let (vlc_tmp, vlc_used) = vlc.pending();
    let vlc_mask = (0xFFu32 >> (8 - vlc_used)) as u8;
    if mel_mask | vlc_mask == 0 {
        return Ok((mel.into_bytes(), vlc.into_bytes()));
    }
    let fuse = mel_tmp | vlc_tmp;
    let overlap = ((fuse ^ mel_tmp) & mel_mask) | ((fuse ^ vlc_tmp) & vlc_mask);
    if overlap == 0 && fuse != 0xFF && vlc.emitted() > 1 {
        mel.push(fuse)?;
    } else {
        mel.push(mel_tmp)?;
        vlc.push(vlc_tmp)?;
    }
    Ok((mel.into_bytes(), vlc.into_bytes()))
}
