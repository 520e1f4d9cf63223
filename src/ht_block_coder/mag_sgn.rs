/// Magnitude and sign (MagSgn) coding of cleanup-significant samples.
///
/// Each significant sample carries `m_n = U_q - e_k` raw bits, LSB first:
/// the sign followed by the magnitude bits below the one implied by `e_1`.
use super::bit_io::{ForwardReader, ForwardWriter, low_bits};
use super::cleanup::{QuadGrid, quad_sample_offset};
use crate::constants::{FORWARD_STUFF_BYTE, mag_sgn_buffer_size};
use crate::error::HtError;
use crate::traits::HtSample;

/// Bit length of `v`; zero for zero.
#[inline]
pub(crate) fn bit_length(v: u64) -> u32 {
    64 - v.leading_zeros()
}

/// Fills the block from the MagSgn segment, `coded[..ms_len]`.
///
/// Non-significant samples are written as zero. Samples of quads that
/// straddle the block edge are parsed but not stored.
#[allow(clippy::too_many_arguments)]
pub fn decode_mag_sgn<S: HtSample>(
    grid: &QuadGrid,
    coded: &[u8],
    ms_len: usize,
    p: u32,
    missing_msbs: u32,
    width: usize,
    height: usize,
    stride: usize,
    dst: &mut [S],
) -> Result<(), HtError> {
    let mut ms = ForwardReader::new(&coded[..ms_len.min(coded.len())], FORWARD_STUFF_BYTE);
    let max_u = missing_msbs + 2;
    let sign_shift = S::BITS - 1;
    let magnitude_mask = S::magnitude_mask();

    let qw = grid.quad_width;
    // OR of the bottom-row v_n values for each column pair, previous and current row
    let mut above_v = vec![0u64; qw + 2];
    let mut cur_v = vec![0u64; qw + 2];

    for qy in 0..grid.quad_height {
        cur_v.fill(0);
        for (q, info) in grid.row(qy).iter().enumerate() {
            let kappa = if qy == 0 || info.rho.count_ones() < 2 {
                1
            } else {
                bit_length(2 | above_v[q] | above_v[q + 1]) - 1
            };
            let u_q = info.u + kappa;
            if u_q > max_u {
                return Err(HtError::ExponentOutOfRange);
            }

            let mut v = [0u64; 4];
            for (bit, v_n) in v.iter_mut().enumerate() {
                let mut val = 0;
                if info.rho & (1 << bit) != 0 {
                    let m_n = u_q - ((info.e_k >> bit) & 1) as u32;
                    // with nothing to read the sign still comes from the next bit
                    let ms_val = if m_n == 0 { ms.fetch() & 1 } else { ms.take(m_n) };
                    let e_1 = ((info.e_1 >> bit) & 1) as u64;
                    *v_n = (ms_val & low_bits(m_n)) | (e_1 << m_n) | 1;
                    val = ((ms_val & 1) << sign_shift)
                        | ((v_n.wrapping_add(2) << (p - 1)) & magnitude_mask);
                }
                let (dx, dy) = quad_sample_offset(bit);
                let x = 2 * q + dx;
                let y = 2 * qy + dy;
                if x < width && y < height {
                    dst[y * stride + x] = S::from_u64(val);
                }
            }
            cur_v[q] |= v[1];
            cur_v[q + 1] = v[3];
        }
        std::mem::swap(&mut above_v, &mut cur_v);
    }
    Ok(())
}

pub struct MagSgnEncoder {
    writer: ForwardWriter,
}

impl MagSgnEncoder {
    pub fn new(sample_bits: u32) -> Self {
        Self {
            writer: ForwardWriter::new(mag_sgn_buffer_size(sample_bits)),
        }
    }

    /// Writes the significant samples of a quad. `s` holds `2(mu - 1) + sign`
    /// per sample.
    pub fn write_quad(&mut self, rho: u8, s: &[u64; 4], u_q: u32, e_k: u8) -> Result<(), HtError> {
        for (bit, &value) in s.iter().enumerate() {
            if rho & (1 << bit) == 0 {
                continue;
            }
            let m = u_q - ((e_k >> bit) & 1) as u32;
            self.writer.write(value & low_bits(m), m)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>, HtError> {
        self.writer.finish_mag_sgn()
    }
}
