/// Quad significance contexts and UVLC coding of exponent offsets.
///
/// Quad significance `rho` bits: 1 = top-left, 2 = bottom-left,
/// 4 = top-right, 8 = bottom-right.
use super::bit_io::{BackwardReader, BackwardWriter, low_bits};
use super::mel::MelEncoder;
use super::tables::{CodeTables, QuadRow};
use crate::constants::UVLC_EXTENSION_THRESHOLD;
use crate::error::HtError;

/// Context of a first-row quad, from the quad to its west.
#[inline]
pub fn initial_row_context(west_rho: u8) -> u32 {
    let rho = west_rho as u32;
    ((rho & 1) | ((rho >> 1) & 1)) | (((rho >> 2) & 1) << 1) | (((rho >> 3) & 1) << 2)
}

/// Context of quad `q` in a later row, from the west quad of the same row
/// and the quads above it.
#[inline]
pub fn non_initial_context(above: &[u8], west_rho: u8, q: usize) -> u32 {
    let at = |i: Option<usize>| i.and_then(|i| above.get(i)).copied().unwrap_or(0) as u32;
    let north_west = at(q.checked_sub(1));
    let north = at(Some(q));
    let north_east = at(Some(q + 1));
    let bit0 = ((north_west >> 3) | (north >> 1)) & 1;
    let bit1 = (west_rho & 0xC != 0) as u32;
    let bit2 = ((north >> 3) | (north_east >> 1)) & 1;
    bit0 | (bit1 << 1) | (bit2 << 2)
}

/// Reads the exponent offsets of a quad pair. `mode` is
/// `u_off0 | u_off1 << 1`, or 4 after an initial-row "both above two" event.
pub fn decode_u_pair(
    tables: &CodeTables,
    row: QuadRow,
    mode: u32,
    vlc: &mut BackwardReader<'_>,
) -> (u32, u32) {
    if mode == 0 {
        return (0, 0);
    }
    let entry = tables.uvlc_entry(row, mode, vlc.fetch());
    vlc.advance(entry.prefix_len as u32);
    let suffix = vlc.fetch() & low_bits(entry.suffix_len as u32);
    vlc.advance(entry.suffix_len as u32);

    let mut u0 = entry.u0 as u32 + (suffix & low_bits(entry.suffix_len0 as u32)) as u32;
    let mut u1 = entry.u1 as u32 + (suffix >> entry.suffix_len0) as u32;

    for (u, bias) in [(&mut u0, entry.bias0), (&mut u1, entry.bias1)] {
        if u.saturating_sub(bias as u32) > UVLC_EXTENSION_THRESHOLD {
            let ext = (vlc.fetch() & 0xF) as u32;
            vlc.advance(4);
            *u += ext << 2;
        }
    }
    (u0, u1)
}

/// Writes the exponent offsets of a quad pair, including the MEL event
/// that initial-row pairs with two non-zero offsets carry.
pub fn encode_u_pair(
    tables: &CodeTables,
    row: QuadRow,
    u0: u32,
    u1: u32,
    mel: &mut MelEncoder,
    vlc: &mut BackwardWriter,
) -> Result<(), HtError> {
    if row == QuadRow::Initial && u0 > 0 && u1 > 0 {
        mel.encode(u0.min(u1) > 2)?;
        if u0 > 2 && u1 > 2 {
            return write_codes(tables, u0 - 2, u1 - 2, vlc);
        }
        if u0 > 2 {
            let code = tables.uvlc_code(u0);
            vlc.write(code.pre as u32, code.pre_len as u32)?;
            vlc.write(u1 - 1, 1)?;
            vlc.write(code.suf as u32, code.suf_len as u32)?;
            vlc.write(code.ext as u32, code.ext_len as u32)?;
            return Ok(());
        }
    }
    write_codes(tables, u0, u1, vlc)
}

fn write_codes(tables: &CodeTables, u0: u32, u1: u32, vlc: &mut BackwardWriter) -> Result<(), HtError> {
    let c0 = tables.uvlc_code(u0);
    let c1 = tables.uvlc_code(u1);
    vlc.write(c0.pre as u32, c0.pre_len as u32)?;
    vlc.write(c1.pre as u32, c1.pre_len as u32)?;
    vlc.write(c0.suf as u32, c0.suf_len as u32)?;
    vlc.write(c1.suf as u32, c1.suf_len as u32)?;
    vlc.write(c0.ext as u32, c0.ext_len as u32)?;
    vlc.write(c1.ext as u32, c1.ext_len as u32)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ht_block_coder::mel::MelDecoder;

    #[test]
    fn test_initial_row_context() {
        assert_eq!(initial_row_context(0), 0);
        assert_eq!(initial_row_context(0b0001), 1);
        assert_eq!(initial_row_context(0b0010), 1);
        assert_eq!(initial_row_context(0b0100), 2);
        assert_eq!(initial_row_context(0b1000), 4);
        assert_eq!(initial_row_context(0b1111), 7);
    }

    #[test]
    fn test_non_initial_context() {
        // bottom-right of the north-west quad
        assert_eq!(non_initial_context(&[8, 0, 0], 0, 1), 1);
        // bottom-left of the north quad
        assert_eq!(non_initial_context(&[0, 2, 0], 0, 1), 1);
        // right column of the west quad
        assert_eq!(non_initial_context(&[0, 0, 0], 4, 1), 2);
        assert_eq!(non_initial_context(&[0, 0, 0], 3, 1), 0);
        // bottom-right of north, bottom-left of north-east
        assert_eq!(non_initial_context(&[0, 8, 0], 0, 1), 4);
        assert_eq!(non_initial_context(&[0, 0, 2], 0, 1), 4);
        // neighbours beyond the row are insignificant
        assert_eq!(non_initial_context(&[2], 0, 0), 1);
        assert_eq!(non_initial_context(&[0xF, 0xF], 0, 2), 1);
    }

    /// Encodes offset pairs into a VLC segment (with MEL for initial rows)
    /// and decodes them back.
    fn round_trip(row: QuadRow, pairs: &[(u32, u32)]) {
        let tables = CodeTables::get();
        let mut mel = MelEncoder::new(4096);
        let mut vlc = BackwardWriter::for_vlc(4096);
        for &(u0, u1) in pairs {
            encode_u_pair(tables, row, u0, u1, &mut mel, &mut vlc).unwrap();
        }
        let (mel_tmp, mel_mask) = mel.flush().unwrap();
        let mut mel_bytes = mel.into_bytes();
        if mel_mask != 0 {
            mel_bytes.push(mel_tmp);
        }
        let mut vlc_bytes = vlc.finish().unwrap();
        vlc_bytes.reverse();

        // MEL bytes first, then the reversed VLC bytes; no MagSgn
        let mut segment = mel_bytes.clone();
        segment.extend_from_slice(&vlc_bytes);
        let lcup = segment.len();
        let scup = lcup;
        let mut mel_dec = MelDecoder::new(&segment, lcup, scup);
        let mut reader = BackwardReader::for_vlc(&segment, lcup, scup);
        for &(u0, u1) in pairs {
            let mut mode = (u0 > 0) as u32 | (((u1 > 0) as u32) << 1);
            if row == QuadRow::Initial && mode == 3 && mel_dec.next_event() {
                mode = 4;
            }
            assert_eq!(decode_u_pair(tables, row, mode, &mut reader), (u0, u1), "pair ({}, {})", u0, u1);
        }
    }

    #[test]
    fn test_u_pairs_non_initial() {
        let mut pairs = Vec::new();
        for u0 in 0..=64 {
            for u1 in [0, 1, 2, 3, 4, 5, 31, 32, 33, 40, 61] {
                pairs.push((u0, u1));
            }
        }
        round_trip(QuadRow::NonInitial, &pairs);
    }

    #[test]
    fn test_u_pairs_initial() {
        let mut pairs = Vec::new();
        for u0 in 0..=40 {
            for u1 in [0, 1, 2, 3, 4, 7, 34, 35, 60] {
                pairs.push((u0, u1));
            }
        }
        round_trip(QuadRow::Initial, &pairs);
    }
}
