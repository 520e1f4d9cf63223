use super::cleanup::decode_cleanup;
use super::mag_ref::decode_mag_ref;
use super::mag_sgn::decode_mag_sgn;
use super::sig_prop::{SigmaMap, decode_sig_prop};
use super::tables::CodeTables;
use crate::coding_parameters::{CodeBlockParams, CodingPasses, SegmentLengths};
use crate::constants::{MAX_SCUP, MIN_SCUP};
use crate::error::HtError;
use crate::logging::Degradation;
use crate::traits::HtSample;

/// Byte layout of a coded block as read from its interface locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    /// MagSgn bytes at the start of the cleanup segment (`lcup - scup`).
    pub mag_sgn: usize,
    /// MEL and VLC bytes, locator included (`scup`).
    pub mel_vlc: usize,
    pub refinement: usize,
}

/// Checks the segment lengths against the data and reads the interface
/// locator of the cleanup segment.
pub fn inspect_cleanup(coded: &[u8], lengths: SegmentLengths) -> Result<SegmentLayout, HtError> {
    let lcup = lengths.cleanup;
    if lcup < MIN_SCUP {
        return Err(HtError::CleanupTooShort);
    }
    if coded.len() < lengths.total() {
        return Err(HtError::TruncatedSegment);
    }
    let scup = ((coded[lcup - 1] as usize) << 4) + (coded[lcup - 2] & 0xF) as usize;
    if scup < MIN_SCUP || scup > lcup || scup > MAX_SCUP {
        return Err(HtError::InvalidLocator);
    }
    Ok(SegmentLayout {
        mag_sgn: lcup - scup,
        mel_vlc: scup,
        refinement: lengths.refinement,
    })
}

/// HT block decoder. Holds only a reference to the immutable code tables,
/// so one instance can serve any number of blocks and threads.
#[derive(Debug, Clone, Copy)]
pub struct HTBlockDecoder<'t> {
    tables: &'t CodeTables,
}

impl HTBlockDecoder<'static> {
    pub fn new() -> Self {
        Self { tables: CodeTables::get() }
    }
}

impl Default for HTBlockDecoder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'t> HTBlockDecoder<'t> {
    pub fn with_tables(tables: &'t CodeTables) -> Self {
        Self { tables }
    }

    /// Decodes one code-block into `dst`, which is addressed with
    /// `params.stride`. On failure the block region of `dst` is zeroed.
    pub fn decode<S: HtSample>(
        &self,
        coded: &[u8],
        lengths: SegmentLengths,
        params: &CodeBlockParams,
        dst: &mut [S],
    ) -> Result<(), HtError> {
        params.validate()?;
        if dst.len() < params.required_len() {
            return Err(HtError::DestinationTooSmall);
        }
        let result = self.decode_passes(coded, lengths, params, dst);
        if result.is_err() {
            let width = params.width as usize;
            for row in dst.chunks_mut(params.stride).take(params.height as usize) {
                row[..width].fill(S::default());
            }
        }
        result
    }

    fn decode_passes<S: HtSample>(
        &self,
        coded: &[u8],
        lengths: SegmentLengths,
        params: &CodeBlockParams,
        dst: &mut [S],
    ) -> Result<(), HtError> {
        let mut passes = params.num_passes;
        if passes > CodingPasses::Cleanup && lengths.refinement == 0 {
            Degradation::EmptyRefinementSegment.report();
            passes = CodingPasses::Cleanup;
        }
        let p = S::cleanup_bitplane(params.missing_msbs).ok_or(HtError::InsufficientPrecision)?;
        if p == 1 && passes > CodingPasses::Cleanup {
            Degradation::RefinementBelowPrecision.report();
            passes = CodingPasses::Cleanup;
        }
        let layout = inspect_cleanup(coded, lengths)?;

        let (width, height) = (params.width as usize, params.height as usize);
        let lcup = lengths.cleanup;
        let cleanup = &coded[..lcup];
        log::trace!(
            "decode: {}x{} passes={} p={} ms={} scup={} ref={}",
            width,
            height,
            passes.count(),
            p,
            layout.mag_sgn,
            layout.mel_vlc,
            layout.refinement
        );

        let grid = decode_cleanup(cleanup, lcup, layout.mel_vlc, width, height, self.tables);
        decode_mag_sgn(
            &grid,
            cleanup,
            layout.mag_sgn,
            p,
            params.missing_msbs,
            width,
            height,
            params.stride,
            dst,
        )?;
        if passes == CodingPasses::Cleanup {
            return Ok(());
        }

        let refinement = &coded[lcup..lengths.total()];
        let sigma = SigmaMap::from_grid(&grid, width, height);
        decode_sig_prop(&sigma, refinement, p, width, height, params.stride, params.stripe_causal, dst)?;
        if passes == CodingPasses::MagRef {
            decode_mag_ref(&sigma, refinement, p, width, height, params.stride, dst)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_rejects_short_cleanup() {
        let lengths = SegmentLengths { cleanup: 1, refinement: 0 };
        assert_eq!(inspect_cleanup(&[0], lengths), Err(HtError::CleanupTooShort));
    }

    #[test]
    fn test_inspect_rejects_truncated_data() {
        let lengths = SegmentLengths { cleanup: 4, refinement: 2 };
        assert_eq!(inspect_cleanup(&[0; 5], lengths), Err(HtError::TruncatedSegment));
    }

    #[test]
    fn test_inspect_locator() {
        let lengths = SegmentLengths { cleanup: 4, refinement: 0 };
        // scup = 3: one MagSgn byte
        assert_eq!(
            inspect_cleanup(&[0x12, 0x34, 0xA3, 0x00], lengths),
            Ok(SegmentLayout { mag_sgn: 1, mel_vlc: 3, refinement: 0 })
        );
        // scup = 1
        assert_eq!(inspect_cleanup(&[0, 0, 0x01, 0x00], lengths), Err(HtError::InvalidLocator));
        // scup = 5 > lcup
        assert_eq!(inspect_cleanup(&[0, 0, 0x05, 0x00], lengths), Err(HtError::InvalidLocator));
    }

    #[test]
    fn test_locator_above_limit() {
        let mut coded = vec![0u8; 4096];
        // scup = 0xFF << 4 | 0xF = 4095
        coded[4094] = 0x0F;
        coded[4095] = 0xFF;
        let lengths = SegmentLengths { cleanup: 4096, refinement: 0 };
        assert_eq!(inspect_cleanup(&coded, lengths), Err(HtError::InvalidLocator));
    }

    #[test]
    fn test_failed_decode_zeroes_block() {
        let params = CodeBlockParams::new(4, 2, 3).with_stride(6);
        let mut dst = vec![7u32; 12];
        let lengths = SegmentLengths { cleanup: 4, refinement: 0 };
        let result = HTBlockDecoder::new().decode(&[0, 0, 0x01, 0x00], lengths, &params, &mut dst);
        assert_eq!(result, Err(HtError::InvalidLocator));
        assert_eq!(dst, vec![0, 0, 0, 0, 7, 7, 0, 0, 0, 0, 7, 7]);
    }

    #[test]
    fn test_insufficient_precision() {
        let params = CodeBlockParams::new(4, 4, 30);
        let mut dst = vec![0u32; 16];
        let lengths = SegmentLengths { cleanup: 2, refinement: 0 };
        assert_eq!(
            HTBlockDecoder::new().decode(&[0, 0], lengths, &params, &mut dst),
            Err(HtError::InsufficientPrecision)
        );
        // the same block fits a 64-bit word
        let mut wide = vec![0u64; 16];
        assert_ne!(
            HTBlockDecoder::new().decode(&[0, 0], lengths, &params, &mut wide),
            Err(HtError::InsufficientPrecision)
        );
    }

    #[test]
    fn test_destination_too_small() {
        let params = CodeBlockParams::new(4, 4, 0);
        let mut dst = vec![0u32; 15];
        let lengths = SegmentLengths { cleanup: 2, refinement: 0 };
        assert_eq!(
            HTBlockDecoder::new().decode(&[0, 0], lengths, &params, &mut dst),
            Err(HtError::DestinationTooSmall)
        );
    }
}
