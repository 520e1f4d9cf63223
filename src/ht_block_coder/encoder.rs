use super::cleanup::encode_cleanup;
use super::mag_ref::encode_mag_ref;
use super::sig_prop::{SigmaMap, encode_sig_prop};
use super::tables::CodeTables;
use crate::coding_parameters::{CodeBlockParams, CodingPasses, SegmentLengths};
use crate::error::HtError;
use crate::traits::HtSample;

/// An encoded code-block: the cleanup segment followed by the refinement
/// segment, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedBlock {
    pub data: Vec<u8>,
    pub lengths: SegmentLengths,
    /// Passes actually present; may be lower than requested.
    pub num_passes: CodingPasses,
    pub missing_msbs: u32,
}

impl CodedBlock {
    pub fn cleanup_segment(&self) -> &[u8] {
        &self.data[..self.lengths.cleanup]
    }

    pub fn refinement_segment(&self) -> &[u8] {
        &self.data[self.lengths.cleanup..self.lengths.total()]
    }
}

/// HT block encoder.
#[derive(Debug, Clone, Copy)]
pub struct HTBlockEncoder<'t> {
    tables: &'t CodeTables,
}

impl HTBlockEncoder<'static> {
    pub fn new() -> Self {
        Self { tables: CodeTables::get() }
    }
}

impl Default for HTBlockEncoder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'t> HTBlockEncoder<'t> {
    pub fn with_tables(tables: &'t CodeTables) -> Self {
        Self { tables }
    }

    /// Encodes the block of `samples` described by `params`. The cleanup
    /// pass codes bitplane `BITS - 2 - missing_msbs` and up; the refinement
    /// passes, when requested, code the plane below it.
    pub fn encode<S: HtSample>(&self, samples: &[S], params: &CodeBlockParams) -> Result<CodedBlock, HtError> {
        params.validate()?;
        if samples.len() < params.required_len() {
            return Err(HtError::InvalidDimensions);
        }
        let p = S::cleanup_bitplane(params.missing_msbs).ok_or(HtError::InsufficientPrecision)?;

        let mut data = encode_cleanup(samples, params, p, self.tables)?;
        let cleanup = data.len();

        let mut num_passes = params.num_passes;
        if num_passes > CodingPasses::Cleanup && p < 2 {
            log::debug!("no bitplane below p=1 to refine; coding the cleanup pass only");
            num_passes = CodingPasses::Cleanup;
        }
        if num_passes > CodingPasses::Cleanup {
            let refinement = self.encode_refinement(samples, params, p, num_passes)?;
            if refinement.is_empty() {
                num_passes = CodingPasses::Cleanup;
            }
            data.extend_from_slice(&refinement);
        }

        let lengths = SegmentLengths {
            cleanup,
            refinement: data.len() - cleanup,
        };
        log::trace!(
            "encode: {}x{} passes={} lengths={}+{}",
            params.width,
            params.height,
            num_passes.count(),
            lengths.cleanup,
            lengths.refinement
        );
        Ok(CodedBlock {
            data,
            lengths,
            num_passes,
            missing_msbs: params.missing_msbs,
        })
    }

    /// `[SPP][MRP reversed]` at bitplane `p - 1`.
    fn encode_refinement<S: HtSample>(
        &self,
        samples: &[S],
        params: &CodeBlockParams,
        p: u32,
        num_passes: CodingPasses,
    ) -> Result<Vec<u8>, HtError> {
        let (width, height, stride) = (params.width as usize, params.height as usize, params.stride);
        let sigma = SigmaMap::from_fn(width, height, |x, y| samples[y * stride + x].magnitude() >> p != 0);
        let mut segment = encode_sig_prop(samples, &sigma, width, height, stride, p, params.stripe_causal)?;
        if num_passes == CodingPasses::MagRef {
            segment.extend(encode_mag_ref(samples, &sigma, width, height, stride, p)?);
        }
        Ok(segment)
    }
}
