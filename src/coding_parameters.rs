use crate::constants::{MAX_BLOCK_AREA, MAX_BLOCK_DIMENSION, MAX_CODING_PASSES};
use crate::error::HtError;
use crate::traits::HtSample;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Coding passes present in a code-block, counted from the cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum CodingPasses {
    Cleanup = 1,
    SigProp = 2,
    MagRef = 3,
}

impl CodingPasses {
    pub fn from_count(count: u32) -> Result<Self, HtError> {
        if count > MAX_CODING_PASSES as u32 {
            return Err(HtError::TooManyPasses);
        }
        Self::try_from(count as u8).map_err(|_| HtError::InvalidParameter)
    }

    pub fn count(self) -> u32 {
        u8::from(self) as u32
    }
}

impl Default for CodingPasses {
    fn default() -> Self {
        Self::Cleanup
    }
}

/// Geometry and bitplane parameters of one code-block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeBlockParams {
    pub width: u32,
    pub height: u32,
    /// Distance in samples between vertically adjacent samples of the plane.
    pub stride: usize,
    pub missing_msbs: u32,
    pub num_passes: CodingPasses,
    /// Disallows looking at the next stripe during significance propagation.
    pub stripe_causal: bool,
}

impl Default for CodeBlockParams {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            stride: 64,
            missing_msbs: 0,
            num_passes: CodingPasses::Cleanup,
            stripe_causal: false,
        }
    }
}

impl CodeBlockParams {
    pub fn new(width: u32, height: u32, missing_msbs: u32) -> Self {
        Self {
            width,
            height,
            stride: width as usize,
            missing_msbs,
            ..Self::default()
        }
    }

    /// Parameters for integer coefficients of `k_max` magnitude bits placed
    /// with [`HtSample::from_coefficient`]. The refinement passes code the
    /// least significant bitplane, so with more than one pass the cleanup
    /// pass stops one plane higher.
    pub fn for_coefficients<S: HtSample>(
        width: u32,
        height: u32,
        k_max: u32,
        num_passes: CodingPasses,
    ) -> Result<Self, HtError> {
        let refined = (num_passes > CodingPasses::Cleanup) as u32;
        if k_max < 1 + refined || k_max > S::BITS - 2 {
            return Err(HtError::InvalidParameter);
        }
        let params = Self::new(width, height, k_max - 1 - refined).with_passes(num_passes);
        params.validate()?;
        Ok(params)
    }

    pub fn with_passes(mut self, num_passes: CodingPasses) -> Self {
        self.num_passes = num_passes;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_stripe_causal(mut self, stripe_causal: bool) -> Self {
        self.stripe_causal = stripe_causal;
        self
    }

    /// Number of samples a plane must hold to contain this block.
    pub fn required_len(&self) -> usize {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        (self.height as usize - 1) * self.stride + self.width as usize
    }

    pub fn validate(&self) -> Result<(), HtError> {
        if self.width == 0
            || self.height == 0
            || self.width > MAX_BLOCK_DIMENSION
            || self.height > MAX_BLOCK_DIMENSION
            || self.width * self.height > MAX_BLOCK_AREA
            || self.stride < self.width as usize
        {
            return Err(HtError::InvalidDimensions);
        }
        Ok(())
    }
}

/// Byte lengths of the two coded segments of a code-block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentLengths {
    /// MagSgn + MEL + VLC, including the interface locator.
    pub cleanup: usize,
    /// SPP + MRP.
    pub refinement: usize,
}

impl SegmentLengths {
    pub fn total(&self) -> usize {
        self.cleanup + self.refinement
    }
}
