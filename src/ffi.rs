//! C Foreign Function Interface for htj2k-rs.
//!
//! Samples are 32-bit sign-magnitude words (bit 31 is the sign). All
//! buffers are owned by the caller.

use crate::coding_parameters::{CodeBlockParams, CodingPasses, SegmentLengths};
use crate::error::HtError;
use crate::ht_block_coder::{HTBlockDecoder, HTBlockEncoder};
use std::os::raw::{c_int, c_uchar};

/// Status codes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Htj2kStatus {
    Ok = 0,
    InvalidArgument = 1,
    BufferTooSmall = 2,
    MalformedInput = 3,
    InsufficientPrecision = 4,
    InternalError = 5,
}

impl From<HtError> for Htj2kStatus {
    fn from(e: HtError) -> Self {
        match e {
            _ if e.is_malformed_input() => Htj2kStatus::MalformedInput,
            HtError::InsufficientPrecision => Htj2kStatus::InsufficientPrecision,
            HtError::DestinationTooSmall => Htj2kStatus::BufferTooSmall,
            HtError::InvalidDimensions | HtError::InvalidParameter => Htj2kStatus::InvalidArgument,
            _ => Htj2kStatus::InternalError,
        }
    }
}

fn block_params(
    width: u32,
    height: u32,
    stride: usize,
    missing_msbs: u32,
    num_passes: u32,
    stripe_causal: c_int,
) -> Result<CodeBlockParams, HtError> {
    let params = CodeBlockParams::new(width, height, missing_msbs)
        .with_stride(stride)
        .with_passes(CodingPasses::from_count(num_passes)?)
        .with_stripe_causal(stripe_causal != 0);
    params.validate()?;
    Ok(params)
}

/// Encode one code-block.
///
/// On success the cleanup and refinement segments are written back to back
/// to `output`, and their lengths and the number of passes actually coded
/// are stored through the out pointers.
///
/// # Safety
/// `samples` must point to `(height - 1) * stride + width` words and
/// `output` to `output_len` bytes. The out pointers must be valid.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn htj2k_encode_block32(
    samples: *const u32,
    width: u32,
    height: u32,
    stride: usize,
    missing_msbs: u32,
    num_passes: u32,
    stripe_causal: c_int,
    output: *mut c_uchar,
    output_len: usize,
    cleanup_len: *mut usize,
    refinement_len: *mut usize,
    passes_coded: *mut u32,
) -> c_int {
    if samples.is_null() || output.is_null() || cleanup_len.is_null() || refinement_len.is_null() || passes_coded.is_null()
    {
        return Htj2kStatus::InvalidArgument as c_int;
    }
    let params = match block_params(width, height, stride, missing_msbs, num_passes, stripe_causal) {
        Ok(params) => params,
        Err(e) => return Htj2kStatus::from(e) as c_int,
    };

    let samples_slice = unsafe { std::slice::from_raw_parts(samples, params.required_len()) };
    let coded = match HTBlockEncoder::new().encode(samples_slice, &params) {
        Ok(coded) => coded,
        Err(e) => return Htj2kStatus::from(e) as c_int,
    };
    if coded.data.len() > output_len {
        return Htj2kStatus::BufferTooSmall as c_int;
    }

    let output_slice = unsafe { std::slice::from_raw_parts_mut(output, output_len) };
    output_slice[..coded.data.len()].copy_from_slice(&coded.data);
    unsafe {
        *cleanup_len = coded.lengths.cleanup;
        *refinement_len = coded.lengths.refinement;
        *passes_coded = coded.num_passes.count();
    }
    Htj2kStatus::Ok as c_int
}

/// Decode one code-block.
///
/// # Safety
/// `data` must point to `cleanup_len + refinement_len` bytes and `output`
/// to `output_len` words.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn htj2k_decode_block32(
    data: *const c_uchar,
    cleanup_len: usize,
    refinement_len: usize,
    width: u32,
    height: u32,
    stride: usize,
    missing_msbs: u32,
    num_passes: u32,
    stripe_causal: c_int,
    output: *mut u32,
    output_len: usize,
) -> c_int {
    if data.is_null() || output.is_null() {
        return Htj2kStatus::InvalidArgument as c_int;
    }
    let params = match block_params(width, height, stride, missing_msbs, num_passes, stripe_causal) {
        Ok(params) => params,
        Err(e) => return Htj2kStatus::from(e) as c_int,
    };
    let lengths = SegmentLengths {
        cleanup: cleanup_len,
        refinement: refinement_len,
    };

    let data_slice = unsafe { std::slice::from_raw_parts(data, lengths.total()) };
    let output_slice = unsafe { std::slice::from_raw_parts_mut(output, output_len) };
    match HTBlockDecoder::new().decode(data_slice, lengths, &params, output_slice) {
        Ok(()) => Htj2kStatus::Ok as c_int,
        Err(e) => Htj2kStatus::from(e) as c_int,
    }
}
