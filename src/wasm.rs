//! WebAssembly bindings for htj2k-rs.
//!
//! This module provides JavaScript-compatible functions via wasm-bindgen
//! for use in browsers and Node.js. Coefficients cross the boundary as
//! plain integers (`Int32Array`).

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use crate::coding_parameters::{CodeBlockParams, CodingPasses, SegmentLengths};
use crate::error::HtError;
use crate::ht_block_coder::{CodedBlock, HTBlockDecoder, HTBlockEncoder};
use crate::traits::HtSample;

pub fn encode_coefficients(
    coefficients: &[i32],
    width: u32,
    height: u32,
    k_max: u32,
    num_passes: u32,
) -> Result<CodedBlock, HtError> {
    let params = CodeBlockParams::for_coefficients::<u32>(width, height, k_max, CodingPasses::from_count(num_passes)?)?;
    if coefficients.len() < params.required_len() {
        return Err(HtError::InvalidDimensions);
    }
    let samples: Vec<u32> = coefficients
        .iter()
        .map(|&c| u32::from_coefficient(c as i64, k_max))
        .collect();
    HTBlockEncoder::new().encode(&samples, &params)
}

#[allow(clippy::too_many_arguments)]
pub fn decode_coefficients(
    data: &[u8],
    cleanup_length: usize,
    refinement_length: usize,
    width: u32,
    height: u32,
    k_max: u32,
    num_passes: u32,
) -> Result<Vec<i32>, HtError> {
    let params = CodeBlockParams::for_coefficients::<u32>(width, height, k_max, CodingPasses::from_count(num_passes)?)?;
    let lengths = SegmentLengths {
        cleanup: cleanup_length,
        refinement: refinement_length,
    };
    let mut samples = vec![0u32; params.required_len()];
    HTBlockDecoder::new().decode(data, lengths, &params, &mut samples)?;
    Ok(samples.iter().map(|s| s.to_coefficient(k_max) as i32).collect())
}

/// Coded block returned from WASM API.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub struct EncodedBlock {
    data: Vec<u8>,
    pub cleanup_length: u32,
    pub refinement_length: u32,
    pub num_passes: u32,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl EncodedBlock {
    #[wasm_bindgen(getter)]
    pub fn data(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// Encode integer coefficients of `k_max` magnitude bits.
///
/// # Arguments
/// * `coefficients` - `width * height` coefficients in raster order
/// * `num_passes` - 1 (cleanup only) to 3
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn encode_block(
    coefficients: &[i32],
    width: u32,
    height: u32,
    k_max: u32,
    num_passes: u32,
) -> Result<EncodedBlock, JsValue> {
    let coded = encode_coefficients(coefficients, width, height, k_max, num_passes)
        .map_err(|e| JsValue::from_str(&format!("Encode error: {}", e)))?;
    Ok(EncodedBlock {
        cleanup_length: coded.lengths.cleanup as u32,
        refinement_length: coded.lengths.refinement as u32,
        num_passes: coded.num_passes.count(),
        data: coded.data,
    })
}

/// Decode a coded block back to integer coefficients.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn decode_block(
    data: &[u8],
    cleanup_length: u32,
    refinement_length: u32,
    width: u32,
    height: u32,
    k_max: u32,
    num_passes: u32,
) -> Result<Vec<i32>, JsValue> {
    decode_coefficients(
        data,
        cleanup_length as usize,
        refinement_length as usize,
        width,
        height,
        k_max,
        num_passes,
    )
    .map_err(|e| JsValue::from_str(&format!("Decode error: {}", e)))
}
