/// Magnitude refinement (MagRef) pass.
///
/// Refines bitplane `p - 1` of every sample the cleanup pass found
/// significant, in stripe order and column-major within a stripe. The bits
/// grow backward from the end of the refinement segment.
use super::bit_io::{BackwardReader, BackwardWriter};
use super::sig_prop::SigmaMap;
use crate::constants::MRP_BUFFER_SIZE;
use crate::error::HtError;
use crate::traits::HtSample;

/// Visits the cleanup-significant samples in pass order.
fn for_each_significant(
    sigma: &SigmaMap,
    width: usize,
    height: usize,
    mut visit: impl FnMut(usize, usize) -> Result<(), HtError>,
) -> Result<(), HtError> {
    for stripe in 0..height.div_ceil(4) {
        for g in 0..width.div_ceil(4) {
            let sig = sigma.pair(stripe, g) & 0xFFFF;
            for b in (0..16).filter(|b| sig & (1 << b) != 0) {
                visit(g * 4 + (b >> 2), stripe * 4 + (b & 3))?;
            }
        }
    }
    Ok(())
}

pub fn decode_mag_ref<S: HtSample>(
    sigma: &SigmaMap,
    segment: &[u8],
    p: u32,
    width: usize,
    height: usize,
    stride: usize,
    dst: &mut [S],
) -> Result<(), HtError> {
    let mut reader = BackwardReader::for_mrp(segment, segment.len());
    let half = 1u64 << (p - 2);
    for_each_significant(sigma, width, height, |x, y| {
        let bit = reader.fetch() & 1;
        reader.advance(1);
        let sample = &mut dst[y * stride + x];
        // the cleanup pass left bit p - 1 set as the bin centre
        *sample = S::from_u64(sample.to_u64() ^ (((1 - bit) << (p - 1)) | half));
        Ok(())
    })
}

/// Encodes bit `p - 1` of each cleanup-significant sample. The returned
/// bytes are in segment order.
pub fn encode_mag_ref<S: HtSample>(
    samples: &[S],
    sigma: &SigmaMap,
    width: usize,
    height: usize,
    stride: usize,
    p: u32,
) -> Result<Vec<u8>, HtError> {
    let mut writer = BackwardWriter::for_mrp(MRP_BUFFER_SIZE);
    for_each_significant(sigma, width, height, |x, y| {
        let bit = (samples[y * stride + x].magnitude() >> (p - 1)) & 1;
        writer.write(bit as u32, 1)
    })?;
    let mut bytes = writer.finish()?;
    bytes.reverse();
    Ok(bytes)
}
