// Number of raw bits appended to a MEL codeword in each state, ITU-T T.814 Table 2.
pub const MEL_EXP: [u32; 13] = [0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 4, 5];
pub const MEL_MAX_STATE: usize = 12;
pub const MEL_MAX_RUNS: usize = 8; // runs decoded per MEL refill

// Code-block limits from ISO/IEC 15444-1 (xcb, ycb <= 10 and xcb + ycb <= 12).
pub const MAX_BLOCK_DIMENSION: u32 = 1024;
pub const MAX_BLOCK_AREA: u32 = 4096;

// The interface locator stores scup in 12 bits; the two top values are reserved.
pub const MAX_SCUP: usize = 4079;
pub const MIN_SCUP: usize = 2;

pub const MAX_CODING_PASSES: u8 = 3;

// A u value above this needs a 4-bit extension in the UVLC code.
pub const UVLC_EXTENSION_THRESHOLD: u32 = 32;
pub const UVLC_ENCODE_ENTRIES: usize = 75;

pub const VLC_MAX_CODEWORD_LENGTH: u8 = 7;
pub const VLC_DECODE_TABLE_SIZE: usize = 1024; // c_q (3 bits) + 7 bits of stream
pub const VLC_ENCODE_TABLE_SIZE: usize = 2048; // c_q (3 bits) + rho (4 bits) + emb (4 bits)
pub const UVLC_INITIAL_TABLE_SIZE: usize = 256 + 64; // five modes of 64 entries
pub const UVLC_TABLE_SIZE: usize = 256;

// Encoder scratch capacities. MagSgn holds at most one sample word per sample
// plus one stuffing bit per 15 data bits.
pub const MEL_BUFFER_SIZE: usize = 192;
pub const MEL_VLC_BUFFER_SIZE: usize = 3072;
pub const VLC_BUFFER_SIZE: usize = MEL_VLC_BUFFER_SIZE - MEL_BUFFER_SIZE;

pub const fn mag_sgn_buffer_size(sample_bits: u32) -> usize {
    let bytes = MAX_BLOCK_AREA as usize * sample_bits as usize / 8;
    (bytes * 16 + 14) / 15
}

// Refinement passes carry at most one significance and one sign bit per sample
// (SPP) and one refinement bit per sample (MRP).
pub const SPP_BUFFER_SIZE: usize = (MAX_BLOCK_AREA as usize * 2 / 8 * 16 + 14) / 15 + 1;
pub const MRP_BUFFER_SIZE: usize = (MAX_BLOCK_AREA as usize / 8 * 16 + 14) / 15 + 1;

// Byte stuffing thresholds.
pub const FORWARD_STUFF_BYTE: u8 = 0xFF;
pub const BACKWARD_STUFF_THRESHOLD: u8 = 0x8F;
