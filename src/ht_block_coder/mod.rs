//! High Throughput block coder (ISO/IEC 15444-15, ITU-T T.814).
//!
//! A code-block is coded by one cleanup pass and, optionally, one
//! significance propagation pass and one magnitude refinement pass:
//!
//! - `cleanup`: quad significance from the MEL and VLC streams (`mel`, `vlc`).
//! - `mag_sgn`: magnitudes and signs of the cleanup-significant samples.
//! - `sig_prop` / `mag_ref`: the two refinement passes, one bitplane below.
//! - `tables`: the CxtVLC and UVLC code tables.
//! - `bit_io`: stuffed forward and backward bit streams.
//!
//! [`HTBlockDecoder`] and [`HTBlockEncoder`] drive the passes.

pub mod bit_io;
pub mod cleanup;
pub mod decoder;
pub mod encoder;
pub mod mag_ref;
pub mod mag_sgn;
pub mod mel;
pub mod sig_prop;
pub mod tables;
pub mod vlc;

pub use decoder::{HTBlockDecoder, SegmentLayout, inspect_cleanup};
pub use encoder::{CodedBlock, HTBlockEncoder};
pub use tables::{CodeTables, QuadRow, SourceCodeword};
