pub mod coding_parameters;
pub mod constants;
pub mod error;
pub mod ht_block_coder;
pub mod logging;
pub mod traits;

#[cfg(feature = "ffi")]
pub mod ffi;
pub mod wasm;

pub use coding_parameters::{CodeBlockParams, CodingPasses, SegmentLengths};
pub use error::HtError;
pub use ht_block_coder::{CodedBlock, CodeTables, HTBlockDecoder, HTBlockEncoder, SegmentLayout, inspect_cleanup};
pub use traits::HtSample;
