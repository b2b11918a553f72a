//! Parallel BGZF (block-gzip) codec.
//!
//! BGZF is a sequence of independent, size-bounded gzip members, each
//! carrying a "BC" extra-field that declares the member's compressed length.
//! Because every block inflates on its own, batches of blocks can be
//! compressed or decompressed across OS threads while the uncompressed byte
//! stream keeps its order.
//!
//! Layers, bottom up:
//! - [`frame`] - fixed-layout header/subfield/tailer records and block framing
//! - [`codec`] - raw deflate/inflate of a single block with size and CRC checks
//! - [`batch`] - parallel fan-out over up to [`BLOCK_BATCH_SIZE`] blocks
//! - [`stream`] - [`BgzfReader`]/[`BgzfWriter`] plus pipelined variants that
//!   overlap codec batches with caller I/O

pub mod batch;
pub mod codec;
pub mod error;
pub mod frame;
pub mod stream;

pub use batch::{deflate_to_buffers, inflate_data, inflate_parts, InflateInfo};
pub use codec::{BlockDeflater, BlockInflater};
pub use error::{Error, Result};
pub use frame::{
    is_bgzf, read_blocks, DeflatedBlock, BGZF_EOF, BLOCK_BATCH_SIZE, BLOCK_DATA_INFLATED_SIZE,
    BLOCK_METADATA_SIZE,
};
pub use stream::{create, open, BgzfReader, BgzfWriter, PipelinedReader, PipelinedWriter};
