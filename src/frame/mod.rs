pub mod constants;
pub mod records;

pub use constants::*;
pub use records::{
    is_bgzf, parse_block, read_blocks, BcSubfield, BlockHeader, BlockTailer, Blocks,
    DeflatedBlock,
};
