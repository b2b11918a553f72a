/// Fixed gzip header with FEXTRA (12 bytes)
pub const BLOCK_HEADER_SIZE: usize = 12;

/// BC subfield: id + length + block_size (6 bytes)
pub const BLOCK_SUBFIELD_SIZE: usize = 6;

/// Block tailer: CRC32 + ISIZE (8 bytes)
pub const BLOCK_TAILER_SIZE: usize = 8;

/// Fixed per-block overhead (header + subfield + tailer)
pub const BLOCK_METADATA_SIZE: usize =
    BLOCK_HEADER_SIZE + BLOCK_SUBFIELD_SIZE + BLOCK_TAILER_SIZE;

/// Maximum uncompressed payload of a single block
pub const BLOCK_DATA_INFLATED_SIZE: usize = 65280;

/// Maximum number of blocks per batch call
pub const BLOCK_BATCH_SIZE: usize = 300;

/// Maximum total size of an encoded block (BSIZE is a u16 holding size - 1)
pub const MAX_BLOCK_SIZE: usize = 65536;

/// BGZF EOF block (28 bytes)
pub const BGZF_EOF: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, // gzip magic, method, flags (FEXTRA)
    0x00, 0x00, 0x00, 0x00, // mtime
    0x00, 0xff, // xfl, os
    0x06, 0x00, // xlen = 6
    0x42, 0x43, // subfield ID "BC"
    0x02, 0x00, // subfield length = 2
    0x1b, 0x00, // BSIZE = 27 (28 - 1)
    0x03, 0x00, // empty deflate block
    0x00, 0x00, 0x00, 0x00, // CRC32 = 0
    0x00, 0x00, 0x00, 0x00, // ISIZE = 0
];
