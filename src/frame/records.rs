//! Fixed-layout BGZF block structures.
//!
//! A block is `header (12) + BC subfield (6) + raw deflate payload + tailer (8)`.
//! All multi-byte integers are little-endian. Parsers operate on byte slices
//! and never copy; serializers write into pre-sized buffers and never
//! allocate.

use crate::error::{Error, Result};
use crate::frame::constants::*;
use std::io::Read;

/// Gzip header with the FEXTRA flag set (first 12 bytes of a block)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub mod_time: u32,
    pub extra_flags: u8,
    pub os_type: u8,
    pub extra_len: u16,
}

impl BlockHeader {
    pub const SIZE: usize = BLOCK_HEADER_SIZE;

    /// gzip magic, DEFLATE method, FEXTRA flag
    pub const MAGIC: [u8; 4] = [0x1f, 0x8b, 0x08, 0x04];

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::InsufficientBytes { needed: Self::SIZE, got: data.len() });
        }
        if data[..4] != Self::MAGIC {
            return Err(Error::MalformedHeader(
                "gzip magic, DEFLATE method or FEXTRA flag missing",
            ));
        }
        let extra_len = u16::from_le_bytes([data[10], data[11]]);
        if extra_len as usize != BLOCK_SUBFIELD_SIZE {
            return Err(Error::MalformedHeader("extra field length is not 6"));
        }
        Ok(Self {
            mod_time: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            extra_flags: data[8],
            os_type: data[9],
            extra_len,
        })
    }

    /// Write the 12-byte header into `out`
    pub fn write_into(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= Self::SIZE);
        out[..4].copy_from_slice(&Self::MAGIC);
        out[4..8].copy_from_slice(&self.mod_time.to_le_bytes());
        out[8] = self.extra_flags;
        out[9] = self.os_type;
        out[10..12].copy_from_slice(&self.extra_len.to_le_bytes());
    }
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            mod_time: 0,
            extra_flags: 0,
            os_type: 0xff,
            extra_len: BLOCK_SUBFIELD_SIZE as u16,
        }
    }
}

/// BC subfield declaring the total block length (6 bytes after the header)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BcSubfield {
    /// Total block length - 1
    pub block_size: u16,
}

impl BcSubfield {
    pub const SIZE: usize = BLOCK_SUBFIELD_SIZE;

    pub const ID: [u8; 2] = [b'B', b'C'];

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::InsufficientBytes { needed: Self::SIZE, got: data.len() });
        }
        if data[..2] != Self::ID {
            return Err(Error::MalformedHeader("BC subfield identifier missing"));
        }
        if u16::from_le_bytes([data[2], data[3]]) != 2 {
            return Err(Error::MalformedHeader("BC subfield length is not 2"));
        }
        Ok(Self { block_size: u16::from_le_bytes([data[4], data[5]]) })
    }

    /// Total encoded length of the block this subfield describes
    pub fn total_block_size(&self) -> usize {
        self.block_size as usize + 1
    }

    /// Write the 6-byte subfield into `out`
    pub fn write_into(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= Self::SIZE);
        out[..2].copy_from_slice(&Self::ID);
        out[2..4].copy_from_slice(&2u16.to_le_bytes());
        out[4..6].copy_from_slice(&self.block_size.to_le_bytes());
    }
}

/// Block tailer: CRC32 and size of the uncompressed payload (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTailer {
    pub crc: u32,
    pub inflated_size: u32,
}

impl BlockTailer {
    pub const SIZE: usize = BLOCK_TAILER_SIZE;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::InsufficientBytes { needed: Self::SIZE, got: data.len() });
        }
        Ok(Self {
            crc: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            inflated_size: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
        })
    }

    /// Write the 8-byte tailer into `out`
    pub fn write_into(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= Self::SIZE);
        out[..4].copy_from_slice(&self.crc.to_le_bytes());
        out[4..8].copy_from_slice(&self.inflated_size.to_le_bytes());
    }
}

/// Descriptor for one framed block.
///
/// Borrows the deflated payload from its backing buffer; valid only while
/// that buffer is alive.
#[derive(Debug, Clone, Copy)]
pub struct DeflatedBlock<'a> {
    /// Raw deflate payload (no gzip wrapper)
    pub deflated: &'a [u8],
    /// Declared uncompressed size
    pub inflated_size: u32,
    /// Declared CRC32 of the uncompressed payload
    pub crc: u32,
}

/// Parse one complete block at the start of `data`.
///
/// Returns the block descriptor and the number of bytes it occupies.
pub fn parse_block(data: &[u8]) -> Result<(DeflatedBlock<'_>, usize)> {
    let header = BlockHeader::parse(data)?;
    let subfield = BcSubfield::parse(&data[BlockHeader::SIZE..])?;

    let total = subfield.total_block_size();
    let fixed = BlockHeader::SIZE + header.extra_len as usize + BlockTailer::SIZE;
    if total < fixed {
        return Err(Error::MalformedHeader("declared block size smaller than fixed fields"));
    }
    if data.len() < total {
        return Err(Error::InsufficientBytes { needed: total, got: data.len() });
    }

    let deflated_size = total - fixed;
    let payload_start = BlockHeader::SIZE + header.extra_len as usize;
    let tailer = BlockTailer::parse(&data[total - BlockTailer::SIZE..])?;

    let block = DeflatedBlock {
        deflated: &data[payload_start..payload_start + deflated_size],
        inflated_size: tailer.inflated_size,
        crc: tailer.crc,
    };
    Ok((block, total))
}

/// Iterate complete blocks in an in-memory buffer.
///
/// Stops cleanly at the first incomplete trailing block; malformed bytes
/// yield one `Err` and end the iteration.
pub fn read_blocks(data: &[u8]) -> Blocks<'_> {
    Blocks { data, offset: 0, done: false }
}

pub struct Blocks<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Blocks<'a> {
    /// Bytes consumed by the blocks yielded so far
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Result<DeflatedBlock<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset == self.data.len() {
            return None;
        }
        match parse_block(&self.data[self.offset..]) {
            Ok((block, consumed)) => {
                self.offset += consumed;
                Some(Ok(block))
            }
            Err(Error::InsufficientBytes { .. }) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Quick check whether a stream starts with a BGZF block header.
///
/// Reads the first 18 bytes; a short or non-matching prefix yields `false`.
pub fn is_bgzf<R: Read>(reader: &mut R) -> Result<bool> {
    let mut head = [0u8; BLOCK_HEADER_SIZE + BLOCK_SUBFIELD_SIZE];
    match reader.read_exact(&mut head) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
        Err(e) => return Err(Error::Io(e)),
    }
    let ok = BlockHeader::parse(&head)
        .and_then(|_| BcSubfield::parse(&head[BlockHeader::SIZE..]))
        .is_ok();
    Ok(ok)
}
