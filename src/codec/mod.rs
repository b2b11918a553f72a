//! Single-block inflate/deflate over raw byte spans.
//!
//! BGZF payloads are raw DEFLATE streams (no zlib wrapper). Each codec owns
//! one reusable `flate2` stream that is reset between blocks, so a worker
//! thread can process an entire batch without touching shared state.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::{Error, Result};
use crate::frame::{
    BcSubfield, BlockHeader, BlockTailer, BLOCK_DATA_INFLATED_SIZE, BLOCK_HEADER_SIZE,
    BLOCK_METADATA_SIZE, BLOCK_SUBFIELD_SIZE, BLOCK_TAILER_SIZE, MAX_BLOCK_SIZE,
};

/// Inflates one block payload at a time, verifying size and CRC
pub struct BlockInflater {
    stream: Decompress,
}

impl BlockInflater {
    pub fn new() -> Self {
        Self { stream: Decompress::new(false) }
    }

    /// Inflate `src` into `dst`, which must be exactly the declared
    /// uncompressed size of the block.
    ///
    /// Runs raw inflate to end of stream, then verifies that the byte count
    /// matches `dst.len()` and that the CRC32 of the produced bytes matches
    /// `expected_crc`.
    pub fn inflate_block(&mut self, src: &[u8], dst: &mut [u8], expected_crc: u32) -> Result<()> {
        self.stream.reset(false);

        loop {
            let consumed = self.stream.total_in() as usize;
            let produced = self.stream.total_out() as usize;

            let status = if produced < dst.len() {
                self.stream
                    .decompress(&src[consumed..], &mut dst[produced..], FlushDecompress::Finish)
            } else {
                // Declared size reached; any further output overflows the
                // declaration.
                let mut overflow = [0u8; 1];
                self.stream.decompress(&src[consumed..], &mut overflow, FlushDecompress::Finish)
            };
            let status = status.map_err(|e| Error::Zlib(e.to_string()))?;

            let produced_now = self.stream.total_out() as usize;
            if produced_now > dst.len() {
                return Err(Error::BlockSizeMismatch {
                    declared: dst.len() as u32,
                    produced: produced_now as u32,
                });
            }

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    let progressed = self.stream.total_in() as usize != consumed
                        || produced_now != produced;
                    if !progressed {
                        return Err(Error::Zlib("inflate stalled before end of stream".into()));
                    }
                }
            }
        }

        let produced = self.stream.total_out() as usize;
        if produced != dst.len() {
            return Err(Error::BlockSizeMismatch {
                declared: dst.len() as u32,
                produced: produced as u32,
            });
        }

        let found = crc32fast::hash(dst);
        if found != expected_crc {
            return Err(Error::CrcMismatch { expected: expected_crc, found });
        }
        Ok(())
    }
}

impl Default for BlockInflater {
    fn default() -> Self {
        Self::new()
    }
}

/// Compresses uncompressed chunks into complete BGZF blocks
pub struct BlockDeflater {
    stream: Compress,
}

impl BlockDeflater {
    pub fn new() -> Self {
        // Raw deflate at maximum compression, the level BGZF encoders use
        Self { stream: Compress::new(Compression::best(), false) }
    }

    /// Compress `input` (at most one block's worth of uncompressed bytes)
    /// into `out` as a complete BGZF block.
    ///
    /// The output region receives, in order: the 12-byte header, the 6-byte
    /// BC subfield, the raw deflate payload, and the 8-byte tailer. Returns
    /// the total encoded block length. `out` must be at least
    /// `BLOCK_DATA_INFLATED_SIZE + BLOCK_METADATA_SIZE` bytes for arbitrary
    /// input; the deflate never writes past `out`.
    pub fn compress_block(&mut self, input: &[u8], out: &mut [u8]) -> Result<usize> {
        debug_assert!(input.len() <= BLOCK_DATA_INFLATED_SIZE);

        if out.len() < BLOCK_METADATA_SIZE {
            return Err(Error::CompressedDataTooLarge);
        }

        let body_start = BLOCK_HEADER_SIZE + BLOCK_SUBFIELD_SIZE;
        let deflate_end = out.len() - BLOCK_TAILER_SIZE;

        BlockHeader::default().write_into(&mut out[..BLOCK_HEADER_SIZE]);
        BcSubfield { block_size: 0 }.write_into(&mut out[BLOCK_HEADER_SIZE..body_start]);

        self.stream.reset();
        loop {
            let consumed = self.stream.total_in() as usize;
            let produced = self.stream.total_out() as usize;

            let status = self
                .stream
                .compress(
                    &input[consumed..],
                    &mut out[body_start + produced..deflate_end],
                    FlushCompress::Finish,
                )
                .map_err(|e| Error::Zlib(e.to_string()))?;

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    let progressed = self.stream.total_in() as usize != consumed
                        || self.stream.total_out() as usize != produced;
                    if !progressed {
                        return Err(Error::CompressedDataTooLarge);
                    }
                }
            }
        }

        let deflated = self.stream.total_out() as usize;
        let total = body_start + deflated + BLOCK_TAILER_SIZE;
        if total > MAX_BLOCK_SIZE {
            return Err(Error::CompressedDataTooLarge);
        }

        BcSubfield { block_size: (total - 1) as u16 }
            .write_into(&mut out[BLOCK_HEADER_SIZE..body_start]);
        BlockTailer { crc: crc32fast::hash(input), inflated_size: input.len() as u32 }
            .write_into(&mut out[body_start + deflated..total]);

        Ok(total)
    }
}

impl Default for BlockDeflater {
    fn default() -> Self {
        Self::new()
    }
}
