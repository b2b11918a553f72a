//! Pull-based BGZF decompressor.

use std::io::{self, Read};

use crate::batch::inflate_parts;
use crate::error::{Error, Result};
use crate::frame::{
    BcSubfield, BlockHeader, BlockTailer, DeflatedBlock, BLOCK_BATCH_SIZE, BLOCK_HEADER_SIZE,
    BLOCK_SUBFIELD_SIZE, BLOCK_TAILER_SIZE,
};

/// One framed block whose payload has been read off the raw stream
struct OwnedBlock {
    deflated: Vec<u8>,
    inflated_size: u32,
    crc: u32,
}

/// Streaming BGZF reader.
///
/// Frames up to a batch of blocks from the raw stream per refill, inflates
/// them in parallel, and serves the uncompressed bytes in file order through
/// [`std::io::Read`]. Block boundaries are not observable; a terminator
/// block reads as zero bytes. Any framing or inflation error leaves the
/// reader unusable.
pub struct BgzfReader<R> {
    raw: R,
    batch_size: usize,
    num_threads: usize,
    /// Inflated bytes of the current batch, in file order
    inflated: Vec<u8>,
    pos: usize,
    /// Raw stream exhausted at a block boundary
    eof: bool,
    /// Framing error held back until previously framed blocks are consumed
    pending: Option<Error>,
    poisoned: bool,
}

impl<R: Read> BgzfReader<R> {
    /// Create a reader with the default batch size and auto-detected
    /// thread count.
    pub fn new(raw: R) -> Self {
        Self::with_options(raw, BLOCK_BATCH_SIZE, 0)
    }

    /// Create a reader framing up to `batch_size` blocks per refill across
    /// `num_threads` workers (0 = auto).
    pub fn with_options(raw: R, batch_size: usize, num_threads: usize) -> Self {
        Self {
            raw,
            batch_size: batch_size.clamp(1, BLOCK_BATCH_SIZE),
            num_threads,
            inflated: Vec::new(),
            pos: 0,
            eof: false,
            pending: None,
            poisoned: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.raw
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.raw
    }

    /// Release the raw stream
    pub fn into_inner(self) -> R {
        self.raw
    }

    /// Frame one block off the raw stream, or `None` at a clean boundary EOF
    fn frame_block(&mut self) -> Result<Option<OwnedBlock>> {
        let mut head = [0u8; BLOCK_HEADER_SIZE + BLOCK_SUBFIELD_SIZE];
        let got = read_full(&mut self.raw, &mut head)?;
        if got == 0 {
            return Ok(None);
        }
        if got < head.len() {
            return Err(Error::InsufficientBytes { needed: head.len(), got });
        }

        let header = BlockHeader::parse(&head[..BLOCK_HEADER_SIZE])?;
        let subfield = BcSubfield::parse(&head[BLOCK_HEADER_SIZE..])?;

        let total = subfield.total_block_size();
        let fixed = BLOCK_HEADER_SIZE + header.extra_len as usize + BLOCK_TAILER_SIZE;
        if total < fixed {
            return Err(Error::MalformedHeader("declared block size smaller than fixed fields"));
        }

        let mut body = vec![0u8; total - BLOCK_HEADER_SIZE - BLOCK_SUBFIELD_SIZE];
        let got = read_full(&mut self.raw, &mut body)?;
        if got < body.len() {
            return Err(Error::InsufficientBytes { needed: body.len(), got });
        }

        let deflated_size = body.len() - BLOCK_TAILER_SIZE;
        let tailer = BlockTailer::parse(&body[deflated_size..])?;
        body.truncate(deflated_size);

        Ok(Some(OwnedBlock {
            deflated: body,
            inflated_size: tailer.inflated_size,
            crc: tailer.crc,
        }))
    }

    /// Frame and inflate the next batch of blocks
    fn refill(&mut self) -> Result<()> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }

        let mut blocks: Vec<OwnedBlock> = Vec::with_capacity(self.batch_size);
        while blocks.len() < self.batch_size && !self.eof {
            match self.frame_block() {
                Ok(Some(block)) => blocks.push(block),
                Ok(None) => self.eof = true,
                // Mid-block truncation or garbage: deliver the complete
                // blocks framed so far, surface the error on the next refill.
                Err(e) => {
                    if blocks.is_empty() {
                        return Err(e);
                    }
                    self.pending = Some(e);
                    break;
                }
            }
        }

        let total: usize = blocks.iter().map(|b| b.inflated_size as usize).sum();
        let mut inflated = vec![0u8; total];

        let views: Vec<DeflatedBlock<'_>> = blocks
            .iter()
            .map(|b| DeflatedBlock {
                deflated: &b.deflated,
                inflated_size: b.inflated_size,
                crc: b.crc,
            })
            .collect();

        let mut parts = Vec::with_capacity(blocks.len());
        let mut rest: &mut [u8] = &mut inflated;
        for block in &blocks {
            let (head, tail) =
                std::mem::take(&mut rest).split_at_mut(block.inflated_size as usize);
            parts.push(head);
            rest = tail;
        }

        inflate_parts(&views, parts, self.num_threads)?;

        self.inflated = inflated;
        self.pos = 0;
        Ok(())
    }
}

impl<R: Read> Read for BgzfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.poisoned {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "bgzf reader is in a failed state",
            ));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pos == self.inflated.len() {
            if self.eof && self.pending.is_none() {
                return Ok(0);
            }
            if let Err(e) = self.refill() {
                self.poisoned = true;
                return Err(e.into());
            }
        }

        let n = buf.len().min(self.inflated.len() - self.pos);
        buf[..n].copy_from_slice(&self.inflated[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Read until `buf` is full or the stream ends; returns the byte count
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(filled)
}
