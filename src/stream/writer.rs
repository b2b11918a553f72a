//! Push-based BGZF compressor.

use std::io::{self, Write};

use crate::batch::deflate_to_buffers;
use crate::error::{Error, Result};
use crate::frame::{
    BGZF_EOF, BLOCK_BATCH_SIZE, BLOCK_DATA_INFLATED_SIZE, BLOCK_METADATA_SIZE,
};

/// Pool buffers carry a kilobyte of headroom for poorly compressible data
const DEFLATE_BUFFER_SIZE: usize = BLOCK_DATA_INFLATED_SIZE + BLOCK_METADATA_SIZE + 1024;

/// Streaming BGZF writer.
///
/// Buffers caller bytes, chunks them into 65280-byte units, compresses
/// batches in parallel into a reused pool of output buffers, and emits the
/// finished blocks to the sink in order. [`finish`](Self::finish) (or drop)
/// drains the accumulator, appends the 28-byte terminator block, and
/// flushes the sink.
pub struct BgzfWriter<W: Write> {
    sink: Option<W>,
    accumulator: Vec<u8>,
    deflate_bufs: Vec<Vec<u8>>,
    batch_size: usize,
    num_threads: usize,
    finished: bool,
}

impl<W: Write> BgzfWriter<W> {
    /// Create a writer with the default batch size and auto-detected
    /// thread count.
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, BLOCK_BATCH_SIZE, 0)
    }

    /// Create a writer compressing up to `batch_size` blocks per batch
    /// across `num_threads` workers (0 = auto).
    pub fn with_options(sink: W, batch_size: usize, num_threads: usize) -> Self {
        let batch_size = batch_size.clamp(1, BLOCK_BATCH_SIZE);
        Self {
            sink: Some(sink),
            accumulator: Vec::new(),
            deflate_bufs: vec![vec![0u8; DEFLATE_BUFFER_SIZE]; batch_size],
            batch_size,
            num_threads,
            finished: false,
        }
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut W> {
        self.sink.as_mut()
    }

    /// Uncompressed bytes per batch that trigger compression
    fn batch_threshold(&self) -> usize {
        self.batch_size * BLOCK_DATA_INFLATED_SIZE
    }

    /// Compress accumulated bytes and emit the finished blocks in order.
    ///
    /// Stops once less than one full block remains, unless `drain_all`.
    fn compress_pending(&mut self, drain_all: bool) -> Result<()> {
        while !self.accumulator.is_empty() {
            let sizes =
                deflate_to_buffers(&self.accumulator, &mut self.deflate_bufs, self.num_threads)?;

            let sink = match self.sink.as_mut() {
                Some(sink) => sink,
                None => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::NotConnected,
                        "bgzf writer is closed",
                    )))
                }
            };
            for (buf, size) in self.deflate_bufs.iter().zip(&sizes) {
                sink.write_all(&buf[..*size])?;
            }

            let consumed = (sizes.len() * BLOCK_DATA_INFLATED_SIZE).min(self.accumulator.len());
            self.accumulator.drain(..consumed);

            if self.accumulator.len() < BLOCK_DATA_INFLATED_SIZE && !drain_all {
                break;
            }
        }
        Ok(())
    }

    fn finish_inner(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.compress_pending(true)?;
        if let Some(sink) = self.sink.as_mut() {
            sink.write_all(&BGZF_EOF)?;
            sink.flush()?;
        }
        self.finished = true;
        Ok(())
    }

    /// Drain remaining bytes, append the terminator block, flush, and
    /// return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.finish_inner()?;
        match self.sink.take() {
            Some(sink) => Ok(sink),
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "bgzf writer is closed",
            ))),
        }
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "bgzf writer is closed",
            ));
        }
        self.accumulator.extend_from_slice(buf);
        if self.accumulator.len() > self.batch_threshold() {
            self.compress_pending(false)?;
        }
        Ok(buf.len())
    }

    /// Compress and emit everything buffered so far. Partial trailing
    /// chunks become short blocks, so flushing mid-stream trades
    /// compression ratio for durability.
    fn flush(&mut self) -> io::Result<()> {
        self.compress_pending(true)?;
        match self.sink.as_mut() {
            Some(sink) => Ok(sink.flush()?),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for BgzfWriter<W> {
    fn drop(&mut self) {
        let _ = self.finish_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::read_blocks;

    #[test]
    fn test_empty_write_emits_terminator_only() {
        let writer = BgzfWriter::new(Vec::new());
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes, BGZF_EOF);
    }

    #[test]
    fn test_single_block_layout() {
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(&[b'a'; 1024]).unwrap();
        let bytes = writer.finish().unwrap();

        let blocks: Vec<_> = read_blocks(&bytes).map(|b| b.unwrap()).collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].inflated_size, 1024);
        assert_eq!(blocks[1].inflated_size, 0);
        assert!(bytes.ends_with(&BGZF_EOF));
    }

    #[test]
    fn test_chunking_at_block_boundary() {
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(&vec![7u8; BLOCK_DATA_INFLATED_SIZE]).unwrap();
        let bytes = writer.finish().unwrap();

        let blocks: Vec<_> = read_blocks(&bytes).map(|b| b.unwrap()).collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].inflated_size as usize, BLOCK_DATA_INFLATED_SIZE);
    }

    #[test]
    fn test_split_writes_concatenate() {
        let data: Vec<u8> = (0..150_000u32).map(|i| (i % 241) as u8).collect();

        let mut writer = BgzfWriter::with_options(Vec::new(), 4, 2);
        writer.write_all(&data[..987]).unwrap();
        writer.write_all(&data[987..70_000]).unwrap();
        writer.write_all(&data[70_000..]).unwrap();
        let bytes = writer.finish().unwrap();

        let mut total = 0u64;
        for block in read_blocks(&bytes) {
            total += u64::from(block.unwrap().inflated_size);
        }
        assert_eq!(total, data.len() as u64);
    }

    #[test]
    fn test_write_after_finish_via_drop_is_rejected() {
        let mut writer = BgzfWriter::new(Vec::new());
        writer.finish_inner().unwrap();
        assert!(writer.write(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_every_block_within_size_caps() {
        // Incompressible data stresses the deflated-size bound
        let mut state = 0x2545f4914f6cdd1du64;
        let data: Vec<u8> = (0..500_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state & 0xFF) as u8
            })
            .collect();

        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(&data).unwrap();
        let bytes = writer.finish().unwrap();

        let mut offset = 0;
        for block in read_blocks(&bytes) {
            let block = block.unwrap();
            assert!(block.inflated_size as usize <= BLOCK_DATA_INFLATED_SIZE);
            assert!(block.deflated.len() + BLOCK_METADATA_SIZE <= 65536);
            offset += 1;
        }
        assert!(offset >= 2);
    }
}
