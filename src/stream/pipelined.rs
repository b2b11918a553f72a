//! Background-worker wrappers around the streaming reader and writer.
//!
//! Each wrapper moves the sync reader/writer onto one worker thread and
//! exchanges owned byte chunks over bounded channels, so batch
//! compression/decompression overlaps with caller-side work. Semantics are
//! identical to the sync versions. Dropping a wrapper cancels outstanding
//! work at the next batch boundary; in-flight batches complete and their
//! results are discarded.

use std::io::{self, Read, Write};
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::error::{Error, Result};
use crate::frame::{BLOCK_BATCH_SIZE, BLOCK_DATA_INFLATED_SIZE};
use crate::stream::reader::BgzfReader;
use crate::stream::writer::BgzfWriter;

/// Uncompressed bytes per chunk exchanged with the worker
const PIPELINE_CHUNK_SIZE: usize = 4 * BLOCK_DATA_INFLATED_SIZE;

fn broken_pipeline() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "bgzf pipeline worker terminated")
}

/// BGZF reader that decompresses on a background worker.
pub struct PipelinedReader {
    rx: Option<Receiver<Result<Vec<u8>>>>,
    handle: Option<JoinHandle<()>>,
    current: Vec<u8>,
    pos: usize,
    failed: bool,
}

impl PipelinedReader {
    /// Create a pipelined reader with the default batch size and
    /// auto-detected thread count.
    pub fn new<R: Read + Send + 'static>(raw: R) -> Self {
        Self::with_options(raw, BLOCK_BATCH_SIZE, 0)
    }

    pub fn with_options<R: Read + Send + 'static>(
        raw: R,
        batch_size: usize,
        num_threads: usize,
    ) -> Self {
        let (tx, rx) = bounded::<Result<Vec<u8>>>(2);

        let handle = std::thread::spawn(move || {
            let mut reader = BgzfReader::with_options(raw, batch_size, num_threads);
            loop {
                let mut chunk = vec![0u8; PIPELINE_CHUNK_SIZE];
                let mut filled = 0;
                loop {
                    match reader.read(&mut chunk[filled..]) {
                        Ok(0) => break,
                        Ok(n) => {
                            filled += n;
                            if filled == chunk.len() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(Error::Io(e)));
                            return;
                        }
                    }
                }
                if filled == 0 {
                    return;
                }
                chunk.truncate(filled);
                if tx.send(Ok(chunk)).is_err() {
                    // Caller went away; stop at this batch boundary
                    return;
                }
            }
        });

        Self { rx: Some(rx), handle: Some(handle), current: Vec::new(), pos: 0, failed: false }
    }
}

impl Read for PipelinedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.failed {
            return Err(broken_pipeline());
        }
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pos == self.current.len() {
            let rx = match self.rx.as_ref() {
                Some(rx) => rx,
                None => return Ok(0),
            };
            match rx.recv() {
                Ok(Ok(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => {
                    self.failed = true;
                    return Err(e.into());
                }
                Err(_) => {
                    // Worker finished; a panic surfaces through join
                    self.rx = None;
                    if let Some(handle) = self.handle.take() {
                        if handle.join().is_err() {
                            self.failed = true;
                            return Err(broken_pipeline());
                        }
                    }
                    return Ok(0);
                }
            }
        }

        let n = buf.len().min(self.current.len() - self.pos);
        buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Drop for PipelinedReader {
    fn drop(&mut self) {
        self.rx = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

enum WriterCmd {
    Data(Vec<u8>),
    Flush(Sender<Result<()>>),
}

/// BGZF writer that compresses on a background worker.
///
/// Bytes are shipped to the worker one batch at a time, so the caller can
/// prepare the next batch while the previous one deflates.
/// [`finish`](Self::finish) joins the worker and returns the sink.
pub struct PipelinedWriter<W: Write + Send + 'static> {
    tx: Option<Sender<WriterCmd>>,
    handle: Option<JoinHandle<Result<W>>>,
    pending: Vec<u8>,
    ship_size: usize,
}

impl<W: Write + Send + 'static> PipelinedWriter<W> {
    /// Create a pipelined writer with the default batch size and
    /// auto-detected thread count.
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, BLOCK_BATCH_SIZE, 0)
    }

    pub fn with_options(sink: W, batch_size: usize, num_threads: usize) -> Self {
        let (tx, rx) = bounded::<WriterCmd>(2);

        let handle = std::thread::spawn(move || {
            let mut writer = BgzfWriter::with_options(sink, batch_size, num_threads);
            for cmd in rx.iter() {
                match cmd {
                    WriterCmd::Data(chunk) => writer.write_all(&chunk).map_err(Error::Io)?,
                    WriterCmd::Flush(ack) => {
                        let result = writer.flush().map_err(Error::Io);
                        let failed = result.is_err();
                        let _ = ack.send(result);
                        if failed {
                            return Err(Error::Io(broken_pipeline()));
                        }
                    }
                }
            }
            writer.finish()
        });

        let ship_size =
            batch_size.clamp(1, BLOCK_BATCH_SIZE) * BLOCK_DATA_INFLATED_SIZE;
        Self { tx: Some(tx), handle: Some(handle), pending: Vec::new(), ship_size }
    }

    fn ship_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.pending);
        match self.tx.as_ref() {
            Some(tx) if tx.send(WriterCmd::Data(chunk)).is_ok() => Ok(()),
            _ => Err(broken_pipeline()),
        }
    }

    /// Ship remaining bytes, emit the terminator, and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.ship_pending().map_err(Error::Io)?;
        self.tx = None;
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| Error::WorkerPanic)?,
            None => Err(Error::Io(broken_pipeline())),
        }
    }
}

impl<W: Write + Send + 'static> Write for PipelinedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        if self.pending.len() >= self.ship_size {
            self.ship_pending()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ship_pending()?;
        let (ack_tx, ack_rx) = bounded(1);
        match self.tx.as_ref() {
            Some(tx) if tx.send(WriterCmd::Flush(ack_tx)).is_ok() => {}
            _ => return Err(broken_pipeline()),
        }
        match ack_rx.recv() {
            Ok(result) => Ok(result?),
            Err(_) => Err(broken_pipeline()),
        }
    }
}

impl<W: Write + Send + 'static> Drop for PipelinedWriter<W> {
    fn drop(&mut self) {
        let _ = self.ship_pending();
        self.tx = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pattern_data(size: usize) -> Vec<u8> {
        (0..size).map(|i| (i % 239) as u8).collect()
    }

    #[test]
    fn test_pipelined_round_trip() {
        let data = pattern_data(300_000);

        let mut writer = PipelinedWriter::with_options(Vec::new(), 4, 2);
        writer.write_all(&data).unwrap();
        let encoded = writer.finish().unwrap();

        let mut reader = PipelinedReader::with_options(Cursor::new(encoded), 4, 2);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_pipelined_writer_matches_sync_writer() {
        let data = pattern_data(200_000);

        let mut sync_writer = BgzfWriter::with_options(Vec::new(), 8, 1);
        sync_writer.write_all(&data).unwrap();
        let sync_bytes = sync_writer.finish().unwrap();

        let mut pipelined = PipelinedWriter::with_options(Vec::new(), 8, 1);
        for chunk in data.chunks(7013) {
            pipelined.write_all(chunk).unwrap();
        }
        let pipelined_bytes = pipelined.finish().unwrap();

        assert_eq!(sync_bytes, pipelined_bytes);
    }

    #[test]
    fn test_pipelined_writer_flush() {
        let data = pattern_data(10_000);

        let mut writer = PipelinedWriter::with_options(Vec::new(), 2, 1);
        writer.write_all(&data).unwrap();
        writer.flush().unwrap();
        let encoded = writer.finish().unwrap();

        let mut reader = BgzfReader::new(Cursor::new(encoded));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_pipelined_reader_reports_corruption() {
        let data = pattern_data(100_000);
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(&data).unwrap();
        let mut encoded = writer.finish().unwrap();

        // Corrupt the first block's payload
        encoded[30] ^= 0xff;

        let mut reader = PipelinedReader::new(Cursor::new(encoded));
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }

    #[test]
    fn test_dropping_reader_cancels_worker() {
        let data = pattern_data(500_000);
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(&data).unwrap();
        let encoded = writer.finish().unwrap();

        let mut reader = PipelinedReader::with_options(Cursor::new(encoded), 1, 1);
        let mut buf = [0u8; 16];
        reader.read(&mut buf).unwrap();
        drop(reader);
    }
}
