//! Batched parallel block inflation/deflation.
//!
//! Architecture (one batch call):
//! - Stage up to [`BLOCK_BATCH_SIZE`] jobs, each owning disjoint input/output
//!   byte spans, into a bounded channel
//! - Worker pool: scoped threads pull jobs dynamically, each with its own
//!   codec stream
//! - Results are reassembled in block index order after all workers join
//!
//! Batches never short-circuit: a failing block does not stop the others,
//! and the lowest-index failure is reported after the parallel region.

use crossbeam::channel::bounded;

use crate::codec::{BlockDeflater, BlockInflater};
use crate::error::{Error, Result};
use crate::frame::{read_blocks, DeflatedBlock, BLOCK_BATCH_SIZE, BLOCK_DATA_INFLATED_SIZE};

/// Resolve a caller-supplied thread count (0 = auto)
pub(crate) fn effective_threads(num_threads: usize) -> usize {
    match num_threads {
        0 => num_cpus::get().clamp(1, 32),
        n => n.clamp(1, 32),
    }
}

struct InflateJob<'a> {
    index: usize,
    deflated: &'a [u8],
    crc: u32,
    dst: &'a mut [u8],
}

struct DeflateJob<'a> {
    index: usize,
    input: &'a [u8],
    out: &'a mut [u8],
}

/// Trim a destination span to the declared inflated size without shortening
/// its lifetime.
fn trim<'a>(dst: &'a mut [u8], len: usize) -> &'a mut [u8] {
    &mut dst[..len]
}

/// Inflate a batch of blocks in parallel, one destination span per block.
///
/// `dst_parts[i]` must hold at least `blocks[i].inflated_size` bytes; each
/// block is verified against its declared size and CRC. Validation failures
/// (`BatchTooLarge`, `BatchShapeMismatch`, undersized destinations) are
/// reported before any work is scheduled. After the parallel region the
/// lowest-index block failure, if any, is returned.
pub fn inflate_parts(
    blocks: &[DeflatedBlock<'_>],
    mut dst_parts: Vec<&mut [u8]>,
    num_threads: usize,
) -> Result<()> {
    if blocks.len() > BLOCK_BATCH_SIZE {
        return Err(Error::BatchTooLarge { size: blocks.len(), max: BLOCK_BATCH_SIZE });
    }
    if blocks.len() != dst_parts.len() {
        return Err(Error::BatchShapeMismatch {
            sources: blocks.len(),
            destinations: dst_parts.len(),
        });
    }

    let mut jobs = Vec::with_capacity(blocks.len());
    for (index, (block, dst)) in blocks.iter().zip(dst_parts.drain(..)).enumerate() {
        let size = block.inflated_size as usize;
        if dst.len() < size {
            return Err(Error::InsufficientBytes { needed: size, got: dst.len() });
        }
        jobs.push(InflateJob {
            index,
            deflated: block.deflated,
            crc: block.crc,
            dst: trim(dst, size),
        });
    }

    let threads = effective_threads(num_threads).min(jobs.len().max(1));
    if threads <= 1 {
        let mut inflater = BlockInflater::new();
        for job in jobs {
            inflater.inflate_block(job.deflated, job.dst, job.crc)?;
        }
        return Ok(());
    }

    let total = jobs.len();
    let (job_tx, job_rx) = bounded::<InflateJob>(total);
    let (result_tx, result_rx) = bounded::<(usize, Result<()>)>(total);
    for job in jobs {
        job_tx.send(job).map_err(|_| Error::WorkerPanic)?;
    }
    drop(job_tx);

    crossbeam::scope(|scope| {
        for _ in 0..threads {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();

            scope.spawn(move |_| {
                let mut inflater = BlockInflater::new();
                while let Ok(job) = job_rx.recv() {
                    let result = inflater.inflate_block(job.deflated, job.dst, job.crc);
                    if result_tx.send((job.index, result)).is_err() {
                        break;
                    }
                }
            });
        }
    })
    .map_err(|_| Error::WorkerPanic)?;
    drop(result_tx);

    first_failure(result_rx.iter())?;
    Ok(())
}

/// Split `input` into block-sized chunks and compress them in parallel.
///
/// Chunk `i` covers `input[i * 65280..(i + 1) * 65280]`; only the last chunk
/// may be shorter. At most `deflated_buffers.len()` chunks are compressed,
/// so callers with more input than buffers invoke this repeatedly. Returns
/// the encoded block sizes in chunk order; `deflated_buffers[i][..sizes[i]]`
/// is the finished block.
pub fn deflate_to_buffers(
    input: &[u8],
    deflated_buffers: &mut [Vec<u8>],
    num_threads: usize,
) -> Result<Vec<usize>> {
    if deflated_buffers.len() > BLOCK_BATCH_SIZE {
        return Err(Error::BatchTooLarge {
            size: deflated_buffers.len(),
            max: BLOCK_BATCH_SIZE,
        });
    }

    let num_chunks = input
        .len()
        .div_ceil(BLOCK_DATA_INFLATED_SIZE)
        .min(deflated_buffers.len());
    let mut sizes = vec![0usize; num_chunks];
    if num_chunks == 0 {
        return Ok(sizes);
    }

    let mut jobs = Vec::with_capacity(num_chunks);
    let chunks = input.chunks(BLOCK_DATA_INFLATED_SIZE).take(num_chunks);
    for (index, (chunk, buf)) in chunks.zip(deflated_buffers.iter_mut()).enumerate() {
        jobs.push(DeflateJob { index, input: chunk, out: buf.as_mut_slice() });
    }

    let threads = effective_threads(num_threads).min(jobs.len());
    if threads <= 1 {
        let mut deflater = BlockDeflater::new();
        for job in jobs {
            sizes[job.index] = deflater.compress_block(job.input, job.out)?;
        }
        return Ok(sizes);
    }

    let total = jobs.len();
    let (job_tx, job_rx) = bounded::<DeflateJob>(total);
    let (result_tx, result_rx) = bounded::<(usize, Result<usize>)>(total);
    for job in jobs {
        job_tx.send(job).map_err(|_| Error::WorkerPanic)?;
    }
    drop(job_tx);

    crossbeam::scope(|scope| {
        for _ in 0..threads {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();

            scope.spawn(move |_| {
                let mut deflater = BlockDeflater::new();
                while let Ok(job) = job_rx.recv() {
                    let result = deflater.compress_block(job.input, job.out);
                    if result_tx.send((job.index, result)).is_err() {
                        break;
                    }
                }
            });
        }
    })
    .map_err(|_| Error::WorkerPanic)?;
    drop(result_tx);

    for (index, size) in first_failure(result_rx.iter())? {
        sizes[index] = size;
    }
    Ok(sizes)
}

/// Collect per-block results, keeping the lowest-index failure
fn first_failure<T>(
    results: impl Iterator<Item = (usize, Result<T>)>,
) -> Result<Vec<(usize, T)>> {
    let mut ok = Vec::new();
    let mut first: Option<(usize, Error)> = None;
    for (index, result) in results {
        match result {
            Ok(value) => ok.push((index, value)),
            Err(e) => {
                if first.as_ref().map_or(true, |(i, _)| index < *i) {
                    first = Some((index, e));
                }
            }
        }
    }
    match first {
        Some((_, e)) => Err(e),
        None => Ok(ok),
    }
}

/// Outcome of one [`inflate_data`] call
#[derive(Debug, Clone, Copy, Default)]
pub struct InflateInfo {
    /// Raw bytes consumed from the head of the input (whole blocks only)
    pub bytes_read: usize,
    /// Uncompressed bytes written to the head of the destination
    pub bytes_inflated: usize,
}

/// Inflate as many complete blocks from `data` as fit in `dst`.
///
/// Frames at most one batch of blocks, inflates them in parallel, and
/// reports how far the caller can advance. Trailing partial blocks are left
/// for the next call; malformed bytes are an error.
pub fn inflate_data(data: &[u8], dst: &mut [u8], num_threads: usize) -> Result<InflateInfo> {
    let mut blocks = Vec::new();
    let mut info = InflateInfo::default();

    let mut iter = read_blocks(data);
    while blocks.len() < BLOCK_BATCH_SIZE {
        match iter.next() {
            Some(Ok(block)) => {
                let size = block.inflated_size as usize;
                if info.bytes_inflated + size > dst.len() {
                    break;
                }
                info.bytes_inflated += size;
                blocks.push(block);
                info.bytes_read = iter.offset();
            }
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }

    let mut parts = Vec::with_capacity(blocks.len());
    let mut rest: &mut [u8] = dst;
    for block in &blocks {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(block.inflated_size as usize);
        parts.push(head);
        rest = tail;
    }

    inflate_parts(&blocks, parts, num_threads)?;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{BGZF_EOF, BLOCK_METADATA_SIZE};

    const BUF_SIZE: usize = BLOCK_DATA_INFLATED_SIZE + BLOCK_METADATA_SIZE + 1024;

    fn deflate_buffers(count: usize) -> Vec<Vec<u8>> {
        vec![vec![0u8; BUF_SIZE]; count]
    }

    /// Deterministic xorshift data
    fn generate_random_data(size: usize, seed: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        let mut state = seed;
        for _ in 0..size {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            data.push((state & 0xFF) as u8);
        }
        data
    }

    #[test]
    fn test_batch_too_large() {
        let blocks = vec![
            DeflatedBlock { deflated: &[], inflated_size: 0, crc: 0 };
            BLOCK_BATCH_SIZE + 1
        ];
        let err = inflate_parts(&blocks, Vec::new(), 1).unwrap_err();
        assert!(matches!(err, Error::BatchTooLarge { size: 301, max: 300 }));
    }

    #[test]
    fn test_batch_shape_mismatch() {
        let blocks = vec![DeflatedBlock { deflated: &[], inflated_size: 0, crc: 0 }; 2];
        let mut only = vec![0u8; 16];
        let err = inflate_parts(&blocks, vec![only.as_mut_slice()], 1).unwrap_err();
        assert!(matches!(
            err,
            Error::BatchShapeMismatch { sources: 2, destinations: 1 }
        ));
    }

    #[test]
    fn test_deflate_too_many_buffers() {
        let mut buffers = deflate_buffers(BLOCK_BATCH_SIZE + 1);
        let err = deflate_to_buffers(&[0u8; 16], &mut buffers, 1).unwrap_err();
        assert!(matches!(err, Error::BatchTooLarge { .. }));
    }

    #[test]
    fn test_chunk_policy() {
        // 2.3 blocks of input
        let data = generate_random_data(2 * BLOCK_DATA_INFLATED_SIZE + 19440, 7);

        let mut buffers = deflate_buffers(8);
        let sizes = deflate_to_buffers(&data, &mut buffers, 2).unwrap();
        assert_eq!(sizes.len(), 3);

        // Fewer buffers than chunks: only the buffered prefix is compressed
        let mut two = deflate_buffers(2);
        let sizes = deflate_to_buffers(&data, &mut two, 2).unwrap();
        assert_eq!(sizes.len(), 2);

        // Empty input compresses to nothing
        let mut buffers = deflate_buffers(4);
        assert!(deflate_to_buffers(&[], &mut buffers, 2).unwrap().is_empty());
    }

    #[test]
    fn test_deflate_then_inflate_round_trip() {
        for threads in [1, 4] {
            let data = generate_random_data(5 * BLOCK_DATA_INFLATED_SIZE + 123, 42);

            let mut buffers = deflate_buffers(8);
            let sizes = deflate_to_buffers(&data, &mut buffers, threads).unwrap();
            assert_eq!(sizes.len(), 6);

            let mut stream = Vec::new();
            for (buf, size) in buffers.iter().zip(&sizes) {
                stream.extend_from_slice(&buf[..*size]);
            }

            let mut inflated = vec![0u8; data.len()];
            let info = inflate_data(&stream, &mut inflated, threads).unwrap();
            assert_eq!(info.bytes_read, stream.len());
            assert_eq!(info.bytes_inflated, data.len());
            assert_eq!(inflated, data);
        }
    }

    #[test]
    fn test_inflate_data_partial_destination() {
        let data = generate_random_data(3 * BLOCK_DATA_INFLATED_SIZE, 9);
        let mut buffers = deflate_buffers(4);
        let sizes = deflate_to_buffers(&data, &mut buffers, 1).unwrap();

        let mut stream = Vec::new();
        for (buf, size) in buffers.iter().zip(&sizes) {
            stream.extend_from_slice(&buf[..*size]);
        }

        // Room for two of the three blocks
        let mut dst = vec![0u8; 2 * BLOCK_DATA_INFLATED_SIZE];
        let info = inflate_data(&stream, &mut dst, 1).unwrap();
        assert_eq!(info.bytes_inflated, 2 * BLOCK_DATA_INFLATED_SIZE);
        assert_eq!(info.bytes_read, sizes[0] + sizes[1]);
        assert_eq!(dst, &data[..2 * BLOCK_DATA_INFLATED_SIZE]);

        // Remainder inflates on the next call
        let mut tail = vec![0u8; BLOCK_DATA_INFLATED_SIZE];
        let info = inflate_data(&stream[info.bytes_read..], &mut tail, 1).unwrap();
        assert_eq!(info.bytes_inflated, BLOCK_DATA_INFLATED_SIZE);
        assert_eq!(tail, &data[2 * BLOCK_DATA_INFLATED_SIZE..]);
    }

    #[test]
    fn test_inflate_data_ignores_trailing_partial_block() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&BGZF_EOF);
        stream.extend_from_slice(&BGZF_EOF[..13]);

        let mut dst = vec![0u8; 64];
        let info = inflate_data(&stream, &mut dst, 1).unwrap();
        assert_eq!(info.bytes_read, 28);
        assert_eq!(info.bytes_inflated, 0);
    }

    #[test]
    fn test_corrupt_block_reports_lowest_index() {
        let data = generate_random_data(4 * BLOCK_DATA_INFLATED_SIZE, 11);
        let mut buffers = deflate_buffers(4);
        let sizes = deflate_to_buffers(&data, &mut buffers, 2).unwrap();

        let mut stream = Vec::new();
        for (buf, size) in buffers.iter().zip(&sizes) {
            stream.extend_from_slice(&buf[..*size]);
        }

        // Flip one bit in the CRC field of block 1
        let crc_offset = sizes[0] + sizes[1] - 8;
        stream[crc_offset] ^= 0x01;

        let mut dst = vec![0u8; data.len()];
        let err = inflate_data(&stream, &mut dst, 4).unwrap_err();
        assert!(matches!(err, Error::CrcMismatch { .. }));
    }

    #[test]
    fn test_parallel_matches_single_threaded() {
        let data = generate_random_data(7 * BLOCK_DATA_INFLATED_SIZE + 5000, 3);

        let mut single = deflate_buffers(8);
        let single_sizes = deflate_to_buffers(&data, &mut single, 1).unwrap();

        let mut parallel = deflate_buffers(8);
        let parallel_sizes = deflate_to_buffers(&data, &mut parallel, 8).unwrap();

        assert_eq!(single_sizes, parallel_sizes);
        for ((a, b), size) in single.iter().zip(&parallel).zip(&single_sizes) {
            assert_eq!(a[..*size], b[..*size]);
        }
    }
}
