use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Framing errors
    #[error("Malformed block header: {0}")]
    MalformedHeader(&'static str),

    #[error("Insufficient bytes: needed {needed}, got {got}")]
    InsufficientBytes { needed: usize, got: usize },

    // Codec errors
    #[error("Inflated size mismatch: declared {declared} bytes, produced {produced}")]
    BlockSizeMismatch { declared: u32, produced: u32 },

    #[error("CRC32 mismatch: expected 0x{expected:08x}, got 0x{found:08x}")]
    CrcMismatch { expected: u32, found: u32 },

    #[error("zlib stream initialization failed: {0}")]
    ZlibInitialization(String),

    #[error("zlib error: {0}")]
    Zlib(String),

    #[error("Compressed data exceeds BGZF block limit")]
    CompressedDataTooLarge,

    // Batch validation errors
    #[error("Batch too large: {size} blocks exceeds maximum {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Batch shape mismatch: {sources} source blocks, {destinations} destination buffers")]
    BatchShapeMismatch { sources: usize, destinations: usize },

    // Internal errors
    #[error("Worker thread panicked")]
    WorkerPanic,
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
