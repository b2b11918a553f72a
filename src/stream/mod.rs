pub mod pipelined;
pub mod reader;
pub mod writer;

pub use pipelined::{PipelinedReader, PipelinedWriter};
pub use reader::BgzfReader;
pub use writer::BgzfWriter;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::Result;

/// Open a BGZF file for reading with default options
pub fn open<P: AsRef<Path>>(path: P) -> Result<BgzfReader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(BgzfReader::new(BufReader::new(file)))
}

/// Create a BGZF file for writing with default options
pub fn create<P: AsRef<Path>>(path: P) -> Result<BgzfWriter<BufWriter<File>>> {
    let file = File::create(path)?;
    Ok(BgzfWriter::new(BufWriter::new(file)))
}
