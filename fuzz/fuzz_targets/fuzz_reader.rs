#![no_main]

use libfuzzer_sys::fuzz_target;
use pbgzf::BgzfReader;
use std::io::{Cursor, Read};

fuzz_target!(|data: &[u8]| {
    // Only proceed if it looks like it might be BGZF (gzip with FEXTRA)
    if data.len() < 18 || data[0] != 0x1f || data[1] != 0x8b {
        return;
    }

    // Decoding may fail on invalid input - that's OK
    let mut reader = BgzfReader::with_options(Cursor::new(data), 8, 1);
    let mut out = Vec::new();
    let _ = reader.read_to_end(&mut out);
});
