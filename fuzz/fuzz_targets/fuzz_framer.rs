#![no_main]

use libfuzzer_sys::fuzz_target;
use pbgzf::read_blocks;

fuzz_target!(|data: &[u8]| {
    // Framing arbitrary bytes may error - we're looking for panics, not errors
    for block in read_blocks(data) {
        if block.is_err() {
            break;
        }
    }
});
