//! Fuzz target for line framing
//!
//! Splits the input at an arbitrary point and checks that framing the two
//! halves yields the same lines as framing the whole.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_client::LineFramer;

fn frame(chunks: &[&[u8]]) -> Vec<String> {
    let mut framer = LineFramer::new();
    for chunk in chunks {
        framer.feed(chunk);
    }
    std::iter::from_fn(|| framer.pop_line()).collect()
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || std::str::from_utf8(data).is_err() {
        return;
    }
    let split = usize::from(data[0]) % data.len();
    let (head, tail) = data.split_at(split);

    assert_eq!(frame(&[data]), frame(&[head, tail]));
});
