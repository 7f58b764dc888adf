//! Fuzz target for protocol line parsing
//!
//! Feeds arbitrary text to the event parser and the outbound sanitizer,
//! which must never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        if input.len() > slirc_client::MAX_LINE_LEN {
            return;
        }

        if let Ok(event) = slirc_client::parse_line(input) {
            // Display must not panic either
            let _ = event.to_string();
        }

        let clean = slirc_client::command::sanitize(input);
        assert!(!clean.contains(['\r', '\n']));
    }
});
