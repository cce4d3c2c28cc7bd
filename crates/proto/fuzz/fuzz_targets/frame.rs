//! Fuzz target for chunked frame parsing.
//!
//! This fuzzer tests the chunk reassembler against random input to find:
//! - Panics
//! - Infinite loops
//! - Incorrect error handling
//!
//! Run with:
//! ```bash
//! cd crates/proto
//! cargo +nightly fuzz run frame -- -max_total_time=300
//! ```

#![no_main]
use krait_proto::winbox::frame::{decode_chunked, encode_chunked};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Try to parse a chunked message
    if let Ok(frame) = decode_chunked(data) {
        // If parsing succeeds, ensure round-trip works
        let reencoded = encode_chunked(frame.handler, &frame.payload);
        let reparsed =
            decode_chunked(&reencoded).expect("Round-trip parsing should never fail");

        assert_eq!(frame.handler, reparsed.handler);
        assert_eq!(frame.payload, reparsed.payload);
    }
});
