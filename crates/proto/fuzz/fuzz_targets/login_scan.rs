//! Fuzz target for login-payload field extraction.
//!
//! The tag scanner runs over attacker-controlled decrypted bytes, so it
//! must never panic or read out of bounds whatever the input.
//!
//! Run with:
//! ```bash
//! cd crates/proto
//! cargo +nightly fuzz run login_scan -- -max_total_time=300
//! ```

#![no_main]
use krait_proto::winbox::message::parse_login;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(login) = parse_login(data) {
        // Extracted fields always have their fixed shapes.
        assert_eq!(login.credential.digest.len(), 16);
        assert_eq!(login.hash_field.len(), 22);
        assert!(login.request_id.len() == 5 || login.request_id.len() == 6);
    }
});
