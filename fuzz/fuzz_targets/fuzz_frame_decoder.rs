//! Fuzz target: `codec::decode` / `codec::is_complete`
//!
//! Drives arbitrary byte sequences into the frame codec and asserts that
//! it never panics, that the two entry points agree, and that anything
//! accepted re-encodes to the same bytes.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use smcp::protocol::codec;

fuzz_target!(|data: &[u8]| {
    let complete = codec::is_complete(data);
    match codec::decode(data) {
        Ok(msg) => {
            assert_eq!(complete, Ok(true), "decode accepted an incomplete frame");
            assert_eq!(codec::encode(&msg), data, "accepted frame must re-encode exactly");
        }
        Err(_) => assert_ne!(complete, Ok(true), "is_complete accepted a frame decode rejects"),
    }
});
