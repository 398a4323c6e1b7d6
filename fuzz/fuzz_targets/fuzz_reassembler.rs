//! Fuzz target: `Reassembler::feed`
//!
//! Splits the input into 64-byte reports and feeds them to a reassembler
//! whose token matches the first four bytes. Completed messages must never
//! exceed the declared 16-bit length, and a reset must leave the buffer
//! empty.
//!
//! cargo fuzz run fuzz_reassembler

#![no_main]

use libfuzzer_sys::fuzz_target;
use smcp::link::ConnectionToken;
use smcp::link::fragment::{Feed, Reassembler};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let token = ConnectionToken([data[0], data[1], data[2], data[3]]);
    let mut reassembler = Reassembler::new(token);

    for report in data.chunks(64) {
        if let Feed::Complete(msg) = reassembler.feed(report) {
            assert!(msg.len() <= u16::MAX as usize, "message exceeds length field");
        }
        assert!(reassembler.buffered() <= u16::MAX as usize);
    }

    reassembler.reset();
    assert_eq!(reassembler.buffered(), 0);
    assert!(!reassembler.is_active());
});
