//! Fuzz target for WireMessage::parse
//!
//! Anyone in the host chat can send arbitrary text, so decoding must never
//! panic. Decoded messages must encode to a line that decodes to the same
//! message.

#![no_main]

use conclave_harness::WireMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|payload: &str| {
    if let Ok(Some(message)) = WireMessage::parse(payload) {
        let encoded = message.encode();
        assert_eq!(WireMessage::parse(&encoded), Ok(Some(message)), "re-encoded as {encoded:?}");
    }
});
