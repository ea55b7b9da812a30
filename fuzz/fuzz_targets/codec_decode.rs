//! Fuzz target for the wire codec
//!
//! Arbitrary text must decode or fail cleanly, and anything that decodes
//! must survive a re-encode.

#![no_main]

use gatelink_core::{TypedTextCodec, WireCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let codec = TypedTextCodec::new();
    if let Ok(message) = codec.decode(text) {
        let encoded = codec.encode(&message);
        let again = codec
            .decode(&encoded)
            .expect("re-encoded message decodes");
        assert_eq!(codec.encode(&again), encoded);
    }
});
