//! Fuzz target for frame reassembly
//!
//! Feeds arbitrary bytes in arbitrary chunk sizes to the frame assembler.

#![no_main]

use arbitrary::Arbitrary;
use gatelink_core::{FRAME_HEADER_SIZE, FrameAssembler};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct AssemblyInput {
    max_payload: u16,
    chunk: u8,
    data: Vec<u8>,
}

fuzz_target!(|input: AssemblyInput| {
    let mut assembler = FrameAssembler::new(usize::from(input.max_payload));
    let chunk = usize::from(input.chunk).max(1);

    for piece in input.data.chunks(chunk) {
        assembler.push(piece);
        loop {
            match assembler.next_frame() {
                Ok(Some(frame)) => {
                    assert_eq!(frame.payload.len(), frame.declared_len);
                    assert!(frame.declared_len > 0);
                }
                Ok(None) => break,
                // Stream is unrecoverable; the reactor closes the link here
                Err(_) => return,
            }
        }
        // Only a partial frame may remain buffered
        assert!(assembler.buffered() < FRAME_HEADER_SIZE + usize::from(input.max_payload));
    }
});
