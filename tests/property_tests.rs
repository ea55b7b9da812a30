//! Property-based tests for gatelink
//!
//! Uses proptest to verify invariants across large input spaces.

use proptest::prelude::*;

// ============================================================================
// Cipher Properties
// ============================================================================

mod cipher_properties {
    use super::*;
    use gatelink_crypto::Cipher;

    fn pad_size() -> impl Strategy<Value = usize> {
        prop_oneof![Just(0usize), Just(1), Just(256), Just(8192)]
    }

    proptest! {
        /// Decrypting with the same key restores the plaintext
        #[test]
        fn cipher_roundtrip(
            pad in pad_size(),
            key in prop::collection::vec(any::<u8>(), 1..64),
            plain in prop::collection::vec(any::<u8>(), 0..2048),
        ) {
            let mut cipher = Cipher::new(pad);
            let sealed = cipher.encrypt(&key, &plain).unwrap();
            let opened = cipher.decrypt(&key, &sealed).unwrap();
            prop_assert_eq!(opened, plain);
        }

        /// Padded output is always a whole number of pads
        #[test]
        fn cipher_output_aligned(
            pad in prop_oneof![Just(1usize), Just(256), Just(8192)],
            plain in prop::collection::vec(any::<u8>(), 1..2048),
        ) {
            let mut cipher = Cipher::new(pad);
            let sealed = cipher.encrypt(b"network-key", &plain).unwrap();
            prop_assert_eq!(sealed.len() % pad, 0);
            prop_assert!(sealed.len() >= plain.len() + 4);
        }

        /// Without padding the output length equals the input length
        #[test]
        fn cipher_unpadded_preserves_length(
            plain in prop::collection::vec(any::<u8>(), 0..2048),
        ) {
            let mut cipher = Cipher::new(0);
            let sealed = cipher.encrypt(b"network-key", &plain).unwrap();
            prop_assert_eq!(sealed.len(), plain.len());
        }

        /// Lengths around the pad boundaries survive every pad size
        #[test]
        fn cipher_roundtrip_boundaries(
            pad in pad_size(),
            len in prop_oneof![Just(0usize), Just(1), Just(255), Just(256), Just(257), Just(100_000)],
            seed in any::<u8>(),
        ) {
            let plain: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect();
            let mut cipher = Cipher::new(pad);
            let sealed = cipher.encrypt(b"secretA", &plain).unwrap();
            prop_assert_eq!(cipher.decrypt(b"secretA", &sealed).unwrap(), plain);
        }

        /// Decrypting arbitrary bytes never panics
        #[test]
        fn cipher_decrypt_garbage(
            pad in pad_size(),
            data in prop::collection::vec(any::<u8>(), 0..4096),
        ) {
            let mut cipher = Cipher::new(pad);
            let _ = cipher.decrypt(b"network-key", &data);
        }
    }
}

// ============================================================================
// Codec Properties
// ============================================================================

mod codec_properties {
    use super::*;
    use gatelink_core::{Message, TypedTextCodec, Value, WireCodec};

    fn key() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9:_ ]{0,12}"
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            ".{0,32}".prop_map(Value::String),
            any::<i32>().prop_map(Value::Int),
            any::<i64>().prop_map(Value::Long),
            (-1.0e9f64..1.0e9).prop_map(Value::Double),
            any::<bool>().prop_map(Value::Bool),
        ]
    }

    fn value() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
                prop::collection::btree_map(key(), inner, 0..6).prop_map(|entries| {
                    let mut message = Message::new();
                    for (k, v) in entries {
                        message.insert(k, v);
                    }
                    Value::Map(message)
                }),
            ]
        })
    }

    fn message() -> impl Strategy<Value = Message> {
        prop::collection::btree_map(key(), value(), 0..8).prop_map(|entries| {
            let mut message = Message::new();
            for (k, v) in entries {
                message.insert(k, v);
            }
            message
        })
    }

    proptest! {
        /// Decoding an encoded message restores it exactly
        #[test]
        fn codec_roundtrip(msg in message()) {
            let codec = TypedTextCodec::new();
            let text = codec.encode(&msg);
            let decoded = codec.decode(&text).unwrap();
            prop_assert_eq!(decoded, msg);
        }

        /// Encoding is deterministic
        #[test]
        fn codec_deterministic(msg in message()) {
            let codec = TypedTextCodec::new();
            prop_assert_eq!(codec.encode(&msg), codec.encode(&msg.clone()));
        }

        /// Decoding arbitrary text never panics
        #[test]
        fn codec_decode_garbage(text in ".{0,256}") {
            let _ = TypedTextCodec::new().decode(&text);
        }
    }
}

// ============================================================================
// Frame Properties
// ============================================================================

mod frame_properties {
    use super::*;
    use gatelink_core::{FrameAssembler, FrameFlags, MAX_FRAME_PAYLOAD, encode_frame};

    proptest! {
        /// Frames split at arbitrary points reassemble in order
        #[test]
        fn chunked_reassembly(
            payloads in prop::collection::vec(
                (any::<bool>(), prop::collection::vec(any::<u8>(), 1..512)),
                1..8,
            ),
            chunk in 1usize..64,
        ) {
            let mut stream = Vec::new();
            for (encrypted, payload) in &payloads {
                let flags = if *encrypted {
                    FrameFlags::new().with_encrypted()
                } else {
                    FrameFlags::new()
                };
                stream.extend(encode_frame(flags, payload).unwrap());
            }

            let mut assembler = FrameAssembler::new(MAX_FRAME_PAYLOAD);
            let mut frames = Vec::new();
            for piece in stream.chunks(chunk) {
                assembler.push(piece);
                while let Some(frame) = assembler.next_frame().unwrap() {
                    frames.push(frame);
                }
            }

            prop_assert_eq!(assembler.buffered(), 0);
            prop_assert_eq!(frames.len(), payloads.len());
            for (frame, (encrypted, payload)) in frames.iter().zip(&payloads) {
                prop_assert_eq!(frame.flags.is_encrypted(), *encrypted);
                prop_assert_eq!(frame.declared_len, payload.len());
                prop_assert_eq!(&frame.payload, payload);
            }
        }

        /// Arbitrary input yields frames or an error, never a panic
        #[test]
        fn assembler_garbage(data in prop::collection::vec(any::<u8>(), 0..1024)) {
            let mut assembler = FrameAssembler::new(4096);
            assembler.push(&data);
            while let Ok(Some(_)) = assembler.next_frame() {}
        }
    }
}

// ============================================================================
// Pending Result Properties
// ============================================================================

mod result_properties {
    use super::*;
    use gatelink_core::{Message, PendingResult, ResultState};

    #[derive(Debug, Clone, Copy)]
    enum Outcome {
        Complete,
        Cancel,
        Timeout,
    }

    fn outcome() -> impl Strategy<Value = Outcome> {
        prop_oneof![
            Just(Outcome::Complete),
            Just(Outcome::Cancel),
            Just(Outcome::Timeout),
        ]
    }

    fn apply(result: &PendingResult, outcome: Outcome) -> bool {
        match outcome {
            Outcome::Complete => result.set_result(Message::new().with("ok", true)),
            Outcome::Cancel => result.cancel(),
            Outcome::Timeout => result.timeout(),
        }
    }

    fn expected_state(outcome: Outcome) -> ResultState {
        match outcome {
            Outcome::Complete => ResultState::Completed,
            Outcome::Cancel => ResultState::Cancelled,
            Outcome::Timeout => ResultState::TimedOut,
        }
    }

    proptest! {
        /// The first terminal outcome wins; later ones are ignored
        #[test]
        fn first_outcome_wins(outcomes in prop::collection::vec(outcome(), 1..6)) {
            let result = PendingResult::new(1);
            let applied: Vec<bool> = outcomes.iter().map(|o| apply(&result, *o)).collect();

            prop_assert!(applied[0]);
            prop_assert!(applied[1..].iter().all(|a| !a));
            prop_assert_eq!(result.state(), expected_state(outcomes[0]));
            prop_assert!(!result.is_waiting());
        }
    }
}
