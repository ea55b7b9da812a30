//! Fuzz target for the scramble cipher
//!
//! Round-trips arbitrary plaintext and decrypts arbitrary ciphertext.

#![no_main]

use arbitrary::Arbitrary;
use gatelink_crypto::Cipher;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct CipherInput {
    pad: u16,
    key: Vec<u8>,
    data: Vec<u8>,
}

fuzz_target!(|input: CipherInput| {
    let mut cipher = Cipher::new(usize::from(input.pad));

    // Empty keys are rejected, never a panic
    let Ok(sealed) = cipher.encrypt(&input.key, &input.data) else {
        assert!(input.key.is_empty());
        return;
    };

    if input.pad > 0 {
        assert_eq!(sealed.len() % usize::from(input.pad), 0);
        if !input.data.is_empty() {
            let opened = cipher.decrypt(&input.key, &sealed).unwrap();
            assert_eq!(opened, input.data);
        }
    } else {
        let opened = cipher.decrypt(&input.key, &sealed).unwrap();
        assert_eq!(opened, input.data);
    }

    let _ = cipher.decrypt(&input.key, &input.data);
});
