//! # gatelink Crypto
//!
//! Link-level obfuscation and key handling for gatelink.
//!
//! This crate provides:
//! - The keyed scramble cipher applied to frames on the wire
//! - SHA-1 handshake digests over pre-shared keys
//! - A zeroizing wrapper for shared key strings
//!
//! The scramble cipher is an obfuscation layer with a fixed, interoperable
//! algorithm. It offers no integrity protection and should not be mistaken
//! for authenticated encryption.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cipher;
pub mod error;
pub mod hash;
pub mod key;

pub use cipher::{Cipher, CipherMode};
pub use error::CryptoError;
pub use key::SharedKey;

/// SHA-1 digest size in bytes
pub const SHA1_OUTPUT_SIZE: usize = 20;

/// Hex-encoded SHA-1 digest length
pub const SHA1_HEX_LEN: usize = SHA1_OUTPUT_SIZE * 2;
