//! SHA-1 digests used by the link handshake.
//!
//! A dialing node proves it knows both shared keys by sending
//! `hex(sha1("<own key>:<peer key>"))`. The listener recomputes the same
//! digest from its side (peer key first) to identify the caller.

use sha1::{Digest, Sha1};

/// SHA-1 output (20 bytes).
pub type Sha1Output = [u8; 20];

/// Compute the SHA-1 of `data`.
#[must_use]
pub fn sha1(data: &[u8]) -> Sha1Output {
    Sha1::digest(data).into()
}

/// Lowercase hex SHA-1 of `data`.
#[must_use]
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(sha1(data))
}

/// Handshake digest for the key pair `first:second`.
///
/// The dialer passes `(local, remote)`; the listener passes
/// `(remote, local)` so both sides hash the same string.
#[must_use]
pub fn key_digest(first: &str, second: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(first.as_bytes());
    hasher.update(b":");
    hasher.update(second.as_bytes());
    hex::encode(hasher.finalize())
}
