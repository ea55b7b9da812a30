//! Shared link keys.

use crate::hash;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Pre-shared key string configured on both ends of a link.
///
/// The key material is wiped on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey(String);

impl SharedKey {
    /// Wrap a key string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key bytes, as fed to the cipher.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// True for the empty key, which the cipher rejects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Handshake digest `sha1hex(self:other)`.
    #[must_use]
    pub fn digest_with(&self, other: &SharedKey) -> String {
        hash::key_digest(self.as_str(), other.as_str())
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedKey").field(&"<redacted>").finish()
    }
}

impl From<&str> for SharedKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SharedKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}
