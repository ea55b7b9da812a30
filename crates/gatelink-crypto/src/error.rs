//! Cipher error types.

use thiserror::Error;

/// Cipher and key errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// `update`/`do_final` called without a preceding `init`
    #[error("cipher has not been initialized")]
    NotInitialized,

    /// Cipher keys must contain at least one byte
    #[error("cipher key must not be empty")]
    EmptyKey,

    /// Pad size does not fit the 4-byte padding trailer
    #[error("invalid pad size: {0}")]
    InvalidPadSize(usize),
}
