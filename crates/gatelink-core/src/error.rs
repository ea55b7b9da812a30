//! Error types for the gatelink link protocol.

use thiserror::Error;

/// Core protocol errors
#[derive(Debug, Error)]
pub enum Error {
    /// Frame parsing or building error
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Message encoding or decoding error
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Request result error
    #[error("result error: {0}")]
    Result(#[from] ResultError),

    /// Connection-level error
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Cipher error
    #[error("crypto error: {0}")]
    Crypto(#[from] gatelink_crypto::CryptoError),
}

/// Frame-level errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame too short to parse
    #[error("frame too short: expected at least {expected}, got {actual}")]
    TooShort {
        /// Expected minimum size
        expected: usize,
        /// Actual size available
        actual: usize,
    },

    /// Declared payload length is zero or above the accepted bound
    #[error("invalid frame length {length} (max {max})")]
    InvalidLength {
        /// Length read from the header
        length: usize,
        /// Largest accepted payload
        max: usize,
    },

    /// Payload does not fit the 24-bit length field
    #[error("payload of {0} bytes exceeds the 24-bit frame length field")]
    PayloadTooLarge(usize),

    /// Header length disagrees with the payload it was computed from
    #[error("frame length mismatch: header says {declared}, payload is {actual}")]
    LengthMismatch {
        /// Length read back from the header
        declared: usize,
        /// Actual payload length
        actual: usize,
    },
}

/// Wire codec errors.
///
/// Decoding is strict: any deviation from the grammar is reported with the
/// byte offset at which it was detected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended in the middle of a value
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),

    /// Unknown type tag
    #[error("unknown type tag '{tag}' at offset {offset}")]
    UnknownTag {
        /// Tag character found
        tag: char,
        /// Offset of the tag
        offset: usize,
    },

    /// Expected a specific delimiter
    #[error("expected '{expected}' at offset {offset}")]
    Expected {
        /// Delimiter expected
        expected: char,
        /// Offset where it was missing
        offset: usize,
    },

    /// Malformed number
    #[error("invalid number at offset {0}")]
    InvalidNumber(usize),

    /// String payload is not valid base64 or UTF-8
    #[error("invalid string payload at offset {0}")]
    InvalidString(usize),

    /// Nesting exceeds the decoder limit
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),

    /// Top-level value is not a message map
    #[error("top-level value is not a message")]
    NotAMessage,

    /// Bytes left over after the top-level message
    #[error("trailing data at offset {0}")]
    TrailingData(usize),
}

/// Decode failures surfaced by [`crate::codec::WireCodec::decode`].
pub type DecodeError = CodecError;

/// Terminal outcomes of a pending request that did not complete
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResultError {
    /// The request was cancelled (usually because its connection closed)
    #[error("request cancelled")]
    Cancelled,

    /// No response arrived within the wait bound
    #[error("request timed out")]
    Timeout,
}

/// Connection-level errors returned to callers sending on a link
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection has been closed
    #[error("connection is closed")]
    Closed,

    /// Encrypted send requested on a connection with no bound peer key
    #[error("connection has no bound peer to encrypt for")]
    NoPeer,

    /// Frame could not be built
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Message could not be decoded
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Cipher rejected the operation
    #[error("crypto error: {0}")]
    Crypto(#[from] gatelink_crypto::CryptoError),

    /// Encrypted payload did not survive decryption
    #[error("encrypted payload could not be decrypted")]
    Undecryptable,

    /// Payload is not UTF-8 text
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// Request did not complete
    #[error("request failed: {0}")]
    Result(#[from] ResultError),
}
