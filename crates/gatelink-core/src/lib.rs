//! # gatelink Core
//!
//! Link protocol between trusted game servers.
//!
//! This crate provides:
//! - The typed key-value [`Message`] document and its [`WireCodec`]
//! - Frame encoding and stream reassembly
//! - The per-connection handshake/dispatch state machine
//! - [`PendingResult`] request correlation for blocking callers
//! - The [`Peer`] / [`PeerRegistry`] interfaces the link reports to
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Peer / PeerRegistry                       │
//! │   (configured servers, keep-alive and reconnect policy)         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                 Connection / ConnectionHandle                   │
//! │   (handshake, request correlation, dispatch)                    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                      Frames + WireCodec                         │
//! │   (length-prefixed, optionally scrambled messages)              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Socket I/O lives in `gatelink-transport`; everything here is driven by
//! the reactor through [`Connection`] callbacks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod connection;
pub mod error;
pub mod frame;
pub mod message;
pub mod peer;
pub mod result;

pub use codec::{TypedTextCodec, WireCodec};
pub use connection::{
    Connection, ConnectionHandle, ConnectionId, ConnectionState, LinkContext, Notifier,
};
pub use error::{CodecError, ConnectionError, DecodeError, Error, FrameError, ResultError};
pub use frame::{FrameAssembler, FrameFlags, MAX_FRAME_PAYLOAD, RawFrame, encode_frame};
pub use message::{Message, Value};
pub use peer::{Peer, PeerRegistry};
pub use result::{PendingResult, ResultState};

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Link protocol version; peers must match exactly
pub const PROTOCOL_VERSION: i32 = 8;

/// Fixed frame header size in bytes (flags + 24-bit length)
pub const FRAME_HEADER_SIZE: usize = 4;

/// Pad size used when scrambling frame payloads
pub const CIPHER_PAD_SIZE: usize = 256;

/// Time an accepted socket has to send its handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Suggested wait bound for request results
pub const PROTOCOL_TIMEOUT: Duration = Duration::from_millis(8000);

/// Default listen/connect port
pub const DEFAULT_PORT: u16 = 25555;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
