//! # gatelink Transport
//!
//! Socket layer for the gatelink link protocol.
//!
//! This crate provides:
//! - The [`Network`] manager: a TCP listener plus a single-threaded `mio`
//!   reactor that drives every [`gatelink_core::Connection`]
//! - [`NetworkConfig`] with serde defaults and range validation
//! - Listen/connect address parsing ([`make_socket_address`])
//! - Banned remote address patterns ([`BanList`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod ban;
pub mod config;
pub mod error;
pub mod network;

pub use address::make_socket_address;
pub use ban::BanList;
pub use config::NetworkConfig;
pub use error::TransportError;
pub use network::{Network, NetworkState};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
