//! Network configuration.

use crate::address::{DEFAULT_LISTEN_HOST, make_socket_address};
use crate::error::TransportError;
use gatelink_core::{DEFAULT_PORT, HANDSHAKE_TIMEOUT, MAX_FRAME_PAYLOAD};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Smallest accepted read buffer
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Smallest accepted reactor wake-up interval (ms)
pub const MIN_SELECT_INTERVAL_MS: u64 = 1000;

/// Smallest accepted reconnect interval (ms)
pub const MIN_RECONNECT_INTERVAL_MS: u64 = 10_000;

/// Largest accepted handshake or stop timeout (ms), one day
pub const MAX_TIMEOUT_MS: u64 = 86_400_000;

/// Network configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Listen address (`[host][:port]`, `*` for all interfaces)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_address: Option<String>,
    /// This node's shared key; `-` or `*` mean unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Socket read buffer size in bytes
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Longest the reactor sleeps between passes
    #[serde(default = "default_select_interval_ms")]
    pub select_interval_ms: u64,
    /// Base delay before reconnecting to a peer
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Random skew applied to the reconnect delay
    #[serde(default = "default_reconnect_skew_ms")]
    pub reconnect_skew_ms: u64,
    /// Failed attempts before connect warnings are suppressed (-1 never)
    #[serde(default = "default_suppress_connection_attempts")]
    pub suppress_connection_attempts: i32,
    /// Banned remote address patterns (full-match regexes)
    #[serde(default)]
    pub banned_addresses: Vec<String>,
    /// Largest inbound frame payload accepted
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Time an accepted socket has to send its handshake
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Longest a stop waits for closing connections to flush
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

// Default values

fn default_read_buffer_size() -> usize {
    4096
}

fn default_select_interval_ms() -> u64 {
    30_000
}

fn default_reconnect_interval_ms() -> u64 {
    60_000
}

fn default_reconnect_skew_ms() -> u64 {
    10_000
}

fn default_suppress_connection_attempts() -> i32 {
    -1
}

fn default_max_frame_size() -> usize {
    MAX_FRAME_PAYLOAD
}

#[allow(clippy::cast_possible_truncation)]
fn default_handshake_timeout_ms() -> u64 {
    HANDSHAKE_TIMEOUT.as_millis() as u64
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: None,
            key: None,
            read_buffer_size: default_read_buffer_size(),
            select_interval_ms: default_select_interval_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            reconnect_skew_ms: default_reconnect_skew_ms(),
            suppress_connection_attempts: default_suppress_connection_attempts(),
            banned_addresses: Vec::new(),
            max_frame_size: default_max_frame_size(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl NetworkConfig {
    /// The configured key, or `None` when unset (`-`, `*` or empty).
    #[must_use]
    pub fn effective_key(&self) -> Option<&str> {
        self.key
            .as_deref()
            .filter(|key| !key.is_empty() && *key != "-" && *key != "*")
    }

    /// Resolve the listen address.
    ///
    /// # Errors
    ///
    /// [`TransportError::Config`] if unset, [`TransportError::InvalidAddress`]
    /// if it does not parse.
    pub fn listen_socket_address(&self) -> Result<SocketAddr, TransportError> {
        let address = self
            .listen_address
            .as_deref()
            .ok_or_else(|| TransportError::Config("listenAddress is not set".into()))?;
        make_socket_address(Some(address), DEFAULT_LISTEN_HOST, DEFAULT_PORT, true)
    }

    /// Reactor wake-up interval.
    #[must_use]
    pub fn select_interval(&self) -> Duration {
        Duration::from_millis(self.select_interval_ms)
    }

    /// Handshake deadline for accepted sockets.
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Grace period for flushing connections on stop.
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Validate option ranges. Unset `listen_address`/`key` are not errors
    /// here; the network refuses to start without them.
    ///
    /// # Errors
    ///
    /// [`TransportError::Config`] naming the first invalid option.
    pub fn validate(&self) -> Result<(), TransportError> {
        if let Some(address) = &self.listen_address {
            make_socket_address(Some(address), DEFAULT_LISTEN_HOST, DEFAULT_PORT, true)
                .map_err(|e| TransportError::Config(format!("listenAddress: {e}")))?;
        }
        if self.read_buffer_size < MIN_READ_BUFFER_SIZE {
            return Err(TransportError::Config(format!(
                "readBufferSize must be at least {MIN_READ_BUFFER_SIZE}"
            )));
        }
        if self.select_interval_ms < MIN_SELECT_INTERVAL_MS {
            return Err(TransportError::Config(format!(
                "selectInterval must be at least {MIN_SELECT_INTERVAL_MS}"
            )));
        }
        if self.reconnect_interval_ms < MIN_RECONNECT_INTERVAL_MS {
            return Err(TransportError::Config(format!(
                "reconnectInterval must be at least {MIN_RECONNECT_INTERVAL_MS}"
            )));
        }
        if self.suppress_connection_attempts < -1 {
            return Err(TransportError::Config(
                "suppressConnectionAttempts must be at least -1".into(),
            ));
        }
        if self.max_frame_size == 0 || self.max_frame_size > MAX_FRAME_PAYLOAD {
            return Err(TransportError::Config(format!(
                "maxFrameSize must be between 1 and {MAX_FRAME_PAYLOAD}"
            )));
        }
        if !(1..=MAX_TIMEOUT_MS).contains(&self.handshake_timeout_ms) {
            return Err(TransportError::Config(format!(
                "handshakeTimeout must be between 1 and {MAX_TIMEOUT_MS}"
            )));
        }
        if !(1..=MAX_TIMEOUT_MS).contains(&self.stop_timeout_ms) {
            return Err(TransportError::Config(format!(
                "stopTimeout must be between 1 and {MAX_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}
