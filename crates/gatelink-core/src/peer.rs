//! Peer and peer registry interfaces.
//!
//! The link layer does not own the list of configured servers. It consumes
//! it through [`PeerRegistry`] during the inbound handshake and reports
//! lifecycle events back through [`Peer`]. Keep-alive and reconnect policy
//! live entirely behind these hooks.
//!
//! Hooks are invoked on the reactor thread. Implementations must not block
//! on a request result from inside a hook, since the reactor is the thread
//! that would resolve it.

use crate::connection::ConnectionHandle;
use crate::message::Message;
use gatelink_crypto::SharedKey;
use std::sync::Arc;

/// A configured remote server this process links with.
pub trait Peer: Send + Sync {
    /// Display name used in logs.
    fn name(&self) -> &str;

    /// Pre-shared key configured for this peer.
    fn key(&self) -> &SharedKey;

    /// Whether links with this peer are allowed.
    fn is_enabled(&self) -> bool;

    /// Whether the peer currently holds an established connection.
    fn is_connection_connected(&self) -> bool;

    /// Whether an outbound connection attempt is in progress.
    fn is_connecting(&self) -> bool {
        false
    }

    /// Drop an in-progress outbound attempt because the remote side dialed
    /// us first.
    fn abandon_connect(&self) {}

    /// When true, routine connect/handshake warnings are not logged.
    fn connection_messages_suppressed(&self) -> bool {
        false
    }

    /// Bind a connection to this peer.
    fn set_connection(&self, connection: ConnectionHandle);

    /// The connection currently bound to this peer.
    fn connection(&self) -> Option<ConnectionHandle>;

    /// Handshake completed; `remote_version` is the peer's software version.
    fn on_connected(&self, remote_version: &str);

    /// The bound connection closed.
    fn on_disconnected(&self);

    /// An application message (request or notification) arrived.
    fn on_message(&self, message: Message);

    /// Called once per reactor pass; send a keep-alive if one is due.
    fn send_keep_alive(&self) {}

    /// Called once per reactor pass; drop the link if the peer went silent.
    fn check_keep_alive_timeout(&self) {}
}

/// Source of configured peers.
pub trait PeerRegistry: Send + Sync {
    /// Snapshot of all configured peers.
    fn peers(&self) -> Vec<Arc<dyn Peer>>;

    /// Find the peer whose handshake digest matches `digest`.
    ///
    /// A dialer sends `sha1hex(dialer_key:listener_key)`. The listener knows
    /// its own `local_key`, so for each candidate it computes
    /// `sha1hex(candidate_key:local_key)`. First match wins.
    fn find_peer_by_key(&self, digest: &str, local_key: &SharedKey) -> Option<Arc<dyn Peer>> {
        self.peers()
            .into_iter()
            .find(|peer| peer.key().digest_with(local_key) == digest)
    }
}

/// A registry with no peers.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRegistry;

impl PeerRegistry for EmptyRegistry {
    fn peers(&self) -> Vec<Arc<dyn Peer>> {
        Vec::new()
    }
}
