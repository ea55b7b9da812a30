//! Two-node test fixture for integration testing
//!
//! Runs two real [`Network`] reactors on loopback, each with a registry
//! holding one [`LinkPeer`] that stands for the other node.
//!
//! # Example
//!
//! ```no_run
//! use gatelink_integration_tests::fixtures::TwoNodeFixture;
//!
//! let fixture = TwoNodeFixture::new();
//! let _link = fixture.dial().unwrap();
//! assert!(fixture.wait_established());
//! fixture.stop();
//! ```

use gatelink_core::{ConnectionHandle, Message, Peer, PeerRegistry};
use gatelink_crypto::SharedKey;
use gatelink_transport::{Network, NetworkConfig, TransportError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Network key of the dialing node
pub const ALPHA_KEY: &str = "alpha-key";

/// Network key of the listening node
pub const BRAVO_KEY: &str = "bravo-key";

/// Poll `condition` every 10ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Recording peer used on both sides of the fixture.
///
/// Answers `command: ping` requests with `command: pong`, `cmd: ping`
/// requests with `pong: true`, and records every other message.
pub struct LinkPeer {
    name: String,
    key: SharedKey,
    enabled: AtomicBool,
    connection: Mutex<Option<ConnectionHandle>>,
    connected: AtomicBool,
    remote_version: Mutex<Option<String>>,
    disconnects: AtomicUsize,
    messages: Mutex<Vec<Message>>,
}

impl LinkPeer {
    /// Peer named `name` whose remote network key is `key`.
    pub fn new(name: &str, key: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            key: SharedKey::new(key),
            enabled: AtomicBool::new(true),
            connection: Mutex::new(None),
            connected: AtomicBool::new(false),
            remote_version: Mutex::new(None),
            disconnects: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        })
    }

    /// Allow or refuse links with this peer.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// True once a handshake completed and no disconnect followed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Times the bound connection closed.
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Version the remote side reported.
    pub fn remote_version(&self) -> Option<String> {
        self.remote_version.lock().unwrap().clone()
    }

    /// Messages received other than `ping`.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

impl Peer for LinkPeer {
    fn name(&self) -> &str {
        &self.name
    }

    fn key(&self) -> &SharedKey {
        &self.key
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn is_connection_connected(&self) -> bool {
        self.connection
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(ConnectionHandle::is_open)
    }

    fn set_connection(&self, connection: ConnectionHandle) {
        *self.connection.lock().unwrap() = Some(connection);
    }

    fn connection(&self) -> Option<ConnectionHandle> {
        self.connection.lock().unwrap().clone()
    }

    fn on_connected(&self, remote_version: &str) {
        *self.remote_version.lock().unwrap() = Some(remote_version.to_string());
        self.connected.store(true, Ordering::SeqCst);
    }

    fn on_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_message(&self, message: Message) {
        if message.get_str("command") == Some("ping") {
            if let (Some(reply), Some(connection)) = (message.reply(), self.connection()) {
                let pong = reply
                    .with("command", "pong")
                    .with("seq", message.get_int("seq"));
                let _ = connection.send_message(&pong, true);
            }
            return;
        }
        if message.get_str("cmd") == Some("ping") {
            if let (Some(reply), Some(connection)) = (message.reply(), self.connection()) {
                let _ = connection.send_message(&reply.with("pong", true), true);
            }
            return;
        }
        self.messages.lock().unwrap().push(message);
    }
}

/// Registry over a fixed set of [`LinkPeer`]s.
pub struct LinkRegistry(pub Vec<Arc<LinkPeer>>);

impl PeerRegistry for LinkRegistry {
    fn peers(&self) -> Vec<Arc<dyn Peer>> {
        self.0
            .iter()
            .map(|peer| Arc::clone(peer) as Arc<dyn Peer>)
            .collect()
    }
}

fn node_config(key: &str) -> NetworkConfig {
    NetworkConfig {
        listen_address: Some("127.0.0.1:0".into()),
        key: Some(key.into()),
        select_interval_ms: 1000,
        ..NetworkConfig::default()
    }
}

/// Two networks on loopback. `alpha` dials, `bravo` listens.
pub struct TwoNodeFixture {
    /// Dialing node
    pub alpha: Network,
    /// Listening node
    pub bravo: Network,
    /// Alpha's view of bravo
    pub bravo_peer: Arc<LinkPeer>,
    /// Bravo's view of alpha
    pub alpha_peer: Arc<LinkPeer>,
}

impl TwoNodeFixture {
    /// Both nodes configured with each other's correct keys.
    pub fn new() -> Self {
        Self::with_keys(BRAVO_KEY, ALPHA_KEY, |_| {})
    }

    /// Build with the key alpha holds for bravo, the key bravo holds for
    /// alpha, and a hook to adjust bravo's config before it starts.
    pub fn with_keys(
        bravo_key_at_alpha: &str,
        alpha_key_at_bravo: &str,
        configure_bravo: impl FnOnce(&mut NetworkConfig),
    ) -> Self {
        Self::build(
            [ALPHA_KEY, BRAVO_KEY],
            bravo_key_at_alpha,
            alpha_key_at_bravo,
            configure_bravo,
        )
    }

    /// Both nodes and both peer entries keyed with the same `secret`.
    pub fn shared_secret(secret: &str) -> Self {
        Self::build([secret, secret], secret, secret, |_| {})
    }

    fn build(
        [alpha_key, bravo_key]: [&str; 2],
        bravo_key_at_alpha: &str,
        alpha_key_at_bravo: &str,
        configure_bravo: impl FnOnce(&mut NetworkConfig),
    ) -> Self {
        let bravo_peer = LinkPeer::new("bravo", bravo_key_at_alpha);
        let alpha_peer = LinkPeer::new("alpha", alpha_key_at_bravo);

        let alpha = Network::new(
            node_config(alpha_key),
            Arc::new(LinkRegistry(vec![Arc::clone(&bravo_peer)])),
            "alpha-1.0",
        );
        let mut bravo_config = node_config(bravo_key);
        configure_bravo(&mut bravo_config);
        let bravo = Network::new(
            bravo_config,
            Arc::new(LinkRegistry(vec![Arc::clone(&alpha_peer)])),
            "bravo-1.0",
        );

        alpha.start().expect("alpha starts");
        bravo.start().expect("bravo starts");

        Self {
            alpha,
            bravo,
            bravo_peer,
            alpha_peer,
        }
    }

    /// Alpha dials bravo.
    pub fn dial(&self) -> Result<ConnectionHandle, TransportError> {
        let address = self.bravo.local_addr().expect("bravo is listening");
        self.alpha.open(
            Arc::clone(&self.bravo_peer) as Arc<dyn Peer>,
            &address.to_string(),
        )
    }

    /// Wait until both sides report an established link.
    pub fn wait_established(&self) -> bool {
        wait_until(Duration::from_secs(5), || {
            self.bravo_peer.is_connected() && self.alpha_peer.is_connected()
        })
    }

    /// Stop both networks.
    pub fn stop(&self) {
        let _ = self.alpha.stop();
        let _ = self.bravo.stop();
    }
}

impl Default for TwoNodeFixture {
    fn default() -> Self {
        Self::new()
    }
}
