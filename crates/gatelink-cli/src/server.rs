//! Configured remote servers.
//!
//! A [`Server`] is the peer side of a link: it dials its remote address,
//! keeps the link alive and reconnects after a drop. [`Servers`] is the
//! registry the network consults during inbound handshakes.

use crate::config::Config;
use gatelink_core::{ConnectionHandle, ConnectionState, Message, Peer, PeerRegistry};
use gatelink_crypto::SharedKey;
use gatelink_transport::Network;
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Send a `nop` after this long without sending anything
pub const SEND_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Drop the link after this long without receiving anything
pub const RECV_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(90);

const COMMAND: &str = "command";

type NetworkSlot = Arc<OnceLock<Weak<Network>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Reconnect and warning-suppression settings, taken from the network config.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Base delay
    pub interval: Duration,
    /// Random skew around the base delay
    pub skew: Duration,
    /// Attempts after which connect warnings go quiet (-1 never)
    pub suppress_attempts: i32,
}

impl ReconnectPolicy {
    /// Pick a delay in `max(interval, skew) ± skew`.
    #[must_use]
    pub fn delay(&self, rng: &mut impl Rng) -> Duration {
        let base = self.interval.max(self.skew);
        if self.skew.is_zero() {
            return base;
        }
        let skew = i64::try_from(self.skew.as_millis()).unwrap_or(i64::MAX);
        let base = i64::try_from(base.as_millis()).unwrap_or(i64::MAX);
        let millis = base.saturating_add(rng.gen_range(-skew..skew)).max(0);
        Duration::from_millis(millis.unsigned_abs())
    }

    /// True once more than `suppress_attempts` attempts have failed.
    #[must_use]
    pub fn suppresses(&self, attempts: u32) -> bool {
        u32::try_from(self.suppress_attempts).is_ok_and(|limit| attempts > limit)
    }
}

#[derive(Default)]
struct LinkState {
    connection: Option<ConnectionHandle>,
    connected: bool,
    remote_version: Option<String>,
    attempts: u32,
    allow_reconnect: bool,
    fast_reconnect: bool,
    reconnect_task: Option<JoinHandle<()>>,
}

/// A configured remote server.
pub struct Server {
    me: Weak<Server>,
    name: String,
    address: String,
    key: SharedKey,
    enabled: bool,
    policy: ReconnectPolicy,
    network: NetworkSlot,
    runtime: Handle,
    state: Mutex<LinkState>,
}

impl Server {
    fn new(
        config: &crate::config::ServerConfig,
        policy: ReconnectPolicy,
        network: NetworkSlot,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            name: config.name.clone(),
            address: config.address.clone(),
            key: SharedKey::new(config.key.as_str()),
            enabled: config.enabled,
            policy,
            network,
            runtime,
            state: Mutex::new(LinkState::default()),
        })
    }

    /// Connect address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Software version reported by the remote side on its last handshake.
    #[must_use]
    pub fn remote_version(&self) -> Option<String> {
        lock(&self.state).remote_version.clone()
    }

    fn network(&self) -> Option<Arc<Network>> {
        self.network.get().and_then(Weak::upgrade)
    }

    fn as_peer(&self) -> Option<Arc<dyn Peer>> {
        self.me.upgrade().map(|me| me as Arc<dyn Peer>)
    }

    /// Dial the remote server unless a link is already up.
    pub fn connect(&self) {
        let Some(network) = self.network() else {
            return;
        };
        if !self.enabled || network.is_stopped() {
            return;
        }
        let Some(peer) = self.as_peer() else {
            return;
        };

        let previous = {
            let mut state = lock(&self.state);
            if state.connection.as_ref().is_some_and(ConnectionHandle::is_open) {
                return;
            }
            state.allow_reconnect = true;
            state.fast_reconnect = false;
            self.cancel_outbound(&mut state);
            state.connected = false;
            state.attempts += 1;
            state.connection.take()
        };
        if let Some(previous) = previous {
            previous.close();
        }

        if let Err(e) = network.open(peer, &self.address) {
            warn!("unable to connect to '{}': {}", self.name, e);
        }
    }

    /// Close the link. With `allow_reconnect` the usual reconnect policy
    /// applies once the connection is gone.
    pub fn disconnect(&self, allow_reconnect: bool) {
        let connection = {
            let mut state = lock(&self.state);
            state.allow_reconnect = allow_reconnect;
            self.cancel_outbound(&mut state);
            state.connection.clone()
        };
        if let Some(connection) = connection {
            connection.close();
        }
    }

    /// Round-trip a `ping` request over the established link.
    ///
    /// Blocks for at most `timeout`; do not call from a reactor hook.
    ///
    /// # Errors
    ///
    /// Fails if the link is down or no `pong` arrives in time.
    pub fn ping(&self, timeout: Duration) -> anyhow::Result<Duration> {
        let connection = lock(&self.state)
            .connection
            .clone()
            .filter(ConnectionHandle::is_open)
            .ok_or_else(|| anyhow::anyhow!("server '{}' is not connected", self.name))?;

        let started = Instant::now();
        let request = Message::new()
            .with(COMMAND, "ping")
            .with("time", now_millis());
        let response = connection.request(request, true, timeout)?;
        if response.get_str(COMMAND) != Some("pong") {
            anyhow::bail!("server '{}' answered ping with {}", self.name, response);
        }
        Ok(started.elapsed())
    }

    fn cancel_outbound(&self, state: &mut LinkState) {
        if let Some(task) = state.reconnect_task.take() {
            info!("cancelling outbound connection attempt to server '{}'", self.name);
            task.abort();
        }
    }

    fn reconnect(&self) {
        let mut state = lock(&self.state);
        self.cancel_outbound(&mut state);
        if !state.allow_reconnect {
            return;
        }
        if state.connection.as_ref().is_some_and(ConnectionHandle::is_open) {
            return;
        }
        if self.network().is_none_or(|network| network.is_stopped()) {
            return;
        }
        if state.fast_reconnect {
            drop(state);
            self.connect();
            return;
        }

        let delay = self.policy.delay(&mut rand::thread_rng());
        if !self.policy.suppresses(state.attempts) {
            info!(
                "will attempt to reconnect to '{}' in about {} seconds",
                self.name,
                delay.as_secs()
            );
        }
        let me = self.me.clone();
        state.reconnect_task = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tokio::task::spawn_blocking(move || {
                if let Some(server) = me.upgrade() {
                    lock(&server.state).reconnect_task = None;
                    server.connect();
                }
            })
            .await;
        }));
    }

    fn send(&self, message: &Message) {
        let connection = lock(&self.state).connection.clone();
        let Some(connection) = connection else {
            return;
        };
        if let Err(e) = connection.send_message(message, true) {
            debug!("failed to send to '{}': {}", self.name, e);
        }
    }

    fn receive_ping(&self, message: Message) {
        let time = message.get_long("time");
        let reply = message.reply().unwrap_or_default();
        self.send(&reply.with(COMMAND, "pong").with("time", time));
    }

    fn receive_pong(&self, message: &Message) {
        if let Some(time) = message.get_long("time") {
            info!("ping to '{}' took {} millis", self.name, now_millis() - time);
        }
    }
}

impl Peer for Server {
    fn name(&self) -> &str {
        &self.name
    }

    fn key(&self) -> &SharedKey {
        &self.key
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_connection_connected(&self) -> bool {
        lock(&self.state)
            .connection
            .as_ref()
            .is_some_and(ConnectionHandle::is_open)
    }

    fn is_connecting(&self) -> bool {
        lock(&self.state).reconnect_task.is_some()
    }

    fn abandon_connect(&self) {
        self.disconnect(false);
    }

    fn connection_messages_suppressed(&self) -> bool {
        self.policy.suppresses(lock(&self.state).attempts)
    }

    fn set_connection(&self, connection: ConnectionHandle) {
        lock(&self.state).connection = Some(connection);
    }

    fn connection(&self) -> Option<ConnectionHandle> {
        lock(&self.state).connection.clone()
    }

    fn on_connected(&self, remote_version: &str) {
        let mut state = lock(&self.state);
        state.allow_reconnect = true;
        state.connected = true;
        state.attempts = 0;
        state.remote_version = Some(remote_version.to_string());
        self.cancel_outbound(&mut state);
        let link = state
            .connection
            .as_ref()
            .map(|c| c.name().to_string())
            .unwrap_or_default();
        info!(
            "connected to '{}' ({}), running v{}",
            self.name, link, remote_version
        );
    }

    fn on_disconnected(&self) {
        {
            let mut state = lock(&self.state);
            // A replaced connection reporting in late
            if state
                .connection
                .as_ref()
                .is_some_and(|c| c.state() != ConnectionState::Closed)
            {
                return;
            }
            if state.connected {
                let link = state
                    .connection
                    .as_ref()
                    .map(|c| c.name().to_string())
                    .unwrap_or_default();
                info!("disconnected from '{}' ({})", self.name, link);
                state.connected = false;
            }
            state.connection = None;
        }
        self.reconnect();
    }

    fn on_message(&self, message: Message) {
        if let Some(error) = message.get_str("error") {
            warn!("server '{}' complained: {}", self.name, error);
            return;
        }
        let Some(command) = message.get_str(COMMAND).map(str::to_string) else {
            warn!("missing command from connection with '{}'", self.name);
            self.disconnect(true);
            return;
        };
        debug!("received command '{}' from '{}'", command, self.name);
        match command.as_str() {
            "nop" => {}
            "ping" => self.receive_ping(message),
            "pong" => self.receive_pong(&message),
            other => warn!("received unrecognized command '{}' from '{}'", other, self.name),
        }
    }

    fn send_keep_alive(&self) {
        let connection = {
            let state = lock(&self.state);
            if !state.connected {
                return;
            }
            state.connection.clone()
        };
        let Some(connection) = connection.filter(ConnectionHandle::is_open) else {
            return;
        };
        let due = connection
            .last_message_sent()
            .is_none_or(|sent| sent.elapsed() >= SEND_KEEPALIVE_INTERVAL);
        if due {
            debug!("sending keepalive to '{}'", self.name);
            self.send(&Message::new().with(COMMAND, "nop"));
        }
    }

    fn check_keep_alive_timeout(&self) {
        let connection = lock(&self.state).connection.clone();
        let Some(connection) = connection.filter(ConnectionHandle::is_open) else {
            return;
        };
        let silent = connection
            .last_message_received()
            .is_some_and(|received| received.elapsed() >= RECV_KEEPALIVE_INTERVAL);
        if silent {
            warn!("no keepalive received from server '{}'", self.name);
            lock(&self.state).fast_reconnect = true;
            self.disconnect(true);
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Registry of configured servers.
pub struct Servers {
    servers: Vec<Arc<Server>>,
    network: NetworkSlot,
}

impl Servers {
    /// Build servers from configuration. Reconnect timers run on `runtime`.
    #[must_use]
    pub fn from_config(config: &Config, runtime: Handle) -> Arc<Self> {
        let policy = ReconnectPolicy {
            interval: Duration::from_millis(config.network.reconnect_interval_ms),
            skew: Duration::from_millis(config.network.reconnect_skew_ms),
            suppress_attempts: config.network.suppress_connection_attempts,
        };
        let network: NetworkSlot = Arc::new(OnceLock::new());
        let servers = config
            .servers
            .iter()
            .map(|server| Server::new(server, policy, Arc::clone(&network), runtime.clone()))
            .collect();
        Arc::new(Self { servers, network })
    }

    /// Bind the network servers dial through. Only the first call counts.
    pub fn attach(&self, network: &Arc<Network>) {
        let _ = self.network.set(Arc::downgrade(network));
    }

    /// Look up a server by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Server>> {
        self.servers
            .iter()
            .find(|server| server.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// All configured servers.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Server>> {
        self.servers.iter()
    }

    /// Dial every enabled server.
    pub fn connect_all(&self) {
        for server in self.servers.iter().filter(|server| server.enabled) {
            server.connect();
        }
    }

    /// Close every link without scheduling reconnects.
    pub fn disconnect_all(&self) {
        for server in &self.servers {
            server.disconnect(false);
        }
    }
}

impl PeerRegistry for Servers {
    fn peers(&self) -> Vec<Arc<dyn Peer>> {
        self.servers
            .iter()
            .map(|server| Arc::clone(server) as Arc<dyn Peer>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn policy(interval_ms: u64, skew_ms: u64) -> ReconnectPolicy {
        ReconnectPolicy {
            interval: Duration::from_millis(interval_ms),
            skew: Duration::from_millis(skew_ms),
            suppress_attempts: -1,
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        for (name, enabled) in [("Lobby", true), ("survival", false)] {
            config.servers.push(ServerConfig {
                name: name.to_string(),
                address: "127.0.0.1:1".to_string(),
                key: format!("{name}-key"),
                enabled,
            });
        }
        config
    }

    #[test]
    fn test_reconnect_delay_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = policy(60_000, 10_000);
        for _ in 0..1000 {
            let delay = policy.delay(&mut rng);
            assert!(delay >= Duration::from_millis(50_000), "{delay:?}");
            assert!(delay < Duration::from_millis(70_000), "{delay:?}");
        }
    }

    #[test]
    fn test_reconnect_delay_uses_skew_as_floor() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = policy(1_000, 20_000);
        for _ in 0..1000 {
            let delay = policy.delay(&mut rng);
            assert!(delay < Duration::from_millis(40_000), "{delay:?}");
        }
    }

    #[test]
    fn test_reconnect_delay_without_skew() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(policy(15_000, 0).delay(&mut rng), Duration::from_secs(15));
    }

    #[test]
    fn test_suppression_threshold() {
        let mut policy = policy(60_000, 0);
        assert!(!policy.suppresses(1_000));

        policy.suppress_attempts = 0;
        assert!(!policy.suppresses(0));
        assert!(policy.suppresses(1));

        policy.suppress_attempts = 3;
        assert!(!policy.suppresses(3));
        assert!(policy.suppresses(4));
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let servers = Servers::from_config(&config(), Handle::current());
        assert_eq!(servers.peers().len(), 2);
        assert_eq!(servers.get("lobby").unwrap().name(), "Lobby");
        assert!(servers.get("missing").is_none());
        assert!(!servers.get("survival").unwrap().is_enabled());
    }

    #[tokio::test]
    async fn test_find_peer_by_digest() {
        let servers = Servers::from_config(&config(), Handle::current());
        let local = SharedKey::new("local-key");
        let dialer = SharedKey::new("Lobby-key");
        let digest = dialer.digest_with(&local);

        let found = servers.find_peer_by_key(&digest, &local).unwrap();
        assert_eq!(found.name(), "Lobby");
        assert!(servers.find_peer_by_key("nope", &local).is_none());
    }

    #[tokio::test]
    async fn test_connect_without_network_is_noop() {
        let servers = Servers::from_config(&config(), Handle::current());
        servers.connect_all();
        let lobby = servers.get("lobby").unwrap();
        assert!(lobby.connection().is_none());
        assert!(!lobby.is_connection_connected());
        assert!(!lobby.connection_messages_suppressed());
    }

    #[tokio::test]
    async fn test_ping_requires_link() {
        let servers = Servers::from_config(&config(), Handle::current());
        let err = servers
            .get("lobby")
            .unwrap()
            .ping(Duration::from_millis(10))
            .unwrap_err();
        assert!(err.to_string().contains("not connected"));
    }
}
