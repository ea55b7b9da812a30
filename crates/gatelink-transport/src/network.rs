//! Single-threaded network reactor.
//!
//! One [`Network`] owns a TCP listener and every link connection. All
//! socket I/O runs on a dedicated reactor thread driving a `mio` poll loop;
//! other threads talk to it through a command channel plus a [`Waker`].
//!
//! Each pass of the loop:
//!
//! 1. drains queued commands (open, write, close, stop)
//! 2. on stop, drops the listener and schedules every connection for close
//! 3. reaps closing connections whose write queue is empty; once stopping
//!    outlasts `stop_timeout` the rest are killed unflushed
//! 4. starts queued outbound connects
//! 5. runs peer keep-alive hooks and accepted-socket handshake deadlines
//! 6. polls for at most `select_interval` and dispatches readiness

use crate::address::{
    DEFAULT_CONNECT_HOST, inbound_name, make_socket_address, outbound_name,
};
use crate::ban::BanList;
use crate::config::NetworkConfig;
use crate::error::TransportError;
use crate::lock;
use crossbeam_channel::{Receiver, Sender, unbounded};
use gatelink_core::{
    Connection, ConnectionHandle, ConnectionId, ConnectionState, DEFAULT_PORT, LinkContext,
    Notifier, Peer, PeerRegistry, TypedTextCodec, WireCodec,
};
use gatelink_crypto::SharedKey;
use mio::event::Event;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION_ID: u64 = 2;
const LISTEN_BACKLOG: i32 = 128;
const EVENT_CAPACITY: usize = 256;

/// Lifecycle of a [`Network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NetworkState {
    /// Not running
    Stopped = 0,
    /// Listening and serving connections
    Running = 1,
    /// Stop requested, reactor has not reacted yet
    Stop = 2,
    /// Flushing and closing connections before exit
    Stopping = 3,
}

impl NetworkState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Stop,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    /// True for every state except [`NetworkState::Running`].
    #[must_use]
    pub fn is_stopped(self) -> bool {
        self != Self::Running
    }
}

#[derive(Debug, Clone, Default)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn get(&self) -> NetworkState {
        NetworkState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: NetworkState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

enum Command {
    Open {
        connection: Connection,
        address: Result<SocketAddr, String>,
    },
    Write(ConnectionId),
    Close(ConnectionId),
    Stop,
}

/// Routes connection wake-ups into the reactor's command channel.
struct ReactorNotifier {
    commands: Sender<Command>,
    waker: Arc<Waker>,
}

impl ReactorNotifier {
    fn send(&self, command: Command) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::Closed)?;
        self.waker.wake()?;
        Ok(())
    }
}

impl Notifier for ReactorNotifier {
    fn want_write(&self, id: ConnectionId) {
        if let Err(e) = self.send(Command::Write(id)) {
            trace!("dropped write request for connection {}: {}", id, e);
        }
    }

    fn want_close(&self, id: ConnectionId) {
        if let Err(e) = self.send(Command::Close(id)) {
            trace!("dropped close request for connection {}: {}", id, e);
        }
    }
}

struct Running {
    notifier: Arc<ReactorNotifier>,
    link: Arc<LinkContext>,
    local_addr: SocketAddr,
    thread: JoinHandle<()>,
}

/// Link network manager.
///
/// Listens for peers, dials configured peers on request and hosts the
/// reactor thread that drives every [`Connection`].
pub struct Network {
    config: Mutex<NetworkConfig>,
    registry: Arc<dyn PeerRegistry>,
    codec: Arc<dyn WireCodec>,
    plugin_version: String,
    bans: Arc<BanList>,
    state: StateCell,
    next_id: Arc<AtomicU64>,
    running: Mutex<Option<Running>>,
}

impl Network {
    /// Create a stopped network.
    ///
    /// Banned address patterns are loaded from `config`; invalid ones are
    /// skipped with a warning.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        registry: Arc<dyn PeerRegistry>,
        plugin_version: impl Into<String>,
    ) -> Self {
        let bans = BanList::from_patterns(&config.banned_addresses);
        Self {
            config: Mutex::new(config),
            registry,
            codec: Arc::new(TypedTextCodec::new()),
            plugin_version: plugin_version.into(),
            bans: Arc::new(bans),
            state: StateCell::default(),
            next_id: Arc::new(AtomicU64::new(FIRST_CONNECTION_ID)),
            running: Mutex::new(None),
        }
    }

    /// Replace the message codec. Takes effect on the next start.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn WireCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> NetworkConfig {
        lock(&self.config).clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> NetworkState {
        self.state.get()
    }

    /// True unless the network is running.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state().is_stopped()
    }

    /// Address the listener is bound to, while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.running).as_ref().map(|r| r.local_addr)
    }

    /// Bind the listener and start the reactor thread.
    ///
    /// # Errors
    ///
    /// [`TransportError::AlreadyRunning`], [`TransportError::Config`] when
    /// the listen address or key is unset or an option is out of range, and
    /// [`TransportError::Io`] when binding fails.
    pub fn start(&self) -> Result<(), TransportError> {
        let mut running = lock(&self.running);
        if running.is_some() {
            return Err(TransportError::AlreadyRunning);
        }

        let config = self.config();
        config.validate()?;
        let listen_addr = config.listen_socket_address()?;
        let key = config
            .effective_key()
            .ok_or_else(|| TransportError::Config("key is not set".into()))?;

        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);
        let mut listener = bind_listener(listen_addr)?;
        let local_addr = listener.local_addr()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        let (commands_tx, commands_rx) = unbounded();
        let notifier = Arc::new(ReactorNotifier {
            commands: commands_tx,
            waker,
        });
        let link = Arc::new(LinkContext {
            local_key: SharedKey::new(key),
            plugin_version: self.plugin_version.clone(),
            registry: Arc::clone(&self.registry),
            codec: Arc::clone(&self.codec),
            max_frame_size: config.max_frame_size,
            handshake_timeout: config.handshake_timeout(),
        });

        let reactor = Reactor {
            poll,
            listener: Some(listener),
            commands: commands_rx,
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
            link: Arc::clone(&link),
            bans: Arc::clone(&self.bans),
            state: self.state.clone(),
            next_id: Arc::clone(&self.next_id),
            entries: HashMap::new(),
            closing: HashSet::new(),
            opening: Vec::new(),
            read_buffer: vec![0u8; config.read_buffer_size],
            select_interval: config.select_interval(),
            stop_timeout: config.stop_timeout(),
            stop_deadline: None,
        };

        self.state.set(NetworkState::Running);
        let thread = match thread::Builder::new()
            .name("gatelink-network".to_string())
            .spawn(move || reactor.run())
        {
            Ok(thread) => thread,
            Err(e) => {
                self.state.set(NetworkState::Stopped);
                return Err(e.into());
            }
        };

        info!("network manager listening on {}", local_addr);
        *running = Some(Running {
            notifier,
            link,
            local_addr,
            thread,
        });
        Ok(())
    }

    /// Close every connection and stop the reactor thread.
    ///
    /// Queued writes are flushed before sockets close, for at most the
    /// configured stop timeout. Blocks until the reactor has exited.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotRunning`] if the network was not started.
    pub fn stop(&self) -> Result<(), TransportError> {
        let Some(running) = lock(&self.running).take() else {
            return Err(TransportError::NotRunning);
        };

        self.state.set(NetworkState::Stop);
        if let Err(e) = running.notifier.send(Command::Stop) {
            warn!("failed to signal network reactor: {}", e);
        }
        if running.thread.join().is_err() {
            error!("network reactor thread panicked");
        }
        self.state.set(NetworkState::Stopped);
        info!("network manager stopped");
        Ok(())
    }

    /// Stop (if running), apply `config`, then start again.
    ///
    /// # Errors
    ///
    /// Any error from [`NetworkConfig::validate`] or [`Network::start`].
    pub fn restart(&self, config: NetworkConfig) -> Result<(), TransportError> {
        config.validate()?;
        match self.stop() {
            Ok(()) | Err(TransportError::NotRunning) => {}
            Err(e) => return Err(e),
        }
        self.bans.reload(&config.banned_addresses);
        *lock(&self.config) = config;
        self.start()
    }

    /// Dial `address` on behalf of `peer`.
    ///
    /// The returned handle is already bound to the peer. Connect failures
    /// surface later through [`Peer::on_disconnected`].
    ///
    /// # Errors
    ///
    /// [`TransportError::NotRunning`] unless running,
    /// [`TransportError::Closed`] if the reactor has exited.
    pub fn open(
        &self,
        peer: Arc<dyn Peer>,
        address: &str,
    ) -> Result<ConnectionHandle, TransportError> {
        let (notifier, link) = {
            let running = lock(&self.running);
            let running = running.as_ref().ok_or(TransportError::NotRunning)?;
            (Arc::clone(&running.notifier), Arc::clone(&running.link))
        };
        if self.state() != NetworkState::Running {
            return Err(TransportError::NotRunning);
        }

        let resolved = make_socket_address(Some(address), DEFAULT_CONNECT_HOST, DEFAULT_PORT, false)
            .map_err(|e| e.to_string());
        let name = resolved.as_ref().ok().map(outbound_name);

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let connection = Connection::outgoing(
            id,
            name,
            address,
            Arc::clone(&peer),
            link,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );
        let handle = connection.handle();
        peer.set_connection(handle.clone());
        notifier.send(Command::Open {
            connection,
            address: resolved,
        })?;
        Ok(handle)
    }

    /// Ban remote addresses matching `pattern`. Returns `false` if the
    /// pattern is already listed.
    ///
    /// # Errors
    ///
    /// [`TransportError::InvalidPattern`] if `pattern` does not compile.
    pub fn add_banned_address(&self, pattern: &str) -> Result<bool, TransportError> {
        let added = self.bans.add(pattern)?;
        if added {
            lock(&self.config)
                .banned_addresses
                .push(pattern.to_string());
        }
        Ok(added)
    }

    /// Lift a ban. Returns `false` if the pattern was not listed.
    pub fn remove_banned_address(&self, pattern: &str) -> bool {
        let removed = self.bans.remove(pattern);
        if removed {
            lock(&self.config).banned_addresses.retain(|p| p != pattern);
        }
        removed
    }

    /// Lift every ban.
    pub fn remove_all_banned_addresses(&self) {
        self.bans.clear();
        lock(&self.config).banned_addresses.clear();
    }

    /// Listed ban patterns.
    #[must_use]
    pub fn banned_addresses(&self) -> Vec<String> {
        self.bans.patterns()
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .field("plugin_version", &self.plugin_version)
            .finish_non_exhaustive()
    }
}

fn bind_listener(addr: SocketAddr) -> Result<TcpListener, TransportError> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(TcpListener::from_std(socket.into()))
}

#[allow(clippy::cast_possible_truncation)]
fn token(id: ConnectionId) -> Token {
    Token(id.as_u64() as usize)
}

struct Entry {
    connection: Connection,
    stream: TcpStream,
    connected: bool,
    writable: bool,
}

enum FlushOutcome {
    Idle,
    Pending,
    Drained,
    Failed(io::Error),
}

struct Reactor {
    poll: Poll,
    listener: Option<TcpListener>,
    commands: Receiver<Command>,
    notifier: Arc<dyn Notifier>,
    link: Arc<LinkContext>,
    bans: Arc<BanList>,
    state: StateCell,
    next_id: Arc<AtomicU64>,
    entries: HashMap<ConnectionId, Entry>,
    closing: HashSet<ConnectionId>,
    opening: Vec<(Connection, Result<SocketAddr, String>)>,
    read_buffer: Vec<u8>,
    select_interval: Duration,
    stop_timeout: Duration,
    stop_deadline: Option<Instant>,
}

impl Reactor {
    fn run(mut self) {
        debug!("network reactor started");
        let mut events = Events::with_capacity(EVENT_CAPACITY);

        loop {
            self.drain_commands();

            if self.state.get() == NetworkState::Stop {
                self.begin_stopping();
            }

            self.reap_closing();

            if self.state.get() == NetworkState::Stopping {
                if self.entries.is_empty() {
                    break;
                }
                if self.stop_expired(Instant::now()) {
                    warn!(
                        "{} connection(s) did not flush within {:?}, closing them",
                        self.entries.len(),
                        self.stop_timeout
                    );
                    break;
                }
            }

            if self.state.get() == NetworkState::Running {
                self.open_pending();
                for peer in self.link.registry.peers() {
                    peer.send_keep_alive();
                    peer.check_keep_alive_timeout();
                }
            }

            let now = Instant::now();
            for entry in self.entries.values_mut() {
                entry.connection.check_handshake_timeout(now);
            }

            let timeout = self.poll_timeout(now);
            if let Err(e) = self.poll.poll(&mut events, Some(timeout)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!("network reactor poll failed: {}", e);
                break;
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept(),
                    WAKER => {}
                    token => self.ready(token, event),
                }
            }
        }

        self.shutdown();
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Open {
                    connection,
                    address,
                } => self.opening.push((connection, address)),
                Command::Write(id) => self.flush(id),
                Command::Close(id) => self.close(id),
                Command::Stop => {
                    if self.state.get() == NetworkState::Running {
                        self.state.set(NetworkState::Stop);
                    }
                }
            }
        }
    }

    fn begin_stopping(&mut self) {
        self.state.set(NetworkState::Stopping);
        self.stop_deadline = Instant::now().checked_add(self.stop_timeout);

        if let Some(mut listener) = self.listener.take() {
            if let Err(e) = self.poll.registry().deregister(&mut listener) {
                debug!("failed to deregister listener: {}", e);
            }
            info!("network manager stopped listening");
        }

        for (mut connection, _) in self.opening.drain(..) {
            connection.on_closed();
        }

        let ids: Vec<ConnectionId> = self.entries.keys().copied().collect();
        for id in ids {
            self.closing.insert(id);
            self.flush(id);
        }
    }

    fn reap_closing(&mut self) {
        let ready: Vec<ConnectionId> = self
            .closing
            .iter()
            .copied()
            .filter(|id| {
                self.entries
                    .get(id)
                    .is_none_or(|entry| !entry.connected || !entry.connection.has_write_data())
            })
            .collect();
        for id in ready {
            self.kill(id);
        }
    }

    fn stop_expired(&self, now: Instant) -> bool {
        self.stop_deadline.is_some_and(|deadline| now >= deadline)
    }

    fn poll_timeout(&self, now: Instant) -> Duration {
        self.entries
            .values()
            .filter_map(|entry| entry.connection.handshake_deadline())
            .chain(self.stop_deadline)
            .map(|deadline| deadline.saturating_duration_since(now))
            .fold(self.select_interval, Duration::min)
    }

    fn next_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn close(&mut self, id: ConnectionId) {
        if let Some(pos) = self.opening.iter().position(|(c, _)| c.id() == id) {
            let (mut connection, _) = self.opening.remove(pos);
            connection.on_closed();
            return;
        }
        if self.entries.contains_key(&id) {
            self.closing.insert(id);
            self.flush(id);
        }
    }

    /// Remove a connection from the reactor and report it closed.
    fn kill(&mut self, id: ConnectionId) {
        self.closing.remove(&id);
        if let Some(mut entry) = self.entries.remove(&id) {
            if let Err(e) = self.poll.registry().deregister(&mut entry.stream) {
                trace!("failed to deregister {}: {}", entry.connection, e);
            }
            drop(entry.stream);
            entry.connection.on_closed();
        }
    }

    fn open_pending(&mut self) {
        for (mut connection, address) in std::mem::take(&mut self.opening) {
            if connection.state() == ConnectionState::Closed {
                connection.on_closed();
                continue;
            }

            let stream = address
                .map_err(|msg| io::Error::new(io::ErrorKind::InvalidInput, msg))
                .and_then(TcpStream::connect)
                .and_then(|mut stream| {
                    self.poll.registry().register(
                        &mut stream,
                        token(connection.id()),
                        Interest::READABLE | Interest::WRITABLE,
                    )?;
                    Ok(stream)
                });

            match stream {
                Ok(stream) => {
                    debug!("connecting to {}", connection);
                    self.entries.insert(
                        connection.id(),
                        Entry {
                            connection,
                            stream,
                            connected: false,
                            writable: true,
                        },
                    );
                }
                Err(e) => {
                    connection.on_exception(&e);
                    connection.on_closed();
                }
            }
        }
    }

    fn accept(&mut self) {
        loop {
            let Some(listener) = self.listener.as_ref() else {
                return;
            };
            match listener.accept() {
                Ok((mut stream, remote)) => {
                    if self.bans.is_banned(&remote.ip()) {
                        info!("rejected connection from banned address '{}'", remote.ip());
                        continue;
                    }
                    let id = self.next_id();
                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, token(id), Interest::READABLE)
                    {
                        error!("failed to register connection from {}: {}", remote, e);
                        continue;
                    }
                    let mut connection = Connection::incoming(
                        id,
                        Some(inbound_name(&remote)),
                        Arc::clone(&self.link),
                        Arc::clone(&self.notifier),
                    );
                    connection.on_accepted();
                    self.entries.insert(
                        id,
                        Entry {
                            connection,
                            stream,
                            connected: true,
                            writable: false,
                        },
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                    return;
                }
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn ready(&mut self, token: Token, event: &Event) {
        let id = ConnectionId::new(token.0 as u64);
        let Some(entry) = self.entries.get(&id) else {
            return;
        };

        if !entry.connected {
            self.finish_connect(id);
            return;
        }

        if event.is_readable() || event.is_read_closed() || event.is_error() {
            self.read(id);
        }
        if event.is_writable() {
            self.flush(id);
        }
    }

    fn finish_connect(&mut self, id: ConnectionId) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };

        let status = match entry.stream.take_error() {
            Ok(Some(e)) | Err(e) => Err(e),
            Ok(None) => match entry.stream.peer_addr() {
                Ok(_) => Ok(true),
                Err(e)
                    if e.kind() == io::ErrorKind::NotConnected
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    Ok(false)
                }
                Err(e) => Err(e),
            },
        };

        match status {
            Ok(false) => {}
            Ok(true) => {
                entry.connected = true;
                debug!("connected to {}", entry.connection);
                entry.connection.on_opened();
                self.read(id);
                self.flush(id);
            }
            Err(e) => {
                entry.connection.on_exception(&e);
                self.kill(id);
            }
        }
    }

    fn read(&mut self, id: ConnectionId) {
        loop {
            let Some(entry) = self.entries.get_mut(&id) else {
                return;
            };
            match entry.stream.read(&mut self.read_buffer) {
                Ok(0) => {
                    debug!("connection {} closed by remote", entry.connection);
                    self.kill(id);
                    return;
                }
                Ok(n) => {
                    trace!("read {} bytes from {}", n, entry.connection);
                    entry.connection.on_read_data(&self.read_buffer[..n]);
                    if entry.connection.state() == ConnectionState::Closed {
                        return;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    entry.connection.on_exception(&e);
                    self.kill(id);
                    return;
                }
            }
        }
    }

    /// Write queued frames until the socket would block.
    fn flush(&mut self, id: ConnectionId) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if !entry.connected {
            return;
        }

        let outcome = match write_queued(&mut entry.stream, &entry.connection) {
            Err(e) => FlushOutcome::Failed(e),
            Ok(()) if entry.connection.has_write_data() => FlushOutcome::Pending,
            Ok(()) if self.closing.contains(&id) => FlushOutcome::Drained,
            Ok(()) => FlushOutcome::Idle,
        };

        let want_writable = match outcome {
            FlushOutcome::Failed(e) => {
                entry.connection.on_exception(&e);
                self.kill(id);
                return;
            }
            FlushOutcome::Drained => {
                self.kill(id);
                return;
            }
            FlushOutcome::Pending => true,
            FlushOutcome::Idle => false,
        };

        if entry.writable != want_writable {
            let interest = if want_writable {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::READABLE
            };
            match self
                .poll
                .registry()
                .reregister(&mut entry.stream, token(id), interest)
            {
                Ok(()) => entry.writable = want_writable,
                Err(e) => {
                    entry.connection.on_exception(&e);
                    self.kill(id);
                }
            }
        }
    }

    fn shutdown(&mut self) {
        let ids: Vec<ConnectionId> = self.entries.keys().copied().collect();
        for id in ids {
            self.kill(id);
        }
        for (mut connection, _) in self.opening.drain(..) {
            connection.on_closed();
        }
        self.listener = None;
        self.state.set(NetworkState::Stopped);
        info!("network reactor shutting down");
    }
}

fn write_queued(stream: &mut TcpStream, connection: &Connection) -> io::Result<()> {
    while let Some(mut data) = connection.pop_write_data() {
        let mut written = 0;
        while written < data.len() {
            match stream.write(&data[written..]) {
                Ok(0) => {
                    data.drain(..written);
                    connection.push_front_write_data(data);
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "socket accepted no data",
                    ));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    data.drain(..written);
                    connection.push_front_write_data(data);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        trace!("wrote {} bytes to {}", written, connection);
    }
    Ok(())
}
