//! Peer connection state machine.
//!
//! A connection is split in two halves:
//!
//! - [`Connection`] is owned by the reactor thread. It holds the read-side
//!   frame assembler and runs the handshake and dispatch logic. Nothing in it
//!   is synchronized.
//! - [`ConnectionHandle`] is a cheap, cloneable view that any thread may use
//!   to send messages, issue requests and request a close. It shares only the
//!   outbound write queue, the pending-request map, timestamps and the state
//!   word with the reactor half.
//!
//! The handle never touches the socket. It queues frame bytes and asks the
//! reactor to service the connection through a [`Notifier`].
//!
//! ## States
//!
//! ```text
//! None -> Handshake -> Handshaking -> Established -> Closed
//!   \__________\____________\_______________________/
//!                 (Closed is reachable from any state)
//! ```

use crate::codec::WireCodec;
use crate::error::ConnectionError;
use crate::frame::{FrameAssembler, FrameFlags, RawFrame, encode_frame, hex_excerpt};
use crate::message::{Message, keys};
use crate::peer::{Peer, PeerRegistry};
use crate::result::PendingResult;
use crate::{CIPHER_PAD_SIZE, PROTOCOL_VERSION, lock};
use dashmap::DashMap;
use gatelink_crypto::{Cipher, SharedKey};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Name reported for a connection with no known remote address.
pub const UNNAMED_CONNECTION: &str = "(not connected)";

/// Reactor-assigned connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw `u64` value
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Constructed, socket not open yet
    None = 0,
    /// Socket open, waiting for the first handshake message
    Handshake = 1,
    /// First handshake message received and being validated
    Handshaking = 2,
    /// Handshake complete, application traffic flows
    Established = 3,
    /// Terminal
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Handshake,
            2 => Self::Handshaking,
            3 => Self::Established,
            _ => Self::Closed,
        }
    }

    /// Check if a transition from `self` to `to` is legal
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (_, Self::Closed)
                | (Self::None, Self::Handshake)
                | (Self::Handshake, Self::Handshaking)
                | (Self::Handshaking, Self::Established)
        )
    }

    /// True while the handshake has not finished.
    #[must_use]
    pub fn is_handshaking(self) -> bool {
        matches!(self, Self::Handshake | Self::Handshaking)
    }
}

/// Wakes the reactor on behalf of a connection.
///
/// Implemented by the transport; calls may come from any thread.
pub trait Notifier: Send + Sync {
    /// The connection has queued bytes to write.
    fn want_write(&self, id: ConnectionId);

    /// The connection should be flushed and closed.
    fn want_close(&self, id: ConnectionId);
}

/// Settings shared by every connection of one network instance.
pub struct LinkContext {
    /// This node's shared key (decrypts inbound frames, salts handshakes)
    pub local_key: SharedKey,
    /// Software version sent in handshakes
    pub plugin_version: String,
    /// Configured peers, consulted by the inbound handshake
    pub registry: Arc<dyn PeerRegistry>,
    /// Message codec
    pub codec: Arc<dyn WireCodec>,
    /// Largest inbound frame payload accepted
    pub max_frame_size: usize,
    /// How long an accepted socket may stay silent before handshaking
    pub handshake_timeout: Duration,
}

impl fmt::Debug for LinkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkContext")
            .field("plugin_version", &self.plugin_version)
            .field("max_frame_size", &self.max_frame_size)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

struct Shared {
    id: ConnectionId,
    name: String,
    incoming: bool,
    connect_address: Option<String>,
    state: AtomicU8,
    link: Arc<LinkContext>,
    notifier: Arc<dyn Notifier>,
    peer: Mutex<Option<Arc<dyn Peer>>>,
    write_queue: Mutex<VecDeque<Vec<u8>>>,
    next_request_id: AtomicI32,
    pending: DashMap<i32, PendingResult>,
    last_sent: Mutex<Option<Instant>>,
    last_received: Mutex<Option<Instant>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn peer(&self) -> Option<Arc<dyn Peer>> {
        lock(&self.peer).clone()
    }
}

/// Thread-safe handle to a connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    /// Reactor-assigned id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Remote address label (`ip:port` outbound, `ip/port` inbound).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// True for accepted connections.
    #[must_use]
    pub fn is_incoming(&self) -> bool {
        self.shared.incoming
    }

    /// Address string an outbound connection was dialed with.
    #[must_use]
    pub fn connect_address(&self) -> Option<&str> {
        self.shared.connect_address.as_deref()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// True once the handshake completed and until the connection closes.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Established
    }

    /// Peer bound to this connection, if any.
    #[must_use]
    pub fn peer(&self) -> Option<Arc<dyn Peer>> {
        self.shared.peer()
    }

    /// When the last message was queued for sending.
    #[must_use]
    pub fn last_message_sent(&self) -> Option<Instant> {
        *lock(&self.shared.last_sent)
    }

    /// When the last message was received.
    #[must_use]
    pub fn last_message_received(&self) -> Option<Instant> {
        *lock(&self.shared.last_received)
    }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Ask the reactor to flush and close this connection. Idempotent.
    pub fn close(&self) {
        let previous = self
            .shared
            .state
            .swap(ConnectionState::Closed as u8, Ordering::AcqRel);
        if ConnectionState::from_u8(previous) == ConnectionState::Closed {
            return;
        }
        debug!(
            connection = %self.shared.name,
            "state transition: {:?} -> Closed",
            ConnectionState::from_u8(previous)
        );
        self.shared.notifier.want_close(self.shared.id);
    }

    /// Encode, optionally scramble, frame and queue `message`.
    ///
    /// Encrypted frames use the bound peer's key.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::Closed`] after close, [`ConnectionError::NoPeer`]
    /// for an encrypted send with no bound peer, or a frame/crypto error if
    /// the frame cannot be built.
    pub fn send_message(&self, message: &Message, encrypt: bool) -> Result<(), ConnectionError> {
        if self.state() == ConnectionState::Closed {
            return Err(ConnectionError::Closed);
        }

        let clear = self.shared.link.codec.encode(message).into_bytes();
        let (flags, payload) = if encrypt {
            let peer = self.peer().ok_or(ConnectionError::NoPeer)?;
            let mut cipher = Cipher::new(CIPHER_PAD_SIZE);
            let sealed = cipher.encrypt(peer.key().as_bytes(), &clear)?;
            (FrameFlags::new().with_encrypted(), sealed)
        } else {
            (FrameFlags::new(), clear)
        };

        let frame = match encode_frame(flags, &payload) {
            Ok(frame) => frame,
            Err(e) => {
                error!(
                    connection = %self.shared.name,
                    encrypt,
                    clear_len = payload.len(),
                    error = %e,
                    "invalid message encoding"
                );
                return Err(e.into());
            }
        };

        trace!(connection = %self.shared.name, bytes = frame.len(), "queued frame");
        lock(&self.shared.write_queue).push_back(frame);
        *lock(&self.shared.last_sent) = Some(Instant::now());
        self.shared.notifier.want_write(self.shared.id);
        Ok(())
    }

    /// Send `message` as a request and return its pending result.
    ///
    /// A fresh `requestId` is assigned and the result is registered before
    /// the frame is queued, so a fast response cannot be missed.
    ///
    /// # Errors
    ///
    /// Same as [`ConnectionHandle::send_message`]; the registration is
    /// removed on failure.
    pub fn send_request(
        &self,
        mut message: Message,
        encrypt: bool,
    ) -> Result<PendingResult, ConnectionError> {
        let request_id = self.shared.next_request_id.fetch_add(1, Ordering::Relaxed);
        message.insert(keys::REQUEST_ID, request_id);

        let result = PendingResult::new(request_id);
        self.shared.pending.insert(request_id, result.clone());

        if let Err(e) = self.send_message(&message, encrypt) {
            self.shared.pending.remove(&request_id);
            return Err(e);
        }
        Ok(result)
    }

    /// Send a request and block for its response for at most `timeout`.
    ///
    /// On timeout the pending entry is removed.
    ///
    /// # Errors
    ///
    /// Send errors, or [`ConnectionError::Result`] on timeout/cancellation.
    pub fn request(
        &self,
        message: Message,
        encrypt: bool,
        timeout: Duration,
    ) -> Result<Message, ConnectionError> {
        let result = self.send_request(message, encrypt)?;
        result.get_timeout(timeout).map_err(|e| {
            self.forget_request(result.request_id());
            e.into()
        })
    }

    /// Drop the pending entry for `request_id`, if any.
    pub fn forget_request(&self, request_id: i32) -> Option<PendingResult> {
        self.shared.pending.remove(&request_id).map(|(_, r)| r)
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shared.name)
    }
}

/// Reactor-side connection.
pub struct Connection {
    shared: Arc<Shared>,
    assembler: FrameAssembler,
    handshake_deadline: Option<Instant>,
    closed_notified: bool,
}

impl Connection {
    fn build(
        id: ConnectionId,
        name: Option<String>,
        incoming: bool,
        connect_address: Option<String>,
        peer: Option<Arc<dyn Peer>>,
        link: Arc<LinkContext>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let max_frame_size = link.max_frame_size;
        Self {
            shared: Arc::new(Shared {
                id,
                name: name.unwrap_or_else(|| UNNAMED_CONNECTION.to_string()),
                incoming,
                connect_address,
                state: AtomicU8::new(ConnectionState::None as u8),
                link,
                notifier,
                peer: Mutex::new(peer),
                write_queue: Mutex::new(VecDeque::new()),
                next_request_id: AtomicI32::new(1),
                pending: DashMap::new(),
                last_sent: Mutex::new(None),
                last_received: Mutex::new(None),
            }),
            assembler: FrameAssembler::new(max_frame_size),
            handshake_deadline: None,
            closed_notified: false,
        }
    }

    /// Connection we dial to `peer`.
    ///
    /// `name` is the resolved `ip:port`, or `None` if it did not resolve.
    #[must_use]
    pub fn outgoing(
        id: ConnectionId,
        name: Option<String>,
        connect_address: impl Into<String>,
        peer: Arc<dyn Peer>,
        link: Arc<LinkContext>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::build(
            id,
            name,
            false,
            Some(connect_address.into()),
            Some(peer),
            link,
            notifier,
        )
    }

    /// Connection accepted from `name` (`ip/port`).
    #[must_use]
    pub fn incoming(
        id: ConnectionId,
        name: Option<String>,
        link: Arc<LinkContext>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::build(id, name, true, None, None, link, notifier)
    }

    /// A handle sharing this connection's state.
    #[must_use]
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Reactor-assigned id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Remote address label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Address string for an outbound connection.
    #[must_use]
    pub fn connect_address(&self) -> Option<&str> {
        self.shared.connect_address.as_deref()
    }

    /// Deadline by which an accepted connection must handshake.
    #[must_use]
    pub fn handshake_deadline(&self) -> Option<Instant> {
        self.handshake_deadline
    }

    fn transition_to(&self, to: ConnectionState) -> bool {
        let from = self.state();
        if !from.can_transition(to) {
            return false;
        }
        // A concurrent close from a handle wins
        if self
            .shared
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        debug!(connection = %self.shared.name, "state transition: {:?} -> {:?}", from, to);
        true
    }

    fn close(&self) {
        self.handle().close();
    }

    fn suppressed(&self) -> bool {
        self.shared
            .peer()
            .is_some_and(|peer| peer.connection_messages_suppressed())
    }

    fn send(&self, message: &Message) {
        if let Err(e) = self.handle().send_message(message, false) {
            debug!(connection = %self.shared.name, error = %e, "dropped handshake message");
        }
    }

    fn handshake_message(&self) -> Message {
        Message::new()
            .with(keys::PROTOCOL_VERSION, PROTOCOL_VERSION)
            .with(keys::PLUGIN_VERSION, self.shared.link.plugin_version.as_str())
    }

    // ------------------------------------------------------------------
    // Reactor callbacks
    // ------------------------------------------------------------------

    /// Outbound socket connected; send our handshake.
    pub fn on_opened(&mut self) {
        if !self.transition_to(ConnectionState::Handshake) {
            return;
        }
        let Some(peer) = self.shared.peer() else {
            warn!(connection = %self.shared.name, "outbound connection has no peer");
            self.close();
            return;
        };
        let key = self.shared.link.local_key.digest_with(peer.key());
        self.send(&self.handshake_message().with(keys::KEY, key));
    }

    /// Inbound socket accepted; arm the handshake timeout.
    pub fn on_accepted(&mut self) {
        info!("accepted a connection from {}", self.shared.name);
        if self.transition_to(ConnectionState::Handshake) {
            // A timeout past the end of the clock leaves the handshake unbounded
            self.handshake_deadline =
                Instant::now().checked_add(self.shared.link.handshake_timeout);
        }
    }

    /// Close an accepted connection whose handshake deadline passed.
    pub fn check_handshake_timeout(&mut self, now: Instant) {
        let Some(deadline) = self.handshake_deadline else {
            return;
        };
        if now < deadline {
            return;
        }
        self.handshake_deadline = None;
        if self.state() == ConnectionState::Handshake {
            warn!(
                "closing connection from {} because no handshake was received",
                self.shared.name
            );
            self.close();
        }
    }

    /// Socket-level failure.
    pub fn on_exception(&mut self, err: &io::Error) {
        let routine = matches!(
            err.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::TimedOut
                | io::ErrorKind::HostUnreachable
                | io::ErrorKind::NetworkUnreachable
        );
        if routine {
            if !self.suppressed() {
                warn!("connection exception with {}: {}", self.shared.name, err);
            }
        } else {
            error!("connection exception with {}: {}", self.shared.name, err);
        }
        self.close();
    }

    /// Bytes read from the socket.
    pub fn on_read_data(&mut self, data: &[u8]) {
        if self.state() == ConnectionState::Closed {
            return;
        }
        self.assembler.push(data);

        loop {
            let frame = match self.assembler.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        "received invalid message length from {}: {}",
                        self.shared.name, e
                    );
                    self.close();
                    return;
                }
            };

            match self.decode_frame(&frame) {
                Ok(message) => self.on_message(message),
                Err(e) => {
                    error!("exception while processing message from {}: {}", self.shared.name, e);
                    self.close();
                    return;
                }
            }

            if self.state() == ConnectionState::Closed {
                return;
            }
        }
    }

    fn decode_frame(&self, frame: &RawFrame) -> Result<Message, ConnectionError> {
        let clear = if frame.flags.is_encrypted() {
            let mut cipher = Cipher::new(CIPHER_PAD_SIZE);
            cipher.decrypt(self.shared.link.local_key.as_bytes(), &frame.payload)?
        } else {
            frame.payload.clone()
        };

        let decoded = if clear.is_empty() {
            Err(ConnectionError::Undecryptable)
        } else {
            std::str::from_utf8(&clear)
                .map_err(|_| ConnectionError::InvalidUtf8)
                .and_then(|text| self.shared.link.codec.decode(text).map_err(Into::into))
        };

        if let Err(e) = &decoded {
            let raw = &frame.payload;
            let pending = self.assembler.pending();
            error!(
                connection = %self.shared.name,
                error = %e,
                flags = frame.flags.as_u8(),
                declared_len = frame.declared_len,
                payload_len = raw.len(),
                clear_len = clear.len(),
                buffered = pending.len(),
                raw_head = %hex_excerpt(raw, 0, 16),
                raw_tail = %hex_excerpt(raw, raw.len().saturating_sub(16), 16),
                clear_head = %hex_excerpt(&clear, 0, 16),
                clear_tail = %hex_excerpt(&clear, clear.len().saturating_sub(16), 16),
                next = %hex_excerpt(pending, 0, 16),
                "undecodable frame, dumping debug state"
            );
        }
        decoded
    }

    fn on_message(&mut self, message: Message) {
        *lock(&self.shared.last_received) = Some(Instant::now());
        match self.state() {
            ConnectionState::Handshake => self.on_handshake(message),
            ConnectionState::Established => self.on_established(message),
            state => trace!(connection = %self.shared.name, ?state, "ignored message"),
        }
    }

    fn reject(&self, reason: fmt::Arguments<'_>) {
        if !self.suppressed() {
            warn!("{}", reason);
        }
        self.close();
    }

    fn on_handshake(&mut self, message: Message) {
        self.transition_to(ConnectionState::Handshaking);
        self.handshake_deadline = None;
        let name = &self.shared.name;

        if let Some(error) = message.get_str(keys::ERROR) {
            return self.reject(format_args!("received handshake error with '{name}': {error}"));
        }
        if !message.contains_key(keys::PROTOCOL_VERSION) {
            return self.reject(format_args!("expected protocolVersion on connection with '{name}'"));
        }
        let protocol = message.get_int(keys::PROTOCOL_VERSION).unwrap_or(0);
        if protocol != PROTOCOL_VERSION {
            return self.reject(format_args!(
                "protocol version mismatch on connection with '{name}', wanted '{PROTOCOL_VERSION}', got '{protocol}'"
            ));
        }
        let Some(version) = message.get_str(keys::PLUGIN_VERSION) else {
            return self.reject(format_args!("expected pluginVersion on connection with '{name}'"));
        };

        if self.shared.incoming {
            self.on_listener_handshake(&message, version);
        } else {
            self.transition_to(ConnectionState::Established);
            if let Some(peer) = self.shared.peer() {
                peer.on_connected(version);
            }
        }
    }

    fn on_listener_handshake(&self, message: &Message, version: &str) {
        let name = &self.shared.name;
        let Some(key) = message.get_str(keys::KEY) else {
            return self.reject(format_args!("no server key detected on connection with {name}"));
        };

        let link = &self.shared.link;
        let Some(peer) = link.registry.find_peer_by_key(key, &link.local_key) else {
            warn!("unknown key detected on connection with {name}");
            self.send(&Message::new().with(keys::ERROR, "unknown key"));
            self.close();
            return;
        };

        info!(
            "server key match detected for '{}' on connection with {}",
            peer.name(),
            name
        );

        if !peer.is_enabled() {
            info!("server '{}' is disabled", peer.name());
            self.send(&Message::new().with(keys::ERROR, "server is disabled"));
            self.close();
            return;
        }
        if peer.is_connection_connected() {
            warn!("server '{}' is already connected", peer.name());
            self.close();
            return;
        }
        if peer.is_connecting() {
            peer.abandon_connect();
        }

        *lock(&self.shared.peer) = Some(Arc::clone(&peer));
        peer.set_connection(self.handle());
        self.transition_to(ConnectionState::Established);
        self.send(&self.handshake_message());
        peer.on_connected(version);
    }

    fn on_established(&mut self, message: Message) {
        let Some(peer) = self.shared.peer() else {
            self.close();
            return;
        };

        let owned = peer
            .connection()
            .is_some_and(|current| current.id() == self.shared.id);
        if !owned {
            warn!(
                "connection '{}' has been disowned by server '{}'",
                self.shared.name,
                peer.name()
            );
            *lock(&self.shared.peer) = None;
            self.close();
            return;
        }

        if !message.contains_key(keys::RESPONSE_ID) {
            peer.on_message(message);
            return;
        }

        let Some(response_id) = message.get_int(keys::RESPONSE_ID) else {
            warn!("received malformed responseId from {}", self.shared.name);
            return;
        };
        match self.shared.pending.remove(&response_id) {
            Some((_, result)) => {
                result.set_result(message);
            }
            None => warn!(
                "received response to unknown request {} from {}",
                response_id, self.shared.name
            ),
        }
    }

    /// Socket is gone; notify the peer and wake every blocked requester.
    /// Runs at most once.
    pub fn on_closed(&mut self) {
        if self.closed_notified {
            return;
        }
        self.closed_notified = true;

        let previous = ConnectionState::from_u8(
            self.shared
                .state
                .swap(ConnectionState::Closed as u8, Ordering::AcqRel),
        );

        self.shared.pending.retain(|_, result| {
            result.cancel();
            false
        });

        match self.shared.peer() {
            Some(peer) => {
                if previous.is_handshaking() {
                    warn!("connection with {} was unexpectedly closed", self.shared.name);
                }
                peer.on_disconnected();
            }
            None => info!("closed connection with {}", self.shared.name),
        }
    }

    // ------------------------------------------------------------------
    // Write queue (reactor side)
    // ------------------------------------------------------------------

    /// True if frame bytes are waiting to be written.
    #[must_use]
    pub fn has_write_data(&self) -> bool {
        !lock(&self.shared.write_queue).is_empty()
    }

    /// Take the next buffer to write.
    pub fn pop_write_data(&self) -> Option<Vec<u8>> {
        lock(&self.shared.write_queue).pop_front()
    }

    /// Return the unwritten tail of a partial write to the front of the queue.
    pub fn push_front_write_data(&self, data: Vec<u8>) {
        lock(&self.shared.write_queue).push_front(data);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("incoming", &self.shared.incoming)
            .field("state", &self.state())
            .field("buffered", &self.assembler.buffered())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shared.name)
    }
}
