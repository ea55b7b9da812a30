//! Integration tests for gatelink
//!
//! Every test runs two real reactors on loopback.

use gatelink_core::{
    ConnectionError, ConnectionState, Message, PROTOCOL_TIMEOUT, Peer, ResultError,
};
use gatelink_crypto::SharedKey;
use gatelink_integration_tests::fixtures::{TwoNodeFixture, wait_until};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_handshake_establishes_both_sides() {
    let fixture = TwoNodeFixture::new();
    let link = fixture.dial().unwrap();
    assert!(fixture.wait_established());

    assert_eq!(fixture.bravo_peer.remote_version().as_deref(), Some("bravo-1.0"));
    assert_eq!(fixture.alpha_peer.remote_version().as_deref(), Some("alpha-1.0"));
    assert!(link.is_open());
    assert!(!link.is_incoming());

    let bravo_addr = fixture.bravo.local_addr().unwrap();
    assert_eq!(link.name(), format!("127.0.0.1:{}", bravo_addr.port()));

    let inbound = fixture.alpha_peer.connection().unwrap();
    assert!(inbound.is_incoming());
    assert!(inbound.name().starts_with("127.0.0.1/"));
    assert_eq!(inbound.state(), ConnectionState::Established);

    fixture.stop();
}

#[test]
fn test_ping_request_round_trip() {
    let fixture = TwoNodeFixture::new();
    let link = fixture.dial().unwrap();
    assert!(fixture.wait_established());

    let response = link
        .request(
            Message::new().with("command", "ping").with("seq", 7),
            true,
            PROTOCOL_TIMEOUT,
        )
        .unwrap();
    assert_eq!(response.get_str("command"), Some("pong"));
    assert_eq!(response.get_int("seq"), Some(7));
    assert_eq!(link.pending_requests(), 0);
    assert!(link.last_message_received().is_some());

    fixture.stop();
}

#[test]
fn test_shared_secret_link_answers_ping() {
    let secret = SharedKey::new("secretA");
    assert_eq!(
        secret.digest_with(&secret),
        "5557b390cabdbae7fc7631e7239497cc3c2835cd"
    );

    let fixture = TwoNodeFixture::shared_secret("secretA");
    let link = fixture.dial().unwrap();
    assert!(fixture.wait_established());

    let response = link
        .request(Message::new().with("cmd", "ping"), true, PROTOCOL_TIMEOUT)
        .unwrap();
    assert_eq!(response.get_int("responseId"), Some(1));
    assert_eq!(response.get_bool("pong"), Some(true));
    assert_eq!(link.pending_requests(), 0);
    assert!(fixture.alpha_peer.messages().is_empty());

    fixture.stop();
}

#[test]
fn test_concurrent_requests_are_correlated() {
    let fixture = TwoNodeFixture::new();
    let link = fixture.dial().unwrap();
    assert!(fixture.wait_established());

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let link = link.clone();
            thread::spawn(move || {
                (0..10)
                    .map(|i| {
                        let seq = worker * 100 + i;
                        let response = link
                            .request(
                                Message::new().with("command", "ping").with("seq", seq),
                                true,
                                PROTOCOL_TIMEOUT,
                            )
                            .unwrap();
                        assert_eq!(response.get_int("seq"), Some(seq));
                        seq
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for worker in workers {
        seen.extend(worker.join().unwrap());
    }
    assert_eq!(seen.len(), 40);

    fixture.stop();
}

#[test]
fn test_notification_reaches_peer() {
    let fixture = TwoNodeFixture::new();
    let link = fixture.dial().unwrap();
    assert!(fixture.wait_established());

    link.send_message(
        &Message::new()
            .with("command", "chat")
            .with("text", "hello: world"),
        true,
    )
    .unwrap();

    assert!(wait_until(WAIT, || !fixture.alpha_peer.messages().is_empty()));
    let received = &fixture.alpha_peer.messages()[0];
    assert_eq!(received.get_str("text"), Some("hello: world"));

    fixture.stop();
}

#[test]
fn test_unencrypted_message_is_accepted() {
    let fixture = TwoNodeFixture::new();
    let link = fixture.dial().unwrap();
    assert!(fixture.wait_established());

    link.send_message(&Message::new().with("command", "plain"), false)
        .unwrap();
    assert!(wait_until(WAIT, || !fixture.alpha_peer.messages().is_empty()));

    fixture.stop();
}

#[test]
fn test_key_mismatch_rejected() {
    let fixture = TwoNodeFixture::with_keys("wrong-key", "alpha-key", |_| {});
    fixture.dial().unwrap();

    assert!(wait_until(WAIT, || fixture.bravo_peer.disconnects() == 1));
    assert!(!fixture.bravo_peer.is_connected());
    assert!(!fixture.alpha_peer.is_connected());
    assert!(fixture.alpha_peer.connection().is_none());

    fixture.stop();
}

#[test]
fn test_disabled_peer_rejected() {
    let fixture = TwoNodeFixture::new();
    fixture.alpha_peer.set_enabled(false);
    fixture.dial().unwrap();

    assert!(wait_until(WAIT, || fixture.bravo_peer.disconnects() == 1));
    assert!(!fixture.bravo_peer.is_connected());
    assert!(!fixture.alpha_peer.is_connected());

    fixture.stop();
}

#[test]
fn test_banned_address_rejected() {
    let fixture = TwoNodeFixture::with_keys("bravo-key", "alpha-key", |config| {
        config.banned_addresses = vec![r"127\.0\.0\..*".into()];
    });
    fixture.dial().unwrap();

    assert!(wait_until(WAIT, || fixture.bravo_peer.disconnects() == 1));
    assert!(fixture.alpha_peer.connection().is_none());

    fixture.stop();
}

#[test]
fn test_connect_refused_reports_disconnect() {
    let fixture = TwoNodeFixture::new();
    let port = fixture.bravo.local_addr().unwrap().port();
    fixture.bravo.stop().unwrap();

    let handle = fixture
        .alpha
        .open(
            Arc::clone(&fixture.bravo_peer) as Arc<dyn Peer>,
            &format!("127.0.0.1:{port}"),
        )
        .unwrap();

    assert!(wait_until(WAIT, || fixture.bravo_peer.disconnects() == 1));
    assert_eq!(handle.state(), ConnectionState::Closed);

    fixture.stop();
}

#[test]
fn test_request_timeout_forgets_entry() {
    let fixture = TwoNodeFixture::new();
    let link = fixture.dial().unwrap();
    assert!(fixture.wait_established());

    // Anything but ping is recorded without a reply
    let err = link
        .request(
            Message::new().with("command", "sink"),
            true,
            Duration::from_millis(200),
        )
        .unwrap_err();
    assert!(matches!(err, ConnectionError::Result(ResultError::Timeout)));
    assert_eq!(link.pending_requests(), 0);

    fixture.stop();
}

#[test]
fn test_stop_cancels_pending_requests() {
    let fixture = TwoNodeFixture::new();
    let link = fixture.dial().unwrap();
    assert!(fixture.wait_established());

    let pending = link
        .send_request(Message::new().with("command", "sink"), true)
        .unwrap();
    assert!(pending.is_waiting());

    fixture.alpha.stop().unwrap();
    assert_eq!(pending.get(), Err(ResultError::Cancelled));
    assert_eq!(link.state(), ConnectionState::Closed);
    assert!(matches!(
        link.send_message(&Message::new(), false),
        Err(ConnectionError::Closed)
    ));

    // Bravo sees the remote close
    assert!(wait_until(WAIT, || fixture.alpha_peer.disconnects() == 1));

    fixture.stop();
}

#[test]
fn test_second_dial_while_connected_is_rejected() {
    let fixture = TwoNodeFixture::new();
    let first = fixture.dial().unwrap();
    assert!(fixture.wait_established());

    // A second link for an already-linked peer is closed by the listener
    let address = fixture.bravo.local_addr().unwrap();
    let second_peer = gatelink_integration_tests::fixtures::LinkPeer::new("bravo", "bravo-key");
    let second = fixture
        .alpha
        .open(Arc::clone(&second_peer) as Arc<dyn Peer>, &address.to_string())
        .unwrap();

    assert!(wait_until(WAIT, || second_peer.disconnects() == 1));
    assert_eq!(second.state(), ConnectionState::Closed);
    assert!(first.is_open());

    fixture.stop();
}
