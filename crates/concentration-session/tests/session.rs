//! Integration tests for the session: handshake, receive loop, close.
//!
//! Each test plays the server itself over a loopback socket, writing a
//! script of records and reading back what the client sends.

use std::time::Duration;

use concentration_board::{CardUpdate, GameStatus, ObserverRegistry};
use concentration_protocol::{ClientCommand, DecodeError, MAX_DIMENSION, Position};
use concentration_session::{Session, SessionConfig, SessionError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

type Seen = mpsc::UnboundedReceiver<(Option<CardUpdate>, GameStatus)>;

fn config() -> SessionConfig {
    SessionConfig {
        connect_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_millis(200),
    }
}

fn pos(row: usize, col: usize) -> Position {
    Position::new(row, col)
}

fn reveal(row: usize, col: usize) -> ClientCommand {
    ClientCommand::Reveal {
        position: pos(row, col),
    }
}

/// Subscribes an observer that forwards every notification to a channel.
fn watch(registry: &ObserverRegistry) -> Seen {
    let (tx, rx) = mpsc::unbounded_channel();
    registry.subscribe_fn(move |model, card| {
        let _ = tx.send((card, model.status()));
    });
    rx
}

async fn next(seen: &mut Seen) -> (Option<CardUpdate>, GameStatus) {
    timeout(Duration::from_secs(2), seen.recv())
        .await
        .expect("notification should arrive")
        .expect("observer channel should be open")
}

/// Opens a session against a fake server that writes `handshake` as soon
/// as the client connects. Returns the session result and the server's
/// end of the socket.
async fn open(
    handshake: &'static str,
    observers: ObserverRegistry,
) -> (Result<Session, SessionError>, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("should accept");
        stream.write_all(handshake.as_bytes()).await.unwrap();
        stream
    });

    let session = Session::open("127.0.0.1", port, &config(), observers).await;
    let stream = server.await.expect("server task should complete");
    (session, stream)
}

/// Opens a session on a 4×4 board and splits the server's socket.
async fn ready(
    observers: ObserverRegistry,
) -> (Session, Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf) {
    let (session, stream) = open("BOARD_DIM 4\n", observers).await;
    let (read_half, write_half) = stream.into_split();
    (
        session.expect("handshake should succeed"),
        BufReader::new(read_half).lines(),
        write_half,
    )
}

async fn expect_eof(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("client should close the socket")
        .unwrap_or(0);
    assert_eq!(n, 0, "client should not send anything");
}

async fn closed(session: &Session) {
    timeout(Duration::from_secs(2), session.closed())
        .await
        .expect("receive loop should exit");
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_open_board_dim_creates_hidden_board() {
    let (session, _server) = open("BOARD_DIM 4\n", ObserverRegistry::new()).await;
    let session = session.expect("handshake should succeed");
    let model = session.model();

    assert_eq!(model.dimension(), 4);
    assert_eq!(model.status(), GameStatus::InProgress);
    assert_eq!((model.move_count(), model.match_count()), (0, 0));
    for row in 0..4 {
        for col in 0..4 {
            assert!(model.is_hidden(pos(row, col)).unwrap());
        }
    }
    assert!(!session.is_closed());
}

#[tokio::test]
async fn test_open_wrong_first_record_is_rejected_and_closed() {
    let (session, mut server) =
        open("REVEALED_CARD 0 0 A\n", ObserverRegistry::new()).await;

    match session {
        Err(SessionError::Handshake(reason)) => {
            assert!(reason.contains("REVEALED_CARD"), "{reason}");
        }
        other => panic!("expected Handshake error, got {other:?}"),
    }
    expect_eof(&mut server).await;
}

#[tokio::test]
async fn test_open_malformed_first_frame_is_decode_error() {
    let (session, _server) = open("HELLO 4\n", ObserverRegistry::new()).await;
    let err = session.expect_err("handshake should fail");
    assert!(matches!(err, SessionError::HandshakeDecode(_)));
    assert!(err.is_handshake());
}

#[tokio::test]
async fn test_open_zero_dimension_is_rejected() {
    let (session, _server) = open("BOARD_DIM 0\n", ObserverRegistry::new()).await;
    assert!(matches!(session, Err(SessionError::HandshakeDecode(_))));
}

#[tokio::test]
async fn test_open_oversized_dimension_is_rejected_and_closed() {
    let (session, mut server) =
        open("BOARD_DIM 4294967296\n", ObserverRegistry::new()).await;

    match session {
        Err(SessionError::HandshakeDecode(DecodeError::DimensionTooLarge {
            max, ..
        })) => assert_eq!(max, MAX_DIMENSION),
        other => panic!("expected DimensionTooLarge, got {other:?}"),
    }
    expect_eof(&mut server).await;
}

#[tokio::test]
async fn test_open_server_error_during_handshake_is_rejected() {
    let (session, _server) = open("ERROR full\n", ObserverRegistry::new()).await;
    match session {
        Err(SessionError::Handshake(reason)) => assert!(reason.contains("full")),
        other => panic!("expected Handshake error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_open_silent_server_times_out() {
    let (session, _server) = open("", ObserverRegistry::new()).await;
    assert!(matches!(session, Err(SessionError::HandshakeTimeout(_))));
}

#[tokio::test]
async fn test_open_server_hangs_up_before_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let result =
        Session::open("127.0.0.1", port, &config(), ObserverRegistry::new()).await;

    assert!(matches!(result, Err(SessionError::Handshake(_))));
}

#[tokio::test]
async fn test_open_refused_is_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result =
        Session::open("127.0.0.1", port, &config(), ObserverRegistry::new()).await;

    assert!(matches!(result, Err(SessionError::Connect(_))));
}

// =========================================================================
// Playing
// =========================================================================

#[tokio::test]
async fn test_matching_turn_round_trip() {
    let registry = ObserverRegistry::new();
    let mut seen = watch(&registry);
    let (session, mut from_client, mut to_client) = ready(registry).await;

    session.send(&reveal(0, 0)).await.unwrap();
    assert_eq!(from_client.next_line().await.unwrap().as_deref(), Some("REVEAL 0 0"));
    to_client.write_all(b"REVEALED_CARD 0 0 A\n").await.unwrap();
    assert_eq!(next(&mut seen).await.0, Some(CardUpdate::new(pos(0, 0))));

    session.send(&reveal(1, 1)).await.unwrap();
    assert_eq!(from_client.next_line().await.unwrap().as_deref(), Some("REVEAL 1 1"));
    to_client
        .write_all(b"REVEALED_CARD 1 1 A\nMATCH 0 0 1 1\n")
        .await
        .unwrap();

    assert_eq!(next(&mut seen).await.0, Some(CardUpdate::new(pos(1, 1))));
    assert_eq!(next(&mut seen).await, (None, GameStatus::InProgress));
    assert_eq!(next(&mut seen).await.0, Some(CardUpdate::new(pos(0, 0))));
    assert_eq!(next(&mut seen).await.0, Some(CardUpdate::new(pos(1, 1))));

    let model = session.model();
    assert!(model.is_matched(pos(0, 0)).unwrap());
    assert!(model.is_matched(pos(1, 1)).unwrap());
    assert_eq!(model.symbol_at(pos(1, 1)).unwrap().unwrap().as_str(), "A");
    assert_eq!((model.move_count(), model.match_count()), (1, 1));
}

#[tokio::test]
async fn test_reveals_are_acknowledged_in_order() {
    let registry = ObserverRegistry::new();
    let mut seen = watch(&registry);
    let (session, mut from_client, mut to_client) = ready(registry).await;

    let cells = [pos(0, 0), pos(2, 3), pos(3, 1)];
    for position in cells {
        session
            .send(&ClientCommand::Reveal { position })
            .await
            .unwrap();
    }

    // The server answers each request in the order it arrived.
    for position in cells {
        let line = from_client.next_line().await.unwrap().unwrap();
        assert_eq!(line, format!("REVEAL {} {}", position.row, position.col));
        let ack = format!("REVEALED_CARD {} {} S\n", position.row, position.col);
        to_client.write_all(ack.as_bytes()).await.unwrap();
    }

    for position in cells {
        assert_eq!(next(&mut seen).await.0, Some(CardUpdate::new(position)));
    }
}

#[tokio::test]
async fn test_game_lost_after_three_mismatches_ignores_later_events() {
    let registry = ObserverRegistry::new();
    let mut seen = watch(&registry);
    let (session, _from_client, mut to_client) = ready(registry).await;

    let script = "\
        REVEALED_CARD 0 0 A\nREVEALED_CARD 0 1 B\nMISMATCH 0 0 0 1\n\
        REVEALED_CARD 1 0 C\nREVEALED_CARD 1 1 D\nMISMATCH 1 0 1 1\n\
        REVEALED_CARD 2 0 E\nREVEALED_CARD 2 1 F\nMISMATCH 2 0 2 1\n\
        GAME_LOST\n\
        REVEALED_CARD 3 3 Z\n";
    to_client.write_all(script.as_bytes()).await.unwrap();
    drop(to_client);

    closed(&session).await;

    let model = session.model();
    assert_eq!(model.status(), GameStatus::Lost);
    assert_eq!((model.move_count(), model.match_count()), (3, 0));
    assert!(model.is_hidden(pos(3, 3)).unwrap());
    assert_eq!(model.error_message(), None);

    let mut last = None;
    while let Ok(item) = seen.try_recv() {
        last = Some(item);
    }
    assert_eq!(last, Some((None, GameStatus::Lost)));
}

#[tokio::test]
async fn test_game_won_keeps_matched_cards() {
    let (session, _from_client, mut to_client) = ready(ObserverRegistry::new()).await;
    to_client
        .write_all(b"REVEALED_CARD 0 0 X\nREVEALED_CARD 3 3 X\nMATCH 0 0 3 3\nGAME_WON\n")
        .await
        .unwrap();
    drop(to_client);

    closed(&session).await;
    let model = session.model();
    assert_eq!(model.status(), GameStatus::Won);
    assert!(model.is_matched(pos(3, 3)).unwrap());
}

// =========================================================================
// Failures inside the loop
// =========================================================================

#[tokio::test]
async fn test_server_hang_up_mid_game_is_error_with_final_notification() {
    let registry = ObserverRegistry::new();
    let mut seen = watch(&registry);
    let (session, from_client, mut to_client) = ready(registry).await;

    to_client.write_all(b"REVEALED_CARD 2 2 Q\n").await.unwrap();
    assert_eq!(next(&mut seen).await.0, Some(CardUpdate::new(pos(2, 2))));
    drop(to_client);
    drop(from_client);

    assert_eq!(next(&mut seen).await, (None, GameStatus::Error));
    closed(&session).await;
    assert!(session.is_closed());
    let message = session.model().error_message().unwrap();
    assert!(message.contains("closed by server"), "{message}");
}

#[tokio::test]
async fn test_panicking_observer_does_not_stop_receive_loop() {
    let registry = ObserverRegistry::new();
    registry.subscribe_fn(|_, _| panic!("observer bug"));
    let mut seen = watch(&registry);
    let (session, from_client, mut to_client) = ready(registry).await;

    to_client.write_all(b"REVEALED_CARD 0 0 A\n").await.unwrap();
    assert_eq!(next(&mut seen).await.0, Some(CardUpdate::new(pos(0, 0))));
    to_client.write_all(b"REVEALED_CARD 0 1 B\n").await.unwrap();
    assert_eq!(next(&mut seen).await.0, Some(CardUpdate::new(pos(0, 1))));
    assert!(!session.is_closed());
    assert_eq!(session.model().status(), GameStatus::InProgress);

    // The loop is still alive and notices the hang-up.
    drop(to_client);
    drop(from_client);
    assert_eq!(next(&mut seen).await, (None, GameStatus::Error));
    closed(&session).await;
}

#[tokio::test]
async fn test_malformed_frame_is_fatal() {
    let (session, mut from_client, mut to_client) = ready(ObserverRegistry::new()).await;

    to_client.write_all(b"REVEALED_CARD 0 zero A\n").await.unwrap();

    closed(&session).await;
    assert_eq!(session.model().status(), GameStatus::Error);
    assert!(session.model().error_message().unwrap().contains("malformed"));
    // The client hung up on us.
    assert_eq!(from_client.next_line().await.unwrap(), None);
}

#[tokio::test]
async fn test_out_of_bounds_position_is_fatal() {
    let (session, _from_client, mut to_client) = ready(ObserverRegistry::new()).await;

    to_client.write_all(b"REVEALED_CARD 4 0 A\n").await.unwrap();

    closed(&session).await;
    assert_eq!(session.model().status(), GameStatus::Error);
}

#[tokio::test]
async fn test_desynchronized_match_is_fatal() {
    let (session, _from_client, mut to_client) = ready(ObserverRegistry::new()).await;

    // Neither card was ever revealed.
    to_client.write_all(b"MATCH 0 0 0 1\n").await.unwrap();

    closed(&session).await;
    let model = session.model();
    assert_eq!(model.status(), GameStatus::Error);
    assert!(model.error_message().unwrap().contains("out of sync"));
    assert_eq!(model.match_count(), 0);
}

#[tokio::test]
async fn test_server_error_record_ends_session() {
    let registry = ObserverRegistry::new();
    let mut seen = watch(&registry);
    let (session, _from_client, mut to_client) = ready(registry).await;

    to_client.write_all(b"ERROR board exploded\n").await.unwrap();

    assert_eq!(next(&mut seen).await, (None, GameStatus::Error));
    closed(&session).await;
    assert_eq!(
        session.model().error_message().as_deref(),
        Some("board exploded")
    );
    assert!(matches!(
        session.send(&reveal(0, 0)).await,
        Err(SessionError::Closed)
    ));
}

// =========================================================================
// Close
// =========================================================================

#[tokio::test]
async fn test_close_cancels_blocked_receive_and_keeps_status() {
    let registry = ObserverRegistry::new();
    let mut seen = watch(&registry);
    let (session, mut from_client, _to_client) = ready(registry).await;

    session.close().await;
    closed(&session).await;

    assert!(session.is_closed());
    assert_eq!(session.model().status(), GameStatus::InProgress);
    assert!(seen.try_recv().is_err(), "close should not notify");
    assert_eq!(from_client.next_line().await.unwrap(), None);
}

#[tokio::test]
async fn test_close_is_idempotent_and_blocks_sends() {
    let (session, _from_client, _to_client) = ready(ObserverRegistry::new()).await;
    let other = session.clone();

    tokio::join!(session.close(), other.close());
    session.close().await;

    assert!(matches!(
        other.send(&reveal(1, 1)).await,
        Err(SessionError::Closed)
    ));
}

#[tokio::test]
async fn test_dropping_last_handle_closes_connection() {
    let (session, mut from_client, _to_client) = ready(ObserverRegistry::new()).await;
    let model = session.model().clone();

    drop(session);

    let line = timeout(Duration::from_secs(2), from_client.next_line())
        .await
        .expect("client should hang up");
    assert_eq!(line.unwrap(), None);
    assert_eq!(model.status(), GameStatus::InProgress);
}
