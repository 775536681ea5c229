//! Integration tests: login, command correlation, keep-alive and
//! reconnect behaviour against a mock BattlEye server on localhost.

mod common;

use std::time::Duration;

use bercon_core::packet::PacketKind;
use bercon_core::{
    ClientOptions, ConnectionOptions, ConnectionParams, ConnectionPhase, RconClient,
    RconConnection, RconError,
};
use tokio_test::{assert_err, assert_ok};

use common::{MockConfig, MockServer, Reply};

const LOGIN_TIMEOUT: Duration = Duration::from_secs(2);
const WAIT: Duration = Duration::from_millis(200);

const PLAYERS: &str = "Players on server:\n\
    [#] [IP Address]:[Port] [Ping] [GUID] [Name]\n\
    --------------------------------------------------\n\
    0 10.0.0.1:2304 31 aaaa(OK) Alpha\n\
    1 10.0.0.2:2304 42 bbbb(OK) Bravo\n\
    2 10.0.0.3:2304 53 cccc(?) Charlie (Lobby)\n\
    (3 players in total)";

fn fast_client(connection: RconConnection) -> RconClient {
    RconClient::with_options(
        connection,
        ClientOptions {
            login_timeout: LOGIN_TIMEOUT,
            command_wait: WAIT,
            players_wait: WAIT,
            kick_delay: Duration::from_millis(10),
        },
    )
}

// ── Login ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success() {
    let server = MockServer::start(MockConfig::default()).await;
    let conn = server.connection(ConnectionOptions::default());

    assert_ok!(conn.connect(LOGIN_TIMEOUT).await);
    assert!(conn.is_authenticated());
    assert!(matches!(conn.phase(), ConnectionPhase::Authenticated { .. }));
    assert!(conn.local_addr().is_some());
    assert_eq!(conn.peer_addr(), Some(server.addr()));

    let login = &server.received()[0];
    assert_eq!(login.kind(), PacketKind::Login);
    assert_eq!(login.payload(), b"secret");

    // Already authenticated: no second login packet.
    assert_ok!(conn.connect(LOGIN_TIMEOUT).await);
    assert_eq!(server.logins(), 1);

    conn.disconnect().await;
    assert!(!conn.is_authenticated());
    assert!(conn.local_addr().is_none());
}

#[tokio::test]
async fn test_login_rejected_closes_socket() {
    let server = MockServer::start(MockConfig::default()).await;
    let params = ConnectionParams::new("127.0.0.1", server.addr().port(), "wrong");
    let conn = RconConnection::new(params);

    let err = assert_err!(conn.connect(LOGIN_TIMEOUT).await);
    assert!(matches!(err, RconError::AuthenticationFailed));
    assert!(!conn.is_authenticated());
    assert!(conn.phase().is_disconnected());
    assert!(conn.local_addr().is_none());
}

#[tokio::test]
async fn test_login_timeout() {
    let server = MockServer::start(MockConfig {
        silent: true,
        ..Default::default()
    })
    .await;
    let conn = server.connection(ConnectionOptions::default());

    let started = tokio::time::Instant::now();
    let err = assert_err!(conn.connect(Duration::from_millis(200)).await);
    assert!(matches!(err, RconError::ConnectionTimeout(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!conn.is_authenticated());
    assert!(conn.local_addr().is_none());
}

#[tokio::test]
async fn test_command_before_login_is_rejected() {
    let server = MockServer::start(MockConfig::default()).await;
    let conn = server.connection(ConnectionOptions::default());
    let err = assert_err!(conn.send_command("players", WAIT).await);
    assert!(matches!(err, RconError::NotAuthenticated));
    assert!(server.commands().is_empty());
}

// ── Commands ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_response_correlation() {
    let server = MockServer::start(
        MockConfig::default()
            .reply("players", vec![Reply::stale("ghost"), Reply::text(PLAYERS)]),
    )
    .await;
    let conn = server.connection(ConnectionOptions::default());
    assert_ok!(conn.connect(LOGIN_TIMEOUT).await);

    let response = assert_ok!(conn.send_command("players", WAIT).await);
    assert_eq!(response, PLAYERS);
    assert_eq!(server.commands(), [(0, "players".to_string())]);

    // Next command starts from an empty buffer.
    let response = assert_ok!(conn.send_command("#lock", WAIT).await);
    assert_eq!(response, "");
    assert_eq!(server.commands()[1], (1, "#lock".to_string()));
}

#[tokio::test]
async fn test_multi_part_response_reassembled_by_index() {
    let server = MockServer::start(MockConfig::default().reply(
        "bans",
        vec![
            Reply::part(3, 2, "three"),
            Reply::part(3, 0, "one-"),
            Reply::part(3, 1, "two-"),
        ],
    ))
    .await;
    let conn = server.connection(ConnectionOptions::default());
    assert_ok!(conn.connect(LOGIN_TIMEOUT).await);

    let response = assert_ok!(conn.send_command("bans", WAIT).await);
    assert_eq!(response, "one-two-three");
}

#[tokio::test]
async fn test_checksum_verification_is_optional() {
    let config = MockConfig::default().reply("status", vec![Reply::corrupt("tampered")]);

    let lenient = MockServer::start(config.clone()).await;
    let conn = lenient.connection(ConnectionOptions::default());
    assert_ok!(conn.connect(LOGIN_TIMEOUT).await);
    assert_eq!(assert_ok!(conn.send_command("status", WAIT).await), "tampered");

    let strict = MockServer::start(config).await;
    let conn = strict.connection(ConnectionOptions {
        verify_checksums: true,
        ..Default::default()
    });
    assert_ok!(conn.connect(LOGIN_TIMEOUT).await);
    // The only reply is dropped, so the command goes unanswered.
    let err = assert_err!(conn.send_command("status", WAIT).await);
    assert!(matches!(err, RconError::ConnectionTimeout(_)), "got {err}");
    assert!(!conn.is_authenticated());
}

#[tokio::test]
async fn test_empty_reply_is_not_a_timeout() {
    let server = MockServer::start(MockConfig::default().reply("#lock", vec![Reply::text("")])).await;
    let conn = server.connection(ConnectionOptions::default());
    assert_ok!(conn.connect(LOGIN_TIMEOUT).await);

    assert_eq!(assert_ok!(conn.send_command("#lock", WAIT).await), "");
    assert!(conn.is_authenticated());
}

#[tokio::test]
async fn test_unanswered_command_times_out() {
    let server = MockServer::start(MockConfig {
        mute_commands: true,
        ..Default::default()
    })
    .await;
    let client = fast_client(server.connection(ConnectionOptions::default()));

    let err = assert_err!(client.execute("#lock").await);
    assert!(matches!(err, RconError::ConnectionTimeout(d) if d == WAIT), "got {err}");
    assert!(!client.is_authenticated());

    // The next guarded call logs in again, and still fails loudly.
    assert_err!(client.list_players().await);
    assert_eq!(server.logins(), 2);
    assert_err!(client.kick_all("restart").await);
    assert_eq!(server.logins(), 3);
    let sent: Vec<String> = server.commands().into_iter().map(|(_, c)| c).collect();
    assert_eq!(sent, ["#lock", "players", "players"]);
}

#[tokio::test]
async fn test_sequence_wraps_after_255() {
    let server = MockServer::start(MockConfig::default()).await;
    let conn = server.connection(ConnectionOptions::default());
    assert_ok!(conn.connect(LOGIN_TIMEOUT).await);

    for i in 0..257 {
        assert_ok!(conn.send_command(&format!("cmd{i}"), Duration::from_millis(20)).await);
    }
    let seqs: Vec<u8> = server.commands().into_iter().map(|(seq, _)| seq).collect();
    assert_eq!(seqs.len(), 257);
    assert_eq!(seqs[255], 255);
    assert_eq!(seqs[256], 0);
    assert!(seqs.iter().take(256).enumerate().all(|(i, &s)| usize::from(s) == i));
}

// ── Background task ──────────────────────────────────────────────

/// Advance the clock by `by` without waiting, then give the socket
/// tasks real time to deliver what the timers sent.
async fn skip_ahead(by: Duration) {
    tokio::time::pause();
    tokio::time::sleep(by).await;
    tokio::time::resume();
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_keep_alive_cadence() {
    let server = MockServer::start(MockConfig::default()).await;
    let conn = server.connection(ConnectionOptions::default());
    assert_ok!(conn.connect(LOGIN_TIMEOUT).await);

    // Default 30 s interval: ticks at 30 s and 60 s.
    skip_ahead(Duration::from_secs(65)).await;

    let keep_alives = server.commands();
    assert_eq!(keep_alives, [(0, String::new()), (1, String::new())]);
    assert!(conn.is_authenticated());

    // Keep-alives stop with the session.
    conn.disconnect().await;
    skip_ahead(Duration::from_secs(65)).await;
    assert_eq!(server.commands().len(), 2);
}

#[tokio::test]
async fn test_server_message_is_acknowledged() {
    let server = MockServer::start(MockConfig::default()).await;
    let conn = server.connection(ConnectionOptions::default());
    assert_ok!(conn.connect(LOGIN_TIMEOUT).await);

    server.push_message(7, "RCon admin #0 logged in").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let acks: Vec<_> = server
        .received()
        .into_iter()
        .filter(|p| p.kind() == PacketKind::Message)
        .collect();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].sequence(), Some(7));
    assert!(acks[0].payload().is_empty());
}

// ── Connection guard ─────────────────────────────────────────────

#[tokio::test]
async fn test_reconnect_after_forced_disconnect() {
    let server = MockServer::start(MockConfig::default()).await;
    let client = fast_client(server.connection(ConnectionOptions::default()));

    assert_ok!(client.execute("#lock").await);
    client.transport().disconnect().await;
    assert!(!client.is_authenticated());

    assert_ok!(client.execute("#unlock").await);
    assert!(client.is_authenticated());
    assert_eq!(server.logins(), 2);
    // The new session numbers its commands from zero again.
    assert_eq!(
        server.commands(),
        [(0, "#lock".to_string()), (0, "#unlock".to_string())]
    );
}

#[tokio::test]
async fn test_reconnect_after_server_restart() {
    let server = MockServer::start(MockConfig::default()).await;
    let addr = server.addr();
    let client = fast_client(server.connection(ConnectionOptions::default()));

    assert_ok!(client.execute("#lock").await);
    server.shutdown().await;

    // A dead peer either goes quiet or bounces an ICMP error; both drop
    // the session.
    let err = assert_err!(client.execute("#unlock").await);
    assert!(
        matches!(err, RconError::ConnectionTimeout(_) | RconError::Transport(_)),
        "got {err}"
    );
    assert!(!client.is_authenticated());

    let restarted = MockServer::start_on(addr, MockConfig::default()).await;
    assert_ok!(client.execute("#unlock").await);
    assert!(client.is_authenticated());
    assert_eq!(restarted.logins(), 1);
    assert_eq!(restarted.commands(), [(0, "#unlock".to_string())]);
}

#[tokio::test]
async fn test_reconnect_rejected_reports_offline() {
    let server = MockServer::start(MockConfig::default()).await;
    let addr = server.addr();
    let client = fast_client(server.connection(ConnectionOptions::default()));
    assert_ok!(client.connect().await);

    client.disconnect().await;
    server.shutdown().await;
    let restarted = MockServer::start_on(
        addr,
        MockConfig {
            password: "rotated".into(),
            ..Default::default()
        },
    )
    .await;

    let err = assert_err!(client.broadcast("hello?").await);
    match err {
        RconError::ServerOffline(inner) => {
            assert!(matches!(*inner, RconError::AuthenticationFailed))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(restarted.commands().is_empty());
}

// ── Commands over the wire ───────────────────────────────────────

#[tokio::test]
async fn test_kick_all() {
    let server =
        MockServer::start(MockConfig::default().reply("players", vec![Reply::text(PLAYERS)])).await;
    let client = fast_client(server.connection(ConnectionOptions::default()));

    let summary = assert_ok!(client.kick_all("test").await);
    assert_eq!(summary.to_string(), "Kicked 3 player(s)");

    let commands: Vec<String> = server.commands().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        commands,
        ["players", "kick 0 test", "kick 1 test", "kick 2 test"]
    );
}

#[tokio::test]
async fn test_list_players_over_the_wire() {
    let server =
        MockServer::start(MockConfig::default().reply("players", vec![Reply::text(PLAYERS)])).await;
    let client = fast_client(server.connection(ConnectionOptions::default()));

    let players = assert_ok!(client.list_players().await);
    assert_eq!(players.len(), 3);
    assert_eq!(players[2].name, "Charlie");
    assert!(players[2].in_lobby);
    assert!(!players[2].guid_verified);

    let report = assert_ok!(client.test_connection().await);
    assert_eq!(report.players_online, 3);
    assert_eq!(report.endpoint, format!("127.0.0.1:{}", server.addr().port()));
}
