#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! End-to-end tests over real TCP sockets: one server task, real clients,
//! every mode, and failure isolation between connections.

use std::sync::Arc;
use std::time::Duration;

use matryoshka_protocol::core::spec::TOTAL_HEADER_LEN;
use matryoshka_protocol::server::registry::ClientRegistry;
use matryoshka_protocol::{Client, Mode, Server, ServerConfig, ServerStats};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct TestServer {
    addr: std::net::SocketAddr,
    shutdown: mpsc::Sender<()>,
    stats: Arc<ServerStats>,
    registry: Arc<ClientRegistry>,
    handle: JoinHandle<matryoshka_protocol::Result<()>>,
}

impl TestServer {
    async fn start(mode: Mode) -> Self {
        Self::start_with(|config| config.mode = mode).await
    }

    async fn start_with<F: FnOnce(&mut ServerConfig)>(mutator: F) -> Self {
        let mut config = ServerConfig::default();
        config.address = String::from("127.0.0.1:0");
        mutator(&mut config);

        let server = Server::bind(config).await.expect("bind should succeed");
        let addr = server.local_addr().unwrap();
        let stats = server.stats();
        let registry = server.registry();
        let (shutdown, rx) = mpsc::channel(1);
        let handle = tokio::spawn(server.run_until(rx));
        Self {
            addr,
            shutdown,
            stats,
            registry,
            handle,
        }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(()).await;
        self.handle
            .await
            .expect("server task should not panic")
            .expect("server should shut down cleanly");
    }
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

// ============================================================================
// ECHO
// ============================================================================

#[tokio::test]
async fn echo_round_trip() {
    let server = TestServer::start(Mode::Echo).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    let reply = client.request(b"Hello!").await.unwrap();
    assert_eq!(reply, b"Hello!");

    let snapshot = server.stats.snapshot();
    assert_eq!(snapshot.packets_received, 1);
    assert_eq!(snapshot.packets_sent, 1);
    assert_eq!(snapshot.overhead_bytes, TOTAL_HEADER_LEN as u64);
    assert_eq!(snapshot.bytes_received, (6 + TOTAL_HEADER_LEN) as u64);

    server.stop().await;
}

#[tokio::test]
async fn echo_replies_preserve_request_order() {
    let server = TestServer::start(Mode::Echo).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    for i in 0..20u32 {
        let payload = format!("request number {i}");
        let reply = client.request(payload.as_bytes()).await.unwrap();
        assert_eq!(reply, payload.as_bytes());
    }

    server.stop().await;
}

#[tokio::test]
async fn echo_handles_empty_and_binary_payloads() {
    let server = TestServer::start(Mode::Echo).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    assert_eq!(client.request(b"").await.unwrap(), b"");
    let binary: Vec<u8> = (0..=255u8).collect();
    assert_eq!(client.request(&binary).await.unwrap(), binary);

    server.stop().await;
}

// ============================================================================
// PING
// ============================================================================

#[tokio::test]
async fn ping_reply_is_a_fixed_width_timestamp() {
    let server = TestServer::start(Mode::Ping).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    let small = client.request(b"x").await.unwrap();
    let large = client.request(&vec![0u8; 50_000]).await.unwrap();
    assert_eq!(small.len(), 8);
    assert_eq!(large.len(), 8);

    let micros = u64::from_be_bytes(small.try_into().unwrap());
    // Sanity: after 2020-01-01 in microseconds.
    assert!(micros > 1_577_836_800_000_000, "timestamp was {micros}");

    server.stop().await;
}

// ============================================================================
// FILE
// ============================================================================

#[tokio::test]
async fn file_mode_acks_cumulative_byte_counts() {
    let server = TestServer::start(Mode::File).await;
    let mut client = Client::connect(server.addr).await.unwrap();

    assert_eq!(client.request(b"chunk one ").await.unwrap(), b"received 10 bytes");
    assert_eq!(client.request(b"chunk two").await.unwrap(), b"received 19 bytes");
    assert_eq!(client.request(b"EOF").await.unwrap(), b"complete: 19 bytes");

    // A second transfer on the same connection starts from zero.
    assert_eq!(client.request(b"again").await.unwrap(), b"received 5 bytes");

    server.stop().await;
}

// ============================================================================
// CHAT
// ============================================================================

#[tokio::test]
async fn chat_broadcasts_to_peers_but_not_the_sender() {
    let server = TestServer::start(Mode::Chat).await;
    let registry = Arc::clone(&server.registry);

    let mut a = Client::connect(server.addr).await.unwrap();
    let mut b = Client::connect(server.addr).await.unwrap();
    let mut c = Client::connect(server.addr).await.unwrap();
    wait_until("three chat clients registered", || registry.len() == 3).await;

    let ack = a.request(b"hello from A").await.unwrap();
    assert_eq!(ack, b"delivered to 2 peer(s)");
    assert_eq!(b.recv().await.unwrap(), b"hello from A");
    assert_eq!(c.recv().await.unwrap(), b"hello from A");

    server.stop().await;
}

#[tokio::test]
async fn chat_survives_a_peer_disconnecting() {
    let server = TestServer::start(Mode::Chat).await;
    let registry = Arc::clone(&server.registry);

    let mut a = Client::connect(server.addr).await.unwrap();
    let b = Client::connect(server.addr).await.unwrap();
    let mut c = Client::connect(server.addr).await.unwrap();
    wait_until("three chat clients registered", || registry.len() == 3).await;

    drop(b);
    wait_until("departed client unregistered", || registry.len() == 2).await;

    let ack = a.request(b"anyone there?").await.unwrap();
    assert_eq!(ack, b"delivered to 1 peer(s)");
    assert_eq!(c.recv().await.unwrap(), b"anyone there?");

    server.stop().await;
}

// ============================================================================
// FAILURE ISOLATION
// ============================================================================

#[tokio::test]
async fn malformed_stream_closes_only_its_own_connection() {
    let server = TestServer::start(Mode::Echo).await;
    let mut good = Client::connect(server.addr).await.unwrap();
    assert_eq!(good.request(b"before").await.unwrap(), b"before");

    // Raw socket speaking something that is not the protocol.
    let mut bad = TcpStream::connect(server.addr).await.unwrap();
    bad.write_all(b"GET / HTTP/1.1\r\nHost: nope\r\n\r\n")
        .await
        .unwrap();
    let mut sink = Vec::new();
    let n = bad.read_to_end(&mut sink).await.unwrap();
    assert_eq!(n, 0, "server should close the malformed connection");

    // The well-behaved connection is unaffected.
    assert_eq!(good.request(b"after").await.unwrap(), b"after");

    server.stop().await;
}

#[tokio::test]
async fn oversized_frame_closes_only_its_own_connection() {
    let server = TestServer::start_with(|config| {
        config.mode = Mode::Echo;
        config.max_packet_size = 4096;
    })
    .await;

    let mut good = Client::connect(server.addr).await.unwrap();
    assert_eq!(good.request(b"small").await.unwrap(), b"small");

    // A client with a larger limit can emit a frame the server rejects.
    let mut oversized =
        Client::connect_with(server.addr, matryoshka_protocol::PacketCodec::new(1024 * 1024))
            .await
            .unwrap();
    oversized.send(&vec![0xAB; 16 * 1024]).await.unwrap();
    assert!(oversized.recv().await.is_err(), "connection should be closed");

    assert_eq!(good.request(b"still fine").await.unwrap(), b"still fine");

    server.stop().await;
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[tokio::test]
async fn shutdown_closes_open_connections() {
    let server = TestServer::start(Mode::Echo).await;
    let mut client = Client::connect(server.addr).await.unwrap();
    assert_eq!(client.request(b"ok").await.unwrap(), b"ok");

    server.stop().await;
    assert!(client.recv().await.is_err(), "connection should be closed");
}

#[tokio::test]
async fn idle_timeout_closes_quiet_connections() {
    let server = TestServer::start_with(|config| {
        config.mode = Mode::Echo;
        config.idle_timeout = Some(Duration::from_millis(200));
    })
    .await;

    let mut client = Client::connect(server.addr).await.unwrap();
    let closed = tokio::time::timeout(Duration::from_secs(5), client.recv())
        .await
        .expect("idle connection should be closed well within five seconds");
    assert!(closed.is_err());

    server.stop().await;
}
