//! Host behaviour over loopback TCP: routing, rejections and the handler
//! lifecycle as seen from outside.

mod harness;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use harness::{KEY, TestClient, TestServer};
use wsplug::handlers::EchoHandler;
use wsplug::protocol::frame::encode_client_frame;
use wsplug::{Config, Handler, MessageType, OpCode, Router, Server, Session};

#[derive(Default)]
struct Lifecycle {
    connects: AtomicUsize,
    messages: AtomicUsize,
    disconnects: AtomicUsize,
    destroys: AtomicUsize,
}

/// Greets from a spawned task during connect and counts callbacks.
struct Greeter {
    counts: Arc<Lifecycle>,
}

struct GreeterSession {
    counts: Arc<Lifecycle>,
}

#[async_trait]
impl Handler for Greeter {
    async fn on_connect(&self, server: &Server) -> Option<Box<dyn Session>> {
        self.counts.connects.fetch_add(1, Ordering::SeqCst);
        let server = server.clone();
        tokio::spawn(async move {
            server.send(MessageType::Text, b"hello").await;
        });
        Some(Box::new(GreeterSession {
            counts: Arc::clone(&self.counts),
        }))
    }

    fn destroy(&self) {
        self.counts.destroys.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for GreeterSession {
    async fn on_message(&mut self, _server: &Server, _kind: MessageType, payload: &[u8]) -> usize {
        self.counts.messages.fetch_add(1, Ordering::SeqCst);
        payload.len()
    }

    async fn on_disconnect(&mut self, _server: &Server) {
        self.counts.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

fn upgrade_request(path: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: localhost\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {KEY}\r\n\
         Sec-WebSocket-Version: 7\r\n\r\n"
    )
}

#[tokio::test]
async fn test_unknown_path_gets_404() {
    let (server, addr) = TestServer::spawn().await;

    let (mut client, response) = TestClient::connect(addr, "/nowhere").await.unwrap();
    assert_eq!(response.status, 404);
    assert!(client.recv().await.unwrap().is_none());

    server.shutdown().await;
}

#[tokio::test]
async fn test_plain_get_gets_400() {
    let (server, addr) = TestServer::spawn().await;

    let request = b"GET /echo HTTP/1.1\r\nHost: localhost\r\n\r\n";
    let (mut client, response) = TestClient::connect_raw(addr, request).await.unwrap();
    assert_eq!(response.status, 400);
    assert!(client.recv().await.unwrap().is_none());

    server.shutdown().await;
}

#[tokio::test]
async fn test_newer_version_gets_400() {
    let (server, addr) = TestServer::spawn().await;

    let request = upgrade_request("/echo").replace("Version: 7", "Version: 13");
    let (_client, response) = TestClient::connect_raw(addr, request.as_bytes()).await.unwrap();
    assert_eq!(response.status, 400);

    server.shutdown().await;
}

#[tokio::test]
async fn test_query_string_is_ignored_for_routing() {
    let (server, addr) = TestServer::spawn().await;

    let (mut client, upgrade) = TestClient::connect(addr, "/echo?room=7").await.unwrap();
    assert_eq!(upgrade.status, 101);
    client.send_text("routed").await.unwrap();
    assert_eq!(client.recv_text().await.unwrap().as_deref(), Some("routed"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_frame_sent_with_request_head_is_kept() {
    let (server, addr) = TestServer::spawn().await;

    let mut bytes = upgrade_request("/echo").into_bytes();
    bytes.extend(encode_client_frame(true, OpCode::Text, b"early", [1, 2, 3, 4]));
    let (mut client, upgrade) = TestClient::connect_raw(addr, &bytes).await.unwrap();
    assert_eq!(upgrade.status, 101);
    assert_eq!(client.recv_text().await.unwrap().as_deref(), Some("early"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_send_during_connect_follows_upgrade_response() {
    let counts = Arc::new(Lifecycle::default());
    let router = Router::new()
        .route("/greet", Arc::new(Greeter { counts: Arc::clone(&counts) }))
        .route("/echo", Arc::new(EchoHandler));
    let (server, addr) = TestServer::spawn_with(router, Config::default()).await;

    let (mut client, upgrade) = TestClient::connect(addr, "/greet").await.unwrap();
    assert_eq!(upgrade.status, 101);
    assert_eq!(client.recv_text().await.unwrap().as_deref(), Some("hello"));

    client.send_text("one").await.unwrap();
    client.send(true, OpCode::Binary, b"two").await.unwrap();
    client.close().await.unwrap();

    let frames = client.recv_all().await.unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].opcode, 0x8);
    assert_eq!(frames[0].payload, 1000u16.to_be_bytes());

    assert_eq!(counts.connects.load(Ordering::SeqCst), 1);
    assert_eq!(counts.messages.load(Ordering::SeqCst), 2);
    assert_eq!(counts.disconnects.load(Ordering::SeqCst), 1);

    // Stopping the host drops the router, which tears the handler down once
    // the last connection task lets go of it.
    server.shutdown().await;
    for _ in 0..100 {
        if counts.destroys.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(counts.destroys.load(Ordering::SeqCst), 1);
}
