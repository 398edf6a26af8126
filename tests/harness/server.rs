//! Host spawned on a random loopback port.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wsplug::handlers::{CounterHandler, DebugHandler, EchoHandler};
use wsplug::{Config, Host, Router};

pub struct TestServer {
    task: JoinHandle<()>,
}

impl TestServer {
    /// Serve `/echo`, `/debug` and `/counter`.
    pub async fn spawn() -> (Self, SocketAddr) {
        let router = Router::new()
            .route("/echo", Arc::new(EchoHandler))
            .route("/debug", Arc::new(DebugHandler))
            .route("/counter", Arc::new(CounterHandler::default()));
        Self::spawn_with(router, Config::default()).await
    }

    pub async fn spawn_with(router: Router, config: Config) -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let host = Host::new(router, config);
        let task = tokio::spawn(async move {
            let _ = host.serve(listener).await;
        });
        (Self { task }, addr)
    }

    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}
