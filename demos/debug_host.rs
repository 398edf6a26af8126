//! Host serving the bundled handlers.
//!
//! Run with: `RUST_LOG=wsplug=debug cargo run --example debug_host`
//!
//! Routes:
//! - `/debug`: text commands `close`, `header: <name>`, `version`, `proto-count`
//! - `/echo`: echoes every message
//! - `/counter`: ten tasks each count down from 1000, then the server closes

use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use wsplug::handlers::{CounterHandler, DebugHandler, EchoHandler};
use wsplug::{Config, Host, Router};

const ADDR: &str = "127.0.0.1:9001";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let router = Router::new()
        .route("/debug", Arc::new(DebugHandler))
        .route("/echo", Arc::new(EchoHandler))
        .route("/counter", Arc::new(CounterHandler::default()));

    let listener = TcpListener::bind(ADDR).await?;
    tracing::info!(addr = ADDR, "listening");

    Host::new(router, Config::default()).serve(listener).await?;
    Ok(())
}
