//! # wsplug - WebSocket upgrade and framing engine with pluggable handlers
//!
//! `wsplug` upgrades an HTTP/1.1 connection, speaks the masked-frame
//! protocol (revision 7) over the raw stream and delivers reassembled
//! messages to handlers registered per path.
//!
//! ## Features
//!
//! - **Re-entrant reassembler** that accepts input in blocks of any size
//! - **Runtime-agnostic core** (`protocol`); the session layer runs on tokio
//! - **Single-writer send path** safe to share across spawned tasks
//! - **Resource limits** on frame, message and request head sizes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wsplug::{Config, Host, Router, handlers::DebugHandler};
//!
//! let router = Router::new().route("/debug", Arc::new(DebugHandler));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:9001").await?;
//! Host::new(router, Config::default()).serve(listener).await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod handlers;
#[cfg(feature = "async-tokio")]
pub mod host;

pub use config::{Config, Limits};
#[cfg(feature = "async-tokio")]
pub use connection::{Connection, Handler, Outcome, Server, Session};
pub use connection::SessionState;
pub use error::{Error, Result};
#[cfg(feature = "async-tokio")]
pub use host::{Host, Router};
pub use message::{CloseCode, CloseFrame, MessageType};
pub use protocol::{
    Event, FrameReassembler, HandshakeRequest, HandshakeResponse, OpCode, WS_GUID,
    compute_accept_key,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<Limits>();
        assert_send::<MessageType>();
        assert_send::<CloseCode>();
        assert_send::<CloseFrame>();
        assert_send::<SessionState>();
        assert_send::<FrameReassembler>();
    }

    #[cfg(feature = "async-tokio")]
    #[test]
    fn test_session_types_are_send_and_sync() {
        assert_send::<Server>();
        assert_send::<Router>();
        assert_send::<Box<dyn Session>>();
        assert_sync::<Server>();
        assert_sync::<Host>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<Limits>();
        assert_sync::<MessageType>();
        assert_sync::<CloseCode>();
        assert_sync::<CloseFrame>();
        assert_sync::<SessionState>();
    }
}
