//! The contract between a connection and the code that serves it.

use async_trait::async_trait;

use crate::connection::Server;
use crate::message::MessageType;

/// Serves upgraded connections on one path.
///
/// A handler is registered once and shared by every connection on its
/// path, so it must be `Send + Sync`. Per-connection state lives in the
/// [`Session`] returned from [`Handler::on_connect`].
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Accept or refuse a new connection.
    ///
    /// Runs before the 101 response is written. Response headers and the
    /// subprotocol may be chosen through `server` here. Returning `None`
    /// refuses the connection: no 101 is written and no other callback
    /// runs for it.
    async fn on_connect(&self, server: &Server) -> Option<Box<dyn Session>>;

    /// Teardown, run once when the handler is unregistered.
    fn destroy(&self) {}
}

/// Per-connection state created by [`Handler::on_connect`].
#[async_trait]
pub trait Session: Send {
    /// Called once per complete text or binary message, in arrival order.
    ///
    /// The return value is the number of bytes the session consumed. It is
    /// recorded for tracing only.
    async fn on_message(&mut self, server: &Server, kind: MessageType, payload: &[u8]) -> usize;

    /// Called exactly once after the output channel has been detached.
    /// Sends from here, or from tasks still running, return 0.
    async fn on_disconnect(&mut self, _server: &Server) {}
}
