//! Session lifecycle and the handler contract.
//!
//! ## Lifecycle
//!
//! 1. **Handshaking** - request validated, accept token derived
//! 2. **Connecting** - handler's `on_connect` runs with the output locked
//! 3. **Open** - 101 written; inbound messages dispatched to the session
//! 4. **Closing** - close sent or received, protocol error, or end of stream
//! 5. **Disconnected** - output detached, `on_disconnect` called once
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsplug::{Handler, MessageType, Server, Session};
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Session for Echo {
//!     async fn on_message(&mut self, server: &Server, kind: MessageType, payload: &[u8]) -> usize {
//!         server.send(kind, payload).await
//!     }
//! }
//! ```

mod state;

pub use state::SessionState;

#[cfg(feature = "async-tokio")]
#[allow(clippy::module_inception)]
mod connection;
#[cfg(feature = "async-tokio")]
mod handler;
#[cfg(feature = "async-tokio")]
mod server;

#[cfg(feature = "async-tokio")]
pub use connection::{Connection, Outcome};
#[cfg(feature = "async-tokio")]
pub use handler::{Handler, Session};
#[cfg(feature = "async-tokio")]
pub use server::{HANDLER_API_VERSION, Server};
