//! Reference handlers.
//!
//! - [`EchoHandler`] sends every message back unchanged.
//! - [`DebugHandler`] answers small text commands about the connection.
//! - [`CounterHandler`] floods the connection from several tasks at once.

mod counter;
mod debug;
mod echo;

pub use counter::CounterHandler;
pub use debug::DebugHandler;
pub use echo::EchoHandler;
