use async_trait::async_trait;

use crate::connection::{Handler, Server, Session};
use crate::message::MessageType;

/// Sends each message back with the same type and payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

struct EchoSession;

#[async_trait]
impl Handler for EchoHandler {
    async fn on_connect(&self, _server: &Server) -> Option<Box<dyn Session>> {
        Some(Box::new(EchoSession))
    }
}

#[async_trait]
impl Session for EchoSession {
    async fn on_message(&mut self, server: &Server, kind: MessageType, payload: &[u8]) -> usize {
        server.send(kind, payload).await;
        payload.len()
    }
}
