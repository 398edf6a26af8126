use async_trait::async_trait;

use crate::connection::{Handler, Server, Session};
use crate::message::MessageType;

/// Request header that makes [`DebugHandler`] refuse the connection.
pub const REFUSE_HEADER: &str = "X-Refuse-Connection";

/// Request header holding the index of the subprotocol to choose.
pub const CHOOSE_PROTOCOL_HEADER: &str = "X-Choose-Subprotocol";

/// Header added to every accepted upgrade response.
pub const DEBUG_HEADER: &str = "X-Debug-Header";

/// Exposes connection details through small text commands.
///
/// On connect it refuses if `X-Refuse-Connection` is present, picks the
/// subprotocol at the index given in `X-Choose-Subprotocol` and adds
/// `X-Debug-Header: true` to the response. Text commands:
///
/// - `close`: close the connection
/// - `header: <name>`: reply with the request header's value, or `<null>`
/// - `version`: reply with the handler API version
/// - `proto-count`: reply with the number of offered subprotocols
///
/// Binary messages and unknown commands are ignored. Reflecting request
/// headers is only meant for testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugHandler;

struct DebugSession;

#[async_trait]
impl Handler for DebugHandler {
    async fn on_connect(&self, server: &Server) -> Option<Box<dyn Session>> {
        if server.header(REFUSE_HEADER).is_some() {
            return None;
        }

        let chosen = server
            .header(CHOOSE_PROTOCOL_HEADER)
            .and_then(|index| index.parse::<usize>().ok())
            .and_then(|index| server.protocol(index))
            .map(str::to_string);
        if let Some(protocol) = chosen {
            // Offered tokens never contain CR or LF.
            let _ = server.set_protocol(&protocol);
        }

        let _ = server.set_header(DEBUG_HEADER, "true");
        Some(Box::new(DebugSession))
    }
}

#[async_trait]
impl Session for DebugSession {
    async fn on_message(&mut self, server: &Server, kind: MessageType, payload: &[u8]) -> usize {
        if kind != MessageType::Text {
            return payload.len();
        }

        if payload == b"close" {
            server.close().await;
        } else if let Some(name) = payload.strip_prefix(b"header: ") {
            let name = String::from_utf8_lossy(name);
            let value = server.header(&name).unwrap_or("<null>").to_string();
            server.send(MessageType::Text, value.as_bytes()).await;
        } else if payload == b"version" {
            let reply = server.version().to_string();
            server.send(MessageType::Text, reply.as_bytes()).await;
        } else if payload == b"proto-count" {
            let reply = server.protocol_count().to_string();
            server.send(MessageType::Text, reply.as_bytes()).await;
        }

        payload.len()
    }
}
