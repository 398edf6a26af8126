use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{MutexGuard, Notify};

use crate::connection::SessionState;
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, MessageType};
use crate::protocol::frame::{MAX_CONTROL_FRAME_PAYLOAD, MAX_HEADER_LEN, encode_header};
use crate::protocol::HandshakeRequest;

/// Version of the handler-facing API exposed by [`Server`].
pub const HANDLER_API_VERSION: u32 = 0;

/// Write half of the upgraded stream.
pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The output channel and the closing flag, guarded together so that a
/// frame is never interleaved with another and nothing follows a close.
pub(crate) struct Outbound {
    sink: Option<BoxedWriter>,
    closing: bool,
}

impl Outbound {
    /// Write one unmasked final frame: header, payload, flush.
    async fn write_frame(&mut self, kind: MessageType, payload: &[u8]) -> Result<usize> {
        if self.closing {
            return Err(Error::ConnectionClosed);
        }
        let Some(sink) = self.sink.as_mut() else {
            return Err(Error::ConnectionClosed);
        };
        if kind.is_control() && payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(payload.len() as u64));
        }
        if kind == MessageType::Close {
            self.closing = true;
        }

        let mut header = [0u8; MAX_HEADER_LEN];
        let header_len = encode_header(kind.opcode(), payload.len() as u64, &mut header);
        sink.write_all(&header[..header_len]).await?;
        if !payload.is_empty() {
            sink.write_all(payload).await?;
        }
        sink.flush().await?;
        Ok(payload.len())
    }

    /// Write bytes that are not a frame (the 101 response).
    pub(crate) async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(Error::ConnectionClosed)?;
        sink.write_all(data).await?;
        sink.flush().await?;
        Ok(())
    }

    pub(crate) fn detach(&mut self) -> Option<BoxedWriter> {
        self.closing = true;
        self.sink.take()
    }
}

struct Shared {
    request: HandshakeRequest,
    protocols: Vec<String>,
    chosen: Mutex<Option<String>>,
    response_headers: Mutex<Vec<(String, String)>>,
    outbound: tokio::sync::Mutex<Outbound>,
    state: AtomicU8,
    closing: AtomicBool,
    closed: Notify,
}

/// Handle through which a handler talks to its connection.
///
/// Cloning is cheap; clones may be moved into spawned tasks and used
/// concurrently. Every send holds an exclusive lock for the whole frame, so
/// frames from different tasks never interleave on the wire.
///
/// Sends issued while the handler's connect callback runs wait until the
/// 101 response has been written. A connect callback must therefore not
/// await a send itself; spawned tasks may.
#[derive(Clone)]
pub struct Server {
    shared: Arc<Shared>,
}

impl Server {
    pub(crate) fn new(request: HandshakeRequest, sink: BoxedWriter) -> Self {
        let protocols = request.protocols();
        let chosen = protocols.first().cloned();
        Self {
            shared: Arc::new(Shared {
                request,
                protocols,
                chosen: Mutex::new(chosen),
                response_headers: Mutex::new(Vec::new()),
                outbound: tokio::sync::Mutex::new(Outbound {
                    sink: Some(sink),
                    closing: false,
                }),
                state: AtomicU8::new(SessionState::Handshaking.as_u8()),
                closing: AtomicBool::new(false),
                closed: Notify::new(),
            }),
        }
    }

    /// Version of this API.
    #[must_use]
    pub fn version(&self) -> u32 {
        HANDLER_API_VERSION
    }

    /// The upgrade request.
    #[must_use]
    pub fn request(&self) -> &HandshakeRequest {
        &self.shared.request
    }

    /// Case-insensitive lookup of an upgrade request header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.shared.request.header(name)
    }

    /// Add a header to the 101 response, replacing an earlier value for the
    /// same name. Setting one of the built-in upgrade headers replaces its
    /// value. Only effective during connect.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHeaderValue` if the name or value contains CR or LF.
    pub fn set_header(&self, name: &str, value: &str) -> Result<()> {
        if [name, value].iter().any(|s| s.contains(['\r', '\n'])) {
            return Err(Error::InvalidHeaderValue {
                header: name.to_string(),
                reason: "contains CR or LF characters".to_string(),
            });
        }
        if self.state() > SessionState::Connecting {
            tracing::debug!(header = name, "response header set after upgrade; ignored");
            return Ok(());
        }
        let mut headers = lock(&self.shared.response_headers);
        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    /// Number of subprotocols the client offered.
    #[must_use]
    pub fn protocol_count(&self) -> usize {
        self.shared.protocols.len()
    }

    /// Offered subprotocol at `index`, in the client's order.
    #[must_use]
    pub fn protocol(&self, index: usize) -> Option<&str> {
        self.shared.protocols.get(index).map(String::as_str)
    }

    /// Choose the subprotocol announced in the 101 response. Defaults to the
    /// first offered one. Only effective during connect.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHeaderValue` if the name contains CR or LF.
    pub fn set_protocol(&self, name: &str) -> Result<()> {
        if name.contains(['\r', '\n']) {
            return Err(Error::InvalidHeaderValue {
                header: "Sec-WebSocket-Protocol".to_string(),
                reason: "contains CR or LF characters".to_string(),
            });
        }
        *lock(&self.shared.chosen) = Some(name.to_string());
        Ok(())
    }

    /// The subprotocol that is (or will be) announced, if any.
    #[must_use]
    pub fn chosen_protocol(&self) -> Option<String> {
        lock(&self.shared.chosen).clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Returns `true` once a close frame has been sent or the output has
    /// been detached.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    /// Send one message as a single final frame.
    ///
    /// Returns the number of payload bytes written: `0` on failure, for an
    /// empty payload, and once the connection is closing.
    pub async fn send(&self, kind: MessageType, payload: &[u8]) -> usize {
        match self.try_send(kind, payload).await {
            Ok(n) => n,
            Err(Error::ConnectionClosed) => 0,
            Err(e) => {
                tracing::warn!(error = %e, kind = %kind, "send failed");
                0
            }
        }
    }

    /// Like [`Server::send`], reporting why nothing was written.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` once closing or detached
    /// - `Error::ControlFrameTooLarge` for control payloads over 125 bytes
    /// - `Error::Io` if the stream fails
    pub async fn try_send(&self, kind: MessageType, payload: &[u8]) -> Result<usize> {
        let mut out = self.shared.outbound.lock().await;
        let result = out.write_frame(kind, payload).await;
        if out.closing {
            self.mark_closing();
        }
        result
    }

    /// Send an empty close frame. Later sends, including further closes,
    /// are no-ops.
    pub async fn close(&self) -> usize {
        self.send(MessageType::Close, &[]).await
    }

    /// Send a close frame carrying a status code and reason.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCloseCode` for codes that must not be sent
    /// - `Error::ControlFrameTooLarge` if the reason exceeds 123 bytes
    /// - errors from [`Server::try_send`]
    pub async fn close_with(&self, code: CloseCode, reason: &str) -> Result<usize> {
        let payload = CloseFrame::new(code, reason).encode()?;
        self.try_send(MessageType::Close, &payload).await
    }

    fn mark_closing(&self) {
        if !self.shared.closing.swap(true, Ordering::AcqRel) {
            self.advance(SessionState::Closing);
            self.shared.closed.notify_one();
        }
    }

    /// Move the state forward; never backwards.
    pub(crate) fn advance(&self, state: SessionState) {
        self.shared.state.fetch_max(state.as_u8(), Ordering::AcqRel);
    }

    pub(crate) async fn lock_outbound(&self) -> MutexGuard<'_, Outbound> {
        self.shared.outbound.lock().await
    }

    /// Resolves once the session starts closing.
    pub(crate) async fn closed(&self) {
        self.shared.closed.notified().await;
    }

    pub(crate) fn take_response_headers(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *lock(&self.shared.response_headers))
    }

    /// Detach the output channel; every later send returns 0.
    pub(crate) async fn detach(&self) -> Option<BoxedWriter> {
        let sink = self.shared.outbound.lock().await.detach();
        self.mark_closing();
        sink
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("path", &self.shared.request.path)
            .field("state", &self.state())
            .field("protocol", &self.chosen_protocol())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
