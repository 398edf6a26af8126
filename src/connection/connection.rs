use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::connection::{Handler, Server, Session, SessionState};
use crate::error::{Error, Result};
use crate::message::{CloseFrame, MessageType};
use crate::protocol::reassembler::{Event, FrameReassembler};
use crate::protocol::{HandshakeRequest, HandshakeResponse, compute_accept_key};

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Outcome {
    /// The handler declined the connection; nothing was written.
    Refused,
    /// The client sent a close frame with a valid status code, or none.
    PeerClosed(Option<CloseFrame>),
    /// The handler (or one of its tasks) sent a close frame.
    LocalClosed,
    /// The client closed the stream without a close frame.
    EndOfStream,
    /// Inbound bytes violated the framing protocol.
    ProtocolError(Error),
    /// Reading the stream failed.
    Io(Error),
}

/// One upgraded connection, from the validated request to teardown.
///
/// `Connection` owns the stream and the frame reassembler. The handler sees
/// it only through the [`Server`] handle.
///
/// ## Example
///
/// ```rust,ignore
/// use wsplug::{Config, Connection, HandshakeRequest};
///
/// let request = HandshakeRequest::parse(&head)?;
/// let outcome = Connection::new(stream, request, Config::default())
///     .serve(&handler)
///     .await?;
/// ```
pub struct Connection<T> {
    io: T,
    request: HandshakeRequest,
    config: Config,
}

impl<T> Connection<T> {
    /// Wrap a stream whose request head has already been read.
    pub fn new(io: T, request: HandshakeRequest, config: Config) -> Self {
        Self {
            io,
            request,
            config,
        }
    }

    /// The upgrade request.
    pub fn request(&self) -> &HandshakeRequest {
        &self.request
    }
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Upgrade the connection and run it until it closes.
    ///
    /// Calls `on_connect` while holding the output lock, writes the 101
    /// response, then feeds inbound bytes to the reassembler and dispatches
    /// each event. On the way out a best-effort close frame is sent, the
    /// output is detached, `on_disconnect` runs and the stream is shut down.
    ///
    /// ## Errors
    ///
    /// - `Error::InvalidHandshake` if the request fails validation; nothing
    ///   is written and the stream is handed back untouched by dropping it
    /// - `Error::InvalidHeaderValue` or `Error::Io` if the 101 response
    ///   cannot be written
    ///
    /// Protocol violations after the upgrade are not errors; they end the
    /// session with [`Outcome::ProtocolError`].
    pub async fn serve(self, handler: &dyn Handler) -> Result<Outcome> {
        let Self {
            io,
            request,
            config,
        } = self;

        request.validate()?;
        let accept = compute_accept_key(request.key().unwrap_or_default());
        let path = request.path.clone();

        let (reader, writer) = tokio::io::split(io);
        let server = Server::new(request, Box::new(writer));

        let mut out = server.lock_outbound().await;
        server.advance(SessionState::Connecting);
        tracing::debug!(path = %path, "connecting");

        let Some(mut session) = handler.on_connect(&server).await else {
            tracing::debug!(path = %path, "connection refused by handler");
            let sink = out.detach();
            drop(out);
            server.advance(SessionState::Disconnected);
            if let Some(mut sink) = sink {
                let _ = sink.shutdown().await;
            }
            return Ok(Outcome::Refused);
        };

        let response = HandshakeResponse {
            accept,
            protocol: server.chosen_protocol(),
            headers: server.take_response_headers(),
        };
        let mut head = Vec::new();
        let written = match response.write(&mut head) {
            Ok(()) => out.write_raw(&head).await,
            Err(e) => Err(e),
        };
        drop(out);

        if let Err(e) = written {
            tracing::warn!(path = %path, error = %e, "failed to write upgrade response");
            teardown(&server, session.as_mut()).await;
            return Err(e);
        }

        server.advance(SessionState::Open);
        tracing::debug!(
            path = %path,
            protocol = ?response.protocol,
            "session open"
        );

        let outcome = read_loop(reader, &server, session.as_mut(), &config).await;
        tracing::debug!(path = %path, outcome = ?outcome, "session closing");

        match &outcome {
            Outcome::ProtocolError(e) => {
                tracing::warn!(path = %path, error = %e, "protocol violation");
                if let Some(code) = e.close_code() {
                    let _ = server.close_with(code, "").await;
                }
            }
            Outcome::PeerClosed(Some(frame)) => {
                // Already validated; allowed reserved codes go back as-is.
                server
                    .send(MessageType::Close, &frame.code.as_u16().to_be_bytes())
                    .await;
            }
            Outcome::PeerClosed(None) | Outcome::EndOfStream | Outcome::Io(_) => {
                server.close().await;
            }
            Outcome::LocalClosed | Outcome::Refused => {}
        }

        teardown(&server, session.as_mut()).await;
        tracing::debug!(path = %path, "session disconnected");
        Ok(outcome)
    }
}

/// Read blocks and dispatch events until the session has to close.
async fn read_loop<R>(
    mut reader: R,
    server: &Server,
    session: &mut dyn Session,
    config: &Config,
) -> Outcome
where
    R: AsyncRead + Unpin,
{
    let mut reassembler = FrameReassembler::new(config.limits.clone());
    let mut block = vec![0u8; config.read_block_size.max(1)];
    let mut events = Vec::new();

    loop {
        if server.is_closing() {
            return Outcome::LocalClosed;
        }

        let n = tokio::select! {
            read = reader.read(&mut block) => match read {
                Ok(0) => return Outcome::EndOfStream,
                Ok(n) => n,
                Err(e) => return Outcome::Io(e.into()),
            },
            () = server.closed() => return Outcome::LocalClosed,
        };

        let fed = reassembler.feed(&block[..n], &mut events);
        if let Some(outcome) = dispatch(server, session, &mut events, config).await {
            return outcome;
        }
        if let Err(e) = fed {
            return Outcome::ProtocolError(e);
        }
    }
}

/// Act on events in wire order. Stops early once the session is closing.
async fn dispatch(
    server: &Server,
    session: &mut dyn Session,
    events: &mut Vec<Event>,
    config: &Config,
) -> Option<Outcome> {
    for event in events.drain(..) {
        match event {
            Event::Message { kind, payload } => {
                let consumed = session.on_message(server, kind, &payload).await;
                tracing::trace!(kind = %kind, len = payload.len(), consumed, "message delivered");
                if server.is_closing() {
                    return Some(Outcome::LocalClosed);
                }
            }
            Event::Ping(payload) => {
                server.send(MessageType::Pong, &payload).await;
            }
            Event::Close(payload) => return Some(peer_closed(&payload, config)),
        }
    }
    None
}

/// Check the status code of a received close frame.
fn peer_closed(payload: &[u8], config: &Config) -> Outcome {
    if payload.len() == 1 {
        return Outcome::ProtocolError(Error::ProtocolViolation(
            "Close payload too short for a status code".into(),
        ));
    }
    match CloseFrame::parse(payload) {
        Some(frame) if !frame.code.is_valid_inbound(config.allow_reserved_status_codes) => {
            Outcome::ProtocolError(Error::InvalidCloseCode(frame.code.as_u16()))
        }
        frame => Outcome::PeerClosed(frame),
    }
}

/// Detach the output, tell the handler, shut the stream down.
async fn teardown(server: &Server, session: &mut dyn Session) {
    let sink = server.detach().await;
    server.advance(SessionState::Disconnected);
    session.on_disconnect(server).await;
    if let Some(mut sink) = sink {
        let _ = sink.shutdown().await;
    }
}
