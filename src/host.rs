//! Minimal TCP host: reads the upgrade request head, routes it by path and
//! runs the session.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wsplug::{Config, Host, Router, handlers::EchoHandler};
//!
//! let router = Router::new().route("/echo", Arc::new(EchoHandler));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:9001").await?;
//! Host::new(router, Config::default()).serve(listener).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::Instrument;

use crate::config::Config;
use crate::connection::{Connection, Handler, Outcome};
use crate::error::{Error, Result};
use crate::protocol::HandshakeRequest;

/// Handlers keyed by request path.
///
/// Every handler still registered when the router is dropped has its
/// [`Handler::destroy`] called.
#[derive(Default)]
pub struct Router {
    routes: HashMap<String, Arc<dyn Handler>>,
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `path`, builder style.
    #[must_use]
    pub fn route(mut self, path: &str, handler: Arc<dyn Handler>) -> Self {
        self.register(path, handler);
        self
    }

    /// Register `handler` for `path`. A handler previously registered for
    /// the same path is destroyed.
    pub fn register(&mut self, path: &str, handler: Arc<dyn Handler>) {
        if let Some(previous) = self.routes.insert(path.to_string(), handler) {
            previous.destroy();
        }
    }

    /// Remove and destroy the handler for `path`. Returns `false` if none
    /// was registered.
    pub fn unregister(&mut self, path: &str) -> bool {
        match self.routes.remove(path) {
            Some(handler) => {
                handler.destroy();
                true
            }
            None => false,
        }
    }

    /// Handler for a request target. The query string is ignored.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<Arc<dyn Handler>> {
        let path = target.split_once('?').map_or(target, |(path, _)| path);
        self.routes.get(path).cloned()
    }

    /// Number of registered paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no path is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        for (_, handler) in self.routes.drain() {
            handler.destroy();
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut paths: Vec<&String> = self.routes.keys().collect();
        paths.sort();
        f.debug_struct("Router").field("paths", &paths).finish()
    }
}

/// Accepts TCP connections and hands upgraded ones to their handler.
#[derive(Debug, Clone)]
pub struct Host {
    router: Arc<Router>,
    config: Arc<Config>,
}

impl Host {
    /// Create a host serving `router` with `config`.
    #[must_use]
    pub fn new(router: Router, config: Config) -> Self {
        Self {
            router: Arc::new(router),
            config: Arc::new(config),
        }
    }

    /// The routing table.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Accept connections forever, one task per connection.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if accepting fails.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(addr = %addr, routes = self.router.len(), "listening");
        }
        loop {
            let (stream, peer) = listener.accept().await?;
            let host = self.clone();
            let span = tracing::info_span!("connection", peer = %peer);
            tokio::spawn(
                async move {
                    match host.handle(stream).await {
                        Ok(outcome) => tracing::info!(outcome = ?outcome, "connection closed"),
                        Err(e) => tracing::info!(error = %e, "upgrade failed"),
                    }
                }
                .instrument(span),
            );
        }
    }

    /// Serve one accepted stream.
    ///
    /// A request that fails validation gets `400 Bad Request`, an unknown
    /// path `404 Not Found`. A handler refusal closes the stream with no
    /// response. A timed out request head gets nothing.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTimeout` if the head did not arrive in time
    /// - `Error::HandshakeTooLarge` or `Error::InvalidHandshake` for bad heads
    /// - `Error::NoHandler` if no handler serves the path
    /// - errors from [`Connection::serve`]
    pub async fn handle<S>(&self, stream: S) -> Result<Outcome>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let mut stream = BufReader::new(stream);
        let max = self.config.limits.max_handshake_size;

        let head = match self.config.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, read_head(&mut stream, max))
                .await
                .map_err(|_| Error::HandshakeTimeout)
                .and_then(|head| head),
            None => read_head(&mut stream, max).await,
        };

        let request = match head.and_then(|head| {
            let request = HandshakeRequest::parse_with_limit(&head, max)?;
            request.validate()?;
            Ok(request)
        }) {
            Ok(request) => request,
            Err(e @ (Error::HandshakeTimeout | Error::Io(_))) => return Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "rejecting upgrade request");
                respond(&mut stream, "400 Bad Request").await;
                return Err(e);
            }
        };

        let Some(handler) = self.router.get(&request.path) else {
            tracing::debug!(path = %request.path, "no handler registered");
            respond(&mut stream, "404 Not Found").await;
            return Err(Error::NoHandler(request.path));
        };

        tracing::info!(path = %request.path, "upgrading");
        // The buffered reader goes along so bytes read past the head are kept.
        Connection::new(stream, request, (*self.config).clone())
            .serve(handler.as_ref())
            .await
    }
}

/// Read up to and including the blank line that ends the request head.
async fn read_head<R>(reader: &mut R, max: usize) -> Result<Vec<u8>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut head = Vec::new();
    loop {
        let start = head.len();
        // One byte past the limit is enough to know the head is too large.
        let budget = (max.saturating_add(1) - start) as u64;
        let n = (&mut *reader).take(budget).read_until(b'\n', &mut head).await?;
        if head.len() > max {
            return Err(Error::HandshakeTooLarge {
                size: head.len(),
                max,
            });
        }
        if n == 0 {
            return Err(Error::InvalidHandshake(
                "Connection closed during handshake".into(),
            ));
        }
        if matches!(&head[start..], b"\r\n" | b"\n") {
            return Ok(head);
        }
    }
}

/// Write a bodiless HTTP response and close the write side.
async fn respond<W>(stream: &mut W, status: &str)
where
    W: AsyncWrite + Unpin,
{
    let response = format!("HTTP/1.1 {status}\r\nConnection: close\r\nContent-Length: 0\r\n\r\n");
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!(error = %e, "failed to write response");
        return;
    }
    let _ = stream.shutdown().await;
}
