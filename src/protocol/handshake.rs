//! Upgrade handshake: request parsing, validation and the 101 response.
//!
//! Only protocol revision 7 is accepted. The request head is parsed into a
//! case-insensitive header map that handlers can query after the upgrade.

use crate::error::{Error, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// GUID appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol revision accepted in `Sec-WebSocket-Version`.
pub const SUPPORTED_VERSION: &str = "7";

/// Headers that may appear at most once in an upgrade request.
const SINGLE_VALUE_HEADERS: [&str; 4] = [
    "upgrade",
    "connection",
    "sec-websocket-key",
    "sec-websocket-version",
];

/// Parse header lines into a map keyed by lowercase name.
///
/// A later duplicate replaces the earlier value, except for names listed in
/// `single`, whose duplicates are rejected.
fn parse_headers<'a, I>(lines: I, single: &[&str]) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(Error::InvalidHandshake(format!("Malformed header line: {line}")));
        };
        let name_lower = name.trim().to_ascii_lowercase();
        if single.contains(&name_lower.as_str()) && headers.contains_key(&name_lower) {
            return Err(Error::InvalidHandshake(format!(
                "Duplicate header: {}",
                name.trim()
            )));
        }
        headers.insert(name_lower, value.trim().to_string());
    }

    Ok(headers)
}

/// Reject values that would let a header spill into the next line.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHeaderValue {
            header: header_name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}

/// Derive `Sec-WebSocket-Accept` from the client's `Sec-WebSocket-Key`:
/// base64(SHA-1(key + GUID)).
///
/// # Example
///
/// ```
/// use wsplug::protocol::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Split a `Sec-WebSocket-Protocol` value on commas, spaces and tabs.
/// Empty tokens are skipped and order is kept.
#[must_use]
pub fn parse_protocols(value: &str) -> Vec<String> {
    value
        .split([',', ' ', '\t'])
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parsed upgrade request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Request method, as sent.
    pub method: String,
    /// Request target, e.g. `/chat`.
    pub path: String,
    headers: HashMap<String, String>,
}

impl HandshakeRequest {
    /// Build a request from its parts. Header names are matched
    /// case-insensitively afterwards.
    #[must_use]
    pub fn new<I, K, V>(method: &str, path: &str, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Parse a request head (request line and headers).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The data is not valid UTF-8.
    /// - The request line is missing or malformed.
    /// - The HTTP version is not `HTTP/1.1`.
    /// - A header line has no colon, or a single-value header is repeated.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;

        let mut lines = text.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty request".into()))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        let [method, path, version] = parts.as_slice() else {
            return Err(Error::InvalidHandshake("Invalid request line".into()));
        };

        if *version != "HTTP/1.1" {
            return Err(Error::InvalidHandshake(format!(
                "Expected HTTP/1.1, got {version}"
            )));
        }

        let headers = parse_headers(lines, &SINGLE_VALUE_HEADERS)?;

        Ok(Self {
            method: (*method).to_string(),
            path: (*path).to_string(),
            headers,
        })
    }

    /// Parse a request head with size limit.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTooLarge` if data exceeds `max_size`
    /// - Other handshake errors as per `parse()`
    pub fn parse_with_limit(data: &[u8], max_size: usize) -> Result<Self> {
        if data.len() > max_size {
            return Err(Error::HandshakeTooLarge {
                size: data.len(),
                max: max_size,
            });
        }
        Self::parse(data)
    }

    /// Check the upgrade preconditions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The method is not `GET`.
    /// - `Upgrade` is not `websocket` or `Connection` is not `Upgrade`
    ///   (both compared case-insensitively).
    /// - `Sec-WebSocket-Version` is not exactly `7`.
    /// - `Sec-WebSocket-Key` is missing or empty.
    pub fn validate(&self) -> Result<()> {
        if self.method != "GET" {
            return Err(Error::InvalidHandshake(format!(
                "Expected GET method, got {}",
                self.method
            )));
        }

        let upgrade = self
            .header("Upgrade")
            .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Upgrade header: {upgrade}"
            )));
        }

        let connection = self
            .header("Connection")
            .ok_or_else(|| Error::InvalidHandshake("Missing Connection header".into()))?;
        if !connection.eq_ignore_ascii_case("upgrade") {
            return Err(Error::InvalidHandshake(format!(
                "Invalid Connection header: {connection}"
            )));
        }

        match self.version() {
            Some(SUPPORTED_VERSION) => {}
            Some(other) => {
                return Err(Error::InvalidHandshake(format!(
                    "Unsupported version: {other} (expected {SUPPORTED_VERSION})"
                )));
            }
            None => {
                return Err(Error::InvalidHandshake(
                    "Missing Sec-WebSocket-Version header".into(),
                ));
            }
        }

        match self.key() {
            Some(key) if !key.is_empty() => Ok(()),
            _ => Err(Error::InvalidHandshake(
                "Missing Sec-WebSocket-Key header".into(),
            )),
        }
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All headers, keyed by lowercase name.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// `Sec-WebSocket-Key`.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.header("Sec-WebSocket-Key")
    }

    /// `Sec-WebSocket-Version`.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.header("Sec-WebSocket-Version")
    }

    /// Offered subprotocols, in the order the client listed them.
    #[must_use]
    pub fn protocols(&self) -> Vec<String> {
        self.header("Sec-WebSocket-Protocol")
            .map(parse_protocols)
            .unwrap_or_default()
    }
}

/// The 101 Switching Protocols response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// The chosen subprotocol, if any.
    pub protocol: Option<String>,
    /// Extra headers set by the handler during connect, in insertion order.
    pub headers: Vec<(String, String)>,
}

impl HandshakeResponse {
    /// Write the HTTP response head to a buffer.
    ///
    /// An extra header named like one of the built-in ones (`Upgrade`,
    /// `Connection`, `Sec-WebSocket-Accept`, `Sec-WebSocket-Protocol`)
    /// replaces its value instead of being sent twice.
    ///
    /// # Errors
    /// Returns `Error::InvalidHeaderValue` if a header name or value contains
    /// CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        let mut fields: Vec<(&str, &str)> = vec![
            ("Upgrade", "websocket"),
            ("Connection", "Upgrade"),
            ("Sec-WebSocket-Accept", self.accept.as_str()),
        ];
        if let Some(proto) = &self.protocol {
            fields.push(("Sec-WebSocket-Protocol", proto.as_str()));
        }
        for (name, value) in &self.headers {
            match fields.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
                Some(field) => field.1 = value.as_str(),
                None => fields.push((name.as_str(), value.as_str())),
            }
        }

        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        for (name, value) in fields {
            validate_header_value(name, name)?;
            validate_header_value(name, value)?;
            buf.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}
