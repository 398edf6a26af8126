//! Minimal client: sends the upgrade request, writes masked frames and
//! reads the server's unmasked ones.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use wsplug::OpCode;
use wsplug::protocol::frame::encode_client_frame;

pub const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
pub const ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";
const MASK: [u8; 4] = [0x5a, 0x17, 0xc3, 0x81];

/// Response head received for the upgrade request.
#[derive(Debug)]
pub struct Upgrade {
    pub status: u16,
    /// Lowercase header names.
    pub headers: HashMap<String, String>,
}

impl Upgrade {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

pub struct TestClient {
    stream: BufReader<TcpStream>,
}

impl TestClient {
    /// Connect and upgrade with the default headers.
    pub async fn connect(addr: SocketAddr, path: &str) -> io::Result<(Self, Upgrade)> {
        Self::connect_with(addr, path, &[]).await
    }

    /// Connect and send an upgrade request with `extra` headers appended.
    pub async fn connect_with(
        addr: SocketAddr,
        path: &str,
        extra: &[(&str, &str)],
    ) -> io::Result<(Self, Upgrade)> {
        let mut request = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {addr}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {KEY}\r\n\
             Sec-WebSocket-Version: 7\r\n"
        );
        for (name, value) in extra {
            request.push_str(&format!("{name}: {value}\r\n"));
        }
        request.push_str("\r\n");
        Self::connect_raw(addr, request.as_bytes()).await
    }

    /// Send `request` verbatim and read the response head.
    pub async fn connect_raw(addr: SocketAddr, request: &[u8]) -> io::Result<(Self, Upgrade)> {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(request).await?;
        let mut client = Self {
            stream: BufReader::new(stream),
        };
        let upgrade = client.read_head().await?;
        Ok((client, upgrade))
    }

    async fn read_head(&mut self) -> io::Result<Upgrade> {
        let mut status = 0;
        let mut headers = HashMap::new();
        let mut first = true;
        loop {
            let mut line = String::new();
            if self.stream.read_line(&mut line).await? == 0 {
                if first {
                    return Err(io::ErrorKind::UnexpectedEof.into());
                }
                break;
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if first {
                status = line
                    .split_whitespace()
                    .nth(1)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                first = false;
            } else if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
        Ok(Upgrade { status, headers })
    }

    pub async fn send(&mut self, fin: bool, opcode: OpCode, payload: &[u8]) -> io::Result<()> {
        let frame = encode_client_frame(fin, opcode, payload, MASK);
        self.send_raw(&frame).await
    }

    pub async fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.send(true, OpCode::Text, text.as_bytes()).await
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(bytes).await?;
        stream.flush().await
    }

    /// Next frame, or `None` once the server has closed the stream.
    pub async fn recv(&mut self) -> io::Result<Option<Frame>> {
        let mut head = [0u8; 2];
        match self.stream.read_exact(&mut head).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        assert_eq!(head[1] & 0x80, 0, "server frames are never masked");
        let len = match head[1] & 0x7F {
            126 => u64::from(self.stream.read_u16().await?),
            127 => self.stream.read_u64().await?,
            n => u64::from(n),
        };
        let mut payload = vec![0u8; len as usize];
        self.stream.read_exact(&mut payload).await?;
        Ok(Some(Frame {
            fin: head[0] & 0x80 != 0,
            opcode: head[0] & 0x0F,
            payload,
        }))
    }

    /// Next frame's payload as text; panics on a non-text frame.
    pub async fn recv_text(&mut self) -> io::Result<Option<String>> {
        Ok(self.recv().await?.map(|frame| {
            assert_eq!(frame.opcode, 0x1, "expected text frame, got {frame:?}");
            frame.text()
        }))
    }

    /// Everything up to the end of the stream.
    pub async fn recv_all(&mut self) -> io::Result<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.recv().await? {
            frames.push(frame);
        }
        Ok(frames)
    }

    pub async fn close(&mut self) -> io::Result<()> {
        self.send(true, OpCode::Close, &1000u16.to_be_bytes()).await
    }
}
