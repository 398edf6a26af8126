//! Configuration and limits for upgraded connections.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default per-frame payload limit: 32 MiB.
pub const DEFAULT_PAYLOAD_LIMIT: u64 = 32 * 1024 * 1024;

/// Default inbound read block size.
pub const DEFAULT_READ_BLOCK_SIZE: usize = 4096;

/// Resource limits enforced by the reassembler and the host.
///
/// Every limit is checked before the corresponding allocation is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum declared payload length of a single frame.
    ///
    /// Default: 32 MiB
    pub max_payload_size: u64,

    /// Maximum size of a reassembled message, summed across fragments.
    /// Also bounds control frame payloads.
    ///
    /// Default: 32 MiB
    pub max_message_size: u64,

    /// Maximum size of the upgrade request head in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_PAYLOAD_LIMIT,
            max_message_size: DEFAULT_PAYLOAD_LIMIT,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_payload_size: u64, max_message_size: u64, max_handshake_size: usize) -> Self {
        Self {
            max_payload_size,
            max_message_size,
            max_handshake_size,
        }
    }

    /// Validate a declared frame payload length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_payload_size(&self, size: u64) -> Result<()> {
        if size > self.max_payload_size {
            Err(Error::FrameTooLarge {
                size,
                max: self.max_payload_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate the size a message would reach after appending a frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: u64) -> Result<()> {
        if size > self.max_message_size {
            Err(Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Size of the block handed to the reassembler per read.
    ///
    /// Default: 4 KB (4096)
    pub read_block_size: usize,

    /// Time allowed for the client to deliver its upgrade request.
    ///
    /// Once upgraded, a session has no idle timeout.
    /// Default: 30 seconds
    pub handshake_timeout: Option<Duration>,

    /// Accept close codes held back for future protocol use (1004,
    /// 1012-1014, 1016-2999) from the peer instead of failing with 1002.
    /// 1005, 1006 and 1015 are refused either way.
    ///
    /// Default: false
    pub allow_reserved_status_codes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            read_block_size: DEFAULT_READ_BLOCK_SIZE,
            handshake_timeout: Some(Duration::from_secs(30)),
            allow_reserved_status_codes: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the read block size. Values below one byte are raised to one.
    #[must_use]
    pub fn with_read_block_size(mut self, size: usize) -> Self {
        self.read_block_size = size.max(1);
        self
    }

    /// Set or disable the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Accept or refuse reserved close codes from the peer.
    #[must_use]
    pub fn with_allow_reserved_status_codes(mut self, allow: bool) -> Self {
        self.allow_reserved_status_codes = allow;
        self
    }
}
