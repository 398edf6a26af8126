//! Session lifecycle states.

/// Lifecycle state of an upgraded connection.
///
/// States only move forward: `Handshaking → Connecting → Open → Closing →
/// Disconnected`. A refused connect goes from `Connecting` straight to
/// `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[non_exhaustive]
pub enum SessionState {
    /// Upgrade request accepted, handler not yet asked.
    #[default]
    Handshaking,
    /// The handler's connect callback is running.
    Connecting,
    /// 101 response written; messages flow both ways.
    Open,
    /// A close frame was sent or received, or the stream ended.
    Closing,
    /// Output detached and the handler told.
    Disconnected,
}

impl SessionState {
    /// Returns `true` until the session is disconnected.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, SessionState::Disconnected)
    }

    /// Returns `true` while application messages may be sent.
    ///
    /// Sends issued during `Connecting` are held until the 101 response has
    /// been written, so they count as allowed.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Open)
    }

    /// Returns `true` while inbound frames are read.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        matches!(self, SessionState::Open)
    }

    pub(crate) const fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Handshaking,
            1 => SessionState::Connecting,
            2 => SessionState::Open,
            3 => SessionState::Closing,
            _ => SessionState::Disconnected,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Handshaking => write!(f, "Handshaking"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Open => write!(f, "Open"),
            SessionState::Closing => write!(f, "Closing"),
            SessionState::Disconnected => write!(f, "Disconnected"),
        }
    }
}
