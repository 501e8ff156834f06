//! WebSocket close codes
//!
//! Codes the gateway sends when it ends a connection.

use serde::{Deserialize, Serialize};

/// Gateway WebSocket close codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Server is shutting down
    GoingAway = 1001,
    /// Unknown error occurred
    UnknownError = 4000,
    /// Not a member of the room, or the room does not exist
    AccessDenied = 4003,
    /// Missing, malformed, expired or forged credential
    AuthenticationFailed = 4004,
    /// Nothing received for longer than the idle timeout
    SessionTimeout = 4009,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1001 => Some(Self::GoingAway),
            4000 => Some(Self::UnknownError),
            4003 => Some(Self::AccessDenied),
            4004 => Some(Self::AuthenticationFailed),
            4009 => Some(Self::SessionTimeout),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if the client should attempt to reconnect after this close code
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        matches!(
            self,
            Self::GoingAway | Self::UnknownError | Self::SessionTimeout
        )
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::GoingAway => "Server shutting down",
            Self::UnknownError => "Unknown error occurred",
            Self::AccessDenied => "Access denied",
            Self::AuthenticationFailed => "Authentication failed",
            Self::SessionTimeout => "Session timeout",
        }
    }

    /// Get the name of this close code
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GoingAway => "GoingAway",
            Self::UnknownError => "UnknownError",
            Self::AccessDenied => "AccessDenied",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::SessionTimeout => "SessionTimeout",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
