//! Session lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single connection
///
/// ```text
/// Connecting -> Authenticating -> Authorizing -> Open -> Closing -> Closed
///                     |               |
///                     +---------------+--> Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Transport accepted, handshake not finished
    Connecting,
    /// Verifying the bearer credential
    Authenticating,
    /// Checking room membership
    Authorizing,
    /// Subscribed; frames are ingested and published
    Open,
    /// Transport closed, cleanup running
    Closing,
    /// Cleanup finished
    Closed,
    /// Refused before any subscription was created
    Rejected,
}

impl SessionState {
    /// Whether the lifecycle may move from `self` to `next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticating)
                | (Self::Authenticating, Self::Authorizing | Self::Rejected)
                | (Self::Authorizing, Self::Open | Self::Rejected)
                | (Self::Open, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Rejected)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Authorizing => "authorizing",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempted transition that the lifecycle does not allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}
