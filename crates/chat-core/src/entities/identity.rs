//! Identity - the authenticated user behind a connection

use crate::value_objects::UserId;

/// Authenticated user reference attached to a connection.
///
/// Produced once by an [`IdentityVerifier`](crate::IdentityVerifier) and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: UserId,
    display_name: String,
}

impl Identity {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }

    /// Identity whose display name is the decimal user id
    pub fn anonymous(id: UserId) -> Self {
        Self::new(id, id.to_string())
    }

    #[inline]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[inline]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}
