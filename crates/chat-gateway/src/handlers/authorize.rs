//! Room membership guard

use chat_core::{Identity, RoomId, RoomRepository};
use std::sync::Arc;

/// Confirms that an identity belongs to a room.
///
/// A missing room and a non-member get the same answer, so the guard cannot
/// be used to discover which rooms exist. The answer is taken once per
/// connection; later membership changes apply on the next connect.
#[derive(Clone)]
pub struct MembershipGuard {
    rooms: Arc<dyn RoomRepository>,
}

impl MembershipGuard {
    pub fn new(rooms: Arc<dyn RoomRepository>) -> Self {
        Self { rooms }
    }

    /// Repository failures deny access
    pub async fn authorize(&self, identity: &Identity, room_id: RoomId) -> bool {
        match self.rooms.is_member(room_id, identity.id()).await {
            Ok(is_member) => is_member,
            Err(e) => {
                tracing::warn!(
                    room_id = %room_id,
                    user_id = %identity.id(),
                    error = %e,
                    "Membership lookup failed, denying"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for MembershipGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipGuard").finish_non_exhaustive()
    }
}
