//! Ports consumed by the gateway

mod repositories;
mod verifier;

pub use repositories::{MessageQuery, MessageRepository, RepoResult, RoomRepository};
pub use verifier::IdentityVerifier;
