//! # chat-core
//!
//! Domain layer for the chat gateway: identities, rooms, messages, and the
//! collaborator traits (repositories, identity verifier) the gateway consumes.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Identity, Message, NewMessage, Room};
pub use error::{AuthError, DomainError};
pub use traits::{
    IdentityVerifier, MessageQuery, MessageRepository, RepoResult, RoomRepository,
};
pub use value_objects::{IdParseError, MessageId, RoomId, UserId};
