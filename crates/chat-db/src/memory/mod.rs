//! In-memory repositories
//!
//! Process-local implementations of the chat-core repository traits, used
//! by tests and by `STORE=memory` runs.

mod message;
mod room;

pub use message::InMemoryMessageRepository;
pub use room::InMemoryRoomRepository;
