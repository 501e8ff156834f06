//! Domain entities - core business objects

mod identity;
mod message;
mod room;

pub use identity::Identity;
pub use message::{Message, NewMessage};
pub use room::Room;
