//! Model to entity mappers
//!
//! `From<Model> for Entity` conversions from database rows to domain objects.

mod message;
mod room;

pub use message::MessageInsert;
pub use room::room_from_parts;
