//! # chat-db
//!
//! Repository implementations for the rooms and messages the gateway reads
//! and writes.
//!
//! ## Overview
//!
//! The tables belong to the CRUD service; this crate only touches the columns
//! the gateway needs:
//!
//! - `chats` / `chats_members` for membership and the last-message preview
//! - `messages` for appending new messages and listing a room's history
//!
//! An in-memory implementation of both traits backs tests and local runs.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_db::{create_pool, DatabaseConfig, PgMessageRepository, PgRoomRepository};
//!
//! let pool = create_pool(&DatabaseConfig::from(&app_config.database)).await?;
//! let rooms = PgRoomRepository::new(pool.clone());
//! let messages = PgMessageRepository::new(pool);
//! ```

pub mod mappers;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use memory::{InMemoryMessageRepository, InMemoryRoomRepository};
pub use pool::{create_pool, DatabaseConfig, PgPool};
pub use repositories::{PgMessageRepository, PgRoomRepository};
