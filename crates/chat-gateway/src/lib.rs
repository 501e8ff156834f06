//! # chat-gateway
//!
//! WebSocket gateway for real-time room chat.
//!
//! A client connects to `/ws/chat/{room_id}` with a bearer token. The session
//! verifies the token, checks room membership once, subscribes the connection
//! to the room and then persists and fans out every chat frame it sends.

pub mod broadcast;
pub mod connection;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use server::{create_app, create_gateway_state, run, serve, GatewayState};
