//! Gateway protocol definitions
//!
//! Defines the WebSocket frame formats and close codes.

mod close_codes;
mod frames;

pub use close_codes::CloseCode;
pub use frames::{ChatFrame, ClientFrame, FrameError, CHAT_FRAME_TYPE};
