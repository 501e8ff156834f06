//! Test fixtures and data generators
//!
//! Ids are unique per process so tests sharing a server never collide.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use chat_common::{Claims, JwtService, TokenType};
use chat_core::UserId;
use serde_json::json;

static ID_COUNTER: AtomicI64 = AtomicI64::new(1_000);

/// Generate a unique id for rooms and users
pub fn unique_id() -> i64 {
    ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A `chat` frame as a client would send it
pub fn chat_frame(content: &str) -> String {
    json!({ "type": "chat", "content": content }).to_string()
}

/// A `chat` frame carrying an attachment reference
pub fn chat_frame_with_attachment(content: &str, attachment: &str) -> String {
    json!({ "type": "chat", "content": content, "attachment": attachment }).to_string()
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// An access token whose `exp` is an hour in the past
pub fn expired_token(jwt: &JwtService, user_id: i64) -> Result<String> {
    let now = now_secs();
    Ok(jwt.encode_claims(&Claims {
        user_id: UserId::new(user_id),
        token_type: TokenType::Access,
        iat: now - 7_200,
        exp: now - 3_600,
        jti: None,
        username: None,
    })?)
}

/// A well-formed refresh token, which the gateway must not accept
pub fn refresh_token(jwt: &JwtService, user_id: i64) -> Result<String> {
    let now = now_secs();
    Ok(jwt.encode_claims(&Claims {
        user_id: UserId::new(user_id),
        token_type: TokenType::Refresh,
        iat: now,
        exp: now + 3_600,
        jti: None,
        username: None,
    })?)
}
