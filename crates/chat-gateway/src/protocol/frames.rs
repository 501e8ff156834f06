//! Wire frames
//!
//! Inbound text frames are decoded once into a [`ClientFrame`] and matched
//! exhaustively. Outbound chat messages are [`ChatFrame`]s.

use chat_core::{Identity, Message, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frame type assumed when the client omits `type`
pub const CHAT_FRAME_TYPE: &str = "chat";

/// Errors decoding an inbound frame
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unknown frame type: {0}")]
    UnknownType(String),

    #[error("binary frames are not supported")]
    Binary,
}

/// Inbound frame as it appears on the wire; unknown fields are ignored
#[derive(Debug, Deserialize)]
struct RawClientFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    attachment: Option<String>,
}

/// A decoded client frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// A chat message for the connection's room
    Chat {
        /// Raw content, possibly blank
        content: String,
        attachment: Option<String>,
    },
}

impl ClientFrame {
    /// Decode a text frame.
    ///
    /// A missing `content` decodes to an empty chat frame; dropping it is the
    /// caller's business.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let raw: RawClientFrame = serde_json::from_str(text)?;

        match raw.kind.as_deref() {
            None | Some(CHAT_FRAME_TYPE) => Ok(Self::Chat {
                content: raw.content.unwrap_or_default(),
                attachment: raw.attachment.filter(|a| !a.trim().is_empty()),
            }),
            Some(other) => Err(FrameError::UnknownType(other.to_string())),
        }
    }
}

/// Outbound chat message frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    pub id: MessageId,
    pub sender: UserId,
    pub sender_username: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

impl ChatFrame {
    /// Build the frame for a persisted message sent by `sender`
    pub fn from_message(message: &Message, sender: &Identity) -> Self {
        Self {
            id: message.id,
            sender: message.sender_id,
            sender_username: sender.display_name().to_string(),
            content: message.content.clone(),
            timestamp: message.created_at,
            attachment: message.attachment.clone(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::RoomId;

    #[test]
    fn test_parse_chat_frame() {
        let frame = ClientFrame::parse(r#"{"content": "hi"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Chat {
                content: "hi".to_string(),
                attachment: None
            }
        );
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let frame =
            ClientFrame::parse(r#"{"type": "chat", "content": "hi", "client_ts": 1}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Chat { content, .. } if content == "hi"));
    }

    #[test]
    fn test_parse_missing_content_is_empty() {
        let frame = ClientFrame::parse("{}").unwrap();
        assert!(matches!(frame, ClientFrame::Chat { content, .. } if content.is_empty()));
    }

    #[test]
    fn test_parse_attachment() {
        let frame = ClientFrame::parse(
            r#"{"content": "look", "attachment": "https://cdn.example.com/cat.png"}"#,
        )
        .unwrap();
        let ClientFrame::Chat { attachment, .. } = frame;
        assert_eq!(attachment.as_deref(), Some("https://cdn.example.com/cat.png"));

        let ClientFrame::Chat { attachment, .. } =
            ClientFrame::parse(r#"{"content": "x", "attachment": "  "}"#).unwrap();
        assert!(attachment.is_none());
    }

    #[test]
    fn test_parse_rejects_bad_frames() {
        assert!(matches!(
            ClientFrame::parse("not json"),
            Err(FrameError::Decode(_))
        ));
        assert!(matches!(
            ClientFrame::parse(r#"{"content": 42}"#),
            Err(FrameError::Decode(_))
        ));
        assert!(matches!(
            ClientFrame::parse(r#"{"type": "typing"}"#),
            Err(FrameError::UnknownType(t)) if t == "typing"
        ));
    }

    #[test]
    fn test_chat_frame_shape() {
        let created_at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let message = chat_core::NewMessage::new(RoomId::new(7), UserId::new(3), "hi")
            .into_message(MessageId::new(11), created_at);
        let sender = Identity::new(UserId::new(3), "alice");

        let frame = ChatFrame::from_message(&message, &sender);
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        assert_eq!(value["id"], 11);
        assert_eq!(value["sender"], 3);
        assert_eq!(value["sender_username"], "alice");
        assert_eq!(value["content"], "hi");
        assert!(value["timestamp"].as_str().unwrap().starts_with("2024-05-01T12:00:00"));
        assert!(value.get("attachment").is_none());

        let back = ChatFrame::from_json(&frame.to_json().unwrap()).unwrap();
        assert_eq!(back, frame);
    }
}
