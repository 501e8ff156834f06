//! Message ingestion pipeline

use super::IngestResult;
use crate::protocol::ClientFrame;
use chat_core::{Identity, Message, MessageRepository, NewMessage, RoomId, RoomRepository};
use std::sync::Arc;

/// Longest preview written to a room's last-message cache, in bytes
pub const LAST_MESSAGE_PREVIEW_LEN: usize = 255;

/// Validates, persists and hands back one inbound chat message
#[derive(Clone)]
pub struct MessageIngestor {
    messages: Arc<dyn MessageRepository>,
    rooms: Arc<dyn RoomRepository>,
}

impl MessageIngestor {
    pub fn new(messages: Arc<dyn MessageRepository>, rooms: Arc<dyn RoomRepository>) -> Self {
        Self { messages, rooms }
    }

    /// Ingest a raw text frame.
    ///
    /// `Ok(None)` means the frame carried no content and was dropped silently.
    /// The message id and timestamp come from the repository.
    pub async fn ingest(
        &self,
        identity: &Identity,
        room_id: RoomId,
        raw: &str,
    ) -> IngestResult<Option<Message>> {
        let ClientFrame::Chat {
            content,
            attachment,
        } = ClientFrame::parse(raw)?;

        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let new_message =
            NewMessage::new(room_id, identity.id(), content).with_attachment(attachment);
        let message = self.messages.create(new_message).await?;

        self.touch_room(&message).await;

        Ok(Some(message))
    }

    /// Best-effort update of the room's last-message cache
    async fn touch_room(&self, message: &Message) {
        let preview = message.preview(LAST_MESSAGE_PREVIEW_LEN);
        if let Err(e) = self.rooms.touch_last_message(message.room_id, preview).await {
            tracing::warn!(
                room_id = %message.room_id,
                message_id = %message.id,
                error = %e,
                "Failed to update room last message"
            );
        }
    }
}

impl std::fmt::Debug for MessageIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageIngestor").finish_non_exhaustive()
    }
}
