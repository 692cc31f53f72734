//! Messaging client capability and the outbound operations built on it.
//!
//! The bot never talks to the homeserver directly: replies and error notices go through
//! [`MessagingClient`], implemented by the Matrix adapter (and by in-memory fakes in tests).

mod notify;
mod reply;

pub use notify::{send_error, TYPING_STOP_TIMEOUT_MS};
pub use reply::send_reply;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("room not found (not joined?): {0}")]
    RoomNotFound(String),
    #[error("encoding message content failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("send failed: {0}")]
    Send(String),
}

/// Operations the bot needs from a messaging client. Room and event ids are passed as strings.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Send a room event of `event_type` with raw JSON content. Returns the new event id.
    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: serde_json::Value,
    ) -> Result<String, MessagingError>;

    /// Send a plain `m.text` message. Returns the new event id.
    async fn send_text(&self, room_id: &str, text: &str) -> Result<String, MessagingError>;

    /// Start or stop the typing indicator. `timeout_ms` bounds how long a started indicator stays visible.
    async fn set_typing(
        &self,
        room_id: &str,
        typing: bool,
        timeout_ms: u64,
    ) -> Result<(), MessagingError>;

    /// Mark `event_id` as read.
    async fn send_read_receipt(&self, room_id: &str, event_id: &str) -> Result<(), MessagingError>;
}

#[cfg(test)]
pub(crate) mod recording;
