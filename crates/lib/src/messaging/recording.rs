//! In-memory [`MessagingClient`] that records every call, for unit tests.

use super::{MessagingClient, MessagingError};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Event {
        room_id: String,
        event_type: String,
        content: serde_json::Value,
    },
    Text {
        room_id: String,
        text: String,
    },
    Typing {
        room_id: String,
        typing: bool,
        timeout_ms: u64,
    },
    Receipt {
        room_id: String,
        event_id: String,
    },
}

#[derive(Default)]
pub(crate) struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    /// When true, every operation records its call and then fails.
    pub(crate) fail: bool,
}

impl RecordingClient {
    pub(crate) fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<(), MessagingError> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            Err(MessagingError::Send("recording client set to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessagingClient for RecordingClient {
    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: serde_json::Value,
    ) -> Result<String, MessagingError> {
        self.record(Call::Event {
            room_id: room_id.to_string(),
            event_type: event_type.to_string(),
            content,
        })?;
        Ok("$sent".to_string())
    }

    async fn send_text(&self, room_id: &str, text: &str) -> Result<String, MessagingError> {
        self.record(Call::Text {
            room_id: room_id.to_string(),
            text: text.to_string(),
        })?;
        Ok("$text".to_string())
    }

    async fn set_typing(
        &self,
        room_id: &str,
        typing: bool,
        timeout_ms: u64,
    ) -> Result<(), MessagingError> {
        self.record(Call::Typing {
            room_id: room_id.to_string(),
            typing,
            timeout_ms,
        })
    }

    async fn send_read_receipt(&self, room_id: &str, event_id: &str) -> Result<(), MessagingError> {
        self.record(Call::Receipt {
            room_id: room_id.to_string(),
            event_id: event_id.to_string(),
        })
    }
}
