//! Inbound room events: classify raw sync events by their `type` discriminant.
//!
//! Events arrive as untyped JSON from the messaging client. Only `m.room.message` is
//! parsed into a typed [`MessageEvent`]; everything else is kept as its type name.
//! Message fields are read leniently: a missing, null or mistyped field takes its default.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Event type of a room message.
pub const ROOM_MESSAGE_EVENT: &str = "m.room.message";

/// Relation type of a threaded reply.
pub const THREAD_REL_TYPE: &str = "m.thread";

/// Message type of a plain text message.
pub const TEXT_MSGTYPE: &str = "m.text";

/// A classified inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// `m.room.message` with its full attribute set.
    Message(MessageEvent),
    /// Any other event type (membership, reactions, state events, ...).
    Other(String),
    /// No string `type` field at all.
    Untyped,
}

impl InboundEvent {
    /// Classify a raw event by its `type` field alone. Every `m.room.message` is a `Message`;
    /// fields that are absent or malformed are defaulted.
    pub fn classify(raw: &Value) -> Self {
        let Some(event_type) = raw.get("type").and_then(Value::as_str) else {
            return InboundEvent::Untyped;
        };
        match event_type {
            ROOM_MESSAGE_EVENT => InboundEvent::Message(MessageEvent::from_value(raw)),
            other => InboundEvent::Other(other.to_string()),
        }
    }

    /// The message attributes when this is a room message.
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            InboundEvent::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_message(self) -> Option<MessageEvent> {
        match self {
            InboundEvent::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Event type name, if any.
    pub fn event_type(&self) -> Option<&str> {
        match self {
            InboundEvent::Message(_) => Some(ROOM_MESSAGE_EVENT),
            InboundEvent::Other(t) => Some(t),
            InboundEvent::Untyped => None,
        }
    }
}

/// True exactly when the raw event classifies as a room message.
pub fn is_event_a_message(raw: &Value) -> bool {
    matches!(InboundEvent::classify(raw), InboundEvent::Message(_))
}

/// Deserialize a field, falling back to its default when it is null or has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// `m.room.message` event as delivered by sync.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageEvent {
    #[serde(default, deserialize_with = "lenient")]
    pub event_id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub sender: String,
    #[serde(default, deserialize_with = "lenient")]
    pub room_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub origin_server_ts: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: MessageEventContent,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageEventContent {
    #[serde(default, deserialize_with = "lenient")]
    pub body: String,
    #[serde(default, deserialize_with = "lenient")]
    pub msgtype: String,
    #[serde(default, rename = "m.relates_to", deserialize_with = "lenient")]
    pub relates_to: Option<RelatesTo>,
}

/// Relation block on an inbound message (thread, reply, edit, ...).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RelatesTo {
    #[serde(default, deserialize_with = "lenient")]
    pub rel_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub event_id: Option<String>,
    #[serde(default, rename = "m.in_reply_to", deserialize_with = "lenient")]
    pub in_reply_to: Option<InReplyTo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InReplyTo {
    #[serde(default, deserialize_with = "lenient")]
    pub event_id: String,
}

impl MessageEvent {
    /// Message attributes of a raw event; never fails, malformed fields are defaulted.
    pub fn from_value(raw: &Value) -> Self {
        MessageEvent::deserialize(raw).unwrap_or_default()
    }

    /// Root of the thread this message belongs to, when it was sent inside a thread.
    pub fn thread_root(&self) -> Option<&str> {
        let rel = self.content.relates_to.as_ref()?;
        if rel.rel_type.as_deref() != Some(THREAD_REL_TYPE) {
            return None;
        }
        rel.event_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Event a reply should attach to: the thread root when threaded, otherwise this event.
    pub fn reply_root(&self) -> &str {
        self.thread_root().unwrap_or(&self.event_id)
    }

    pub fn is_text(&self) -> bool {
        self.content.msgtype == TEXT_MSGTYPE
    }
}
