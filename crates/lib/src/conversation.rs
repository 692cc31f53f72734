//! Conversations the bot is part of, keyed by room and thread root.
//!
//! A conversation is stored once the bot has answered a question in a room/thread. Prompts are
//! single-turn, so the stored conversation is bookkeeping only. The store is bounded: when full,
//! the least recently answered conversation is dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Unique conversation identifier (opaque string).
pub type ConversationId = String;

/// Conversations kept before the least recently answered one is evicted.
pub const DEFAULT_MAX_CONVERSATIONS: usize = 1024;

/// Key for one conversation: room id + thread root event id.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct ConversationKey {
    pub room_id: String,
    pub root_event_id: String,
}

impl ConversationKey {
    fn new(room_id: &str, root_event_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            root_event_id: root_event_id.to_string(),
        }
    }
}

/// A conversation between the bot and a room thread.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredConversation {
    pub id: ConversationId,
    pub room_id: String,
    pub root_event_id: String,
    /// Most recent event the bot answered in this conversation.
    pub last_event_id: Option<String>,
    /// Number of questions answered so far.
    pub answered: usize,
}

impl StoredConversation {
    /// Fresh conversation with a generated id and nothing answered yet.
    pub fn new(room_id: &str, root_event_id: &str) -> Self {
        Self {
            id: format!("conv-{}", uuid::Uuid::new_v4()),
            room_id: room_id.to_string(),
            root_event_id: root_event_id.to_string(),
            last_event_id: None,
            answered: 0,
        }
    }
}

#[derive(Default)]
struct Inner {
    conversations: HashMap<ConversationKey, StoredConversation>,
    /// Keys from least to most recently answered.
    order: VecDeque<ConversationKey>,
}

/// In-memory store: (room_id, root_event_id) -> conversation. Clones share the same map.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<RwLock<Inner>>,
    max_conversations: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_CONVERSATIONS)
    }

    /// Store holding at most `max_conversations` entries (at least one).
    pub fn with_limit(max_conversations: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            max_conversations: max_conversations.max(1),
        }
    }

    /// Return a clone of the conversation if it exists.
    pub async fn get(&self, room_id: &str, root_event_id: &str) -> Option<StoredConversation> {
        let key = ConversationKey::new(room_id, root_event_id);
        self.inner.read().await.conversations.get(&key).cloned()
    }

    /// Stored conversation for this room thread, or a fresh unstored one.
    pub async fn get_or_new(&self, room_id: &str, root_event_id: &str) -> StoredConversation {
        self.get(room_id, root_event_id)
            .await
            .unwrap_or_else(|| StoredConversation::new(room_id, root_event_id))
    }

    /// True when the bot already answered inside this room thread.
    pub async fn is_active(&self, room_id: &str, root_event_id: &str) -> bool {
        self.get(room_id, root_event_id)
            .await
            .is_some_and(|c| c.answered > 0)
    }

    /// Record that `event_id` was answered, storing the conversation if it is new.
    /// Evicts the least recently answered conversation when the store is full.
    pub async fn record_answer(
        &self,
        room_id: &str,
        root_event_id: &str,
        event_id: &str,
    ) -> StoredConversation {
        let key = ConversationKey::new(room_id, root_event_id);
        let mut g = self.inner.write().await;
        if let Some(pos) = g.order.iter().position(|k| *k == key) {
            g.order.remove(pos);
        }
        g.order.push_back(key.clone());
        while g.order.len() > self.max_conversations {
            if let Some(oldest) = g.order.pop_front() {
                g.conversations.remove(&oldest);
                log::debug!(
                    "conversation: evicted {} in {}",
                    oldest.root_event_id,
                    oldest.room_id
                );
            }
        }
        let conversation = g
            .conversations
            .entry(key)
            .or_insert_with(|| StoredConversation::new(room_id, root_event_id));
        conversation.last_event_id = Some(event_id.to_string());
        conversation.answered += 1;
        conversation.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.conversations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.conversations.is_empty()
    }
}
