//! Inbound event handling: classify, build the prompt, call the model, reply in the room.
//! Failures after a question was accepted are reported back into the room via [`send_error`].

use serde_json::Value;
use std::sync::Arc;

use crate::config::{self, Config};
use crate::conversation::ConversationStore;
use crate::event::{InboundEvent, MessageEvent};
use crate::inference::{InferenceError, TextGeneration};
use crate::messaging::{
    send_error, send_reply, MessagingClient, MessagingError, TYPING_STOP_TIMEOUT_MS,
};
use crate::prompt::PromptBuilder;
use crate::username::parse_username_pretty;

const EDIT_REL_TYPE: &str = "m.replace";

/// Reply behaviour, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Bot's own user id; its messages are ignored.
    pub bot_user_id: Option<String>,
    /// Required message prefix outside threads the bot already answered in.
    pub prefix: Option<String>,
    pub threads: bool,
    pub rich_text: bool,
    pub typing_timeout_ms: u64,
    /// Text posted into the room when answering fails.
    pub error_message: String,
}

impl HandlerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bot_user_id: config::resolve_bot_user_id(config),
            prefix: config
                .matrix
                .prefix
                .as_ref()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            threads: config.matrix.threads,
            rich_text: config.matrix.rich_text,
            typing_timeout_ms: config.matrix.typing_timeout_ms,
            error_message: config::resolve_error_message(config),
        }
    }
}

/// Why an event was not answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAMessage,
    OwnMessage,
    NotText,
    Edit,
    EmptyBody,
    MissingPrefix,
}

/// Result of handling one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Ignored(IgnoreReason),
    Replied {
        root_event_id: String,
        reply_event_id: String,
    },
    /// Answering failed; an error notice was dispatched to the room.
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error("model returned an empty answer")]
    EmptyGeneration,
}

/// Answers room messages with the text-generation backend.
pub struct MessageHandler<C: ?Sized, G: ?Sized> {
    client: Arc<C>,
    generator: Arc<G>,
    prompt: PromptBuilder,
    conversations: ConversationStore,
    settings: HandlerSettings,
}

impl<C, G> MessageHandler<C, G>
where
    C: MessagingClient + ?Sized + 'static,
    G: TextGeneration + ?Sized,
{
    pub fn new(
        client: Arc<C>,
        generator: Arc<G>,
        prompt: PromptBuilder,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            client,
            generator,
            prompt,
            conversations: ConversationStore::new(),
            settings,
        }
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    /// Handle one raw timeline event from `room_id`. Never fails: errors are reported into the room.
    pub async fn handle(&self, room_id: &str, raw: &Value) -> HandleOutcome {
        let event = InboundEvent::classify(raw);
        let Some(message) = event.as_message() else {
            log::debug!(
                "handler: ignoring {} event in {}",
                event.event_type().unwrap_or("untyped"),
                room_id
            );
            return HandleOutcome::Ignored(IgnoreReason::NotAMessage);
        };
        let root = message.reply_root().to_string();
        let question = match self.accept(room_id, message, &root).await {
            Ok(q) => q,
            Err(reason) => {
                log::debug!(
                    "handler: ignoring message {} in {}: {:?}",
                    message.event_id,
                    room_id,
                    reason
                );
                return HandleOutcome::Ignored(reason);
            }
        };
        log::info!(
            "handler: question from {} in {}",
            parse_username_pretty(&message.sender),
            room_id
        );
        match self.respond(room_id, message, &root, &question).await {
            Ok(reply_event_id) => HandleOutcome::Replied {
                root_event_id: root,
                reply_event_id,
            },
            Err(e) => {
                log::error!("handler: answering {} in {} failed: {}", message.event_id, room_id, e);
                let _ = send_error(
                    self.client.clone(),
                    &self.settings.error_message,
                    room_id,
                    &message.event_id,
                );
                HandleOutcome::Failed
            }
        }
    }

    /// Decide whether `message` should be answered; returns the question text.
    async fn accept(
        &self,
        room_id: &str,
        message: &MessageEvent,
        root: &str,
    ) -> Result<String, IgnoreReason> {
        if self.settings.bot_user_id.as_deref() == Some(message.sender.as_str()) {
            return Err(IgnoreReason::OwnMessage);
        }
        if !message.is_text() {
            return Err(IgnoreReason::NotText);
        }
        let is_edit = message
            .content
            .relates_to
            .as_ref()
            .and_then(|r| r.rel_type.as_deref())
            == Some(EDIT_REL_TYPE);
        if is_edit {
            return Err(IgnoreReason::Edit);
        }
        let body = message.content.body.trim();
        let question = match self.settings.prefix.as_deref() {
            Some(prefix) => {
                if let Some(rest) = strip_command_prefix(body, prefix) {
                    rest
                } else if self.conversations.is_active(room_id, root).await {
                    body
                } else {
                    return Err(IgnoreReason::MissingPrefix);
                }
            }
            None => body,
        };
        if question.is_empty() {
            return Err(IgnoreReason::EmptyBody);
        }
        Ok(question.to_string())
    }

    async fn respond(
        &self,
        room_id: &str,
        message: &MessageEvent,
        root: &str,
        question: &str,
    ) -> Result<String, HandlerError> {
        if let Err(e) = self
            .client
            .set_typing(room_id, true, self.settings.typing_timeout_ms)
            .await
        {
            log::warn!("handler: typing notice in {} failed: {}", room_id, e);
        }
        let conversation = self.conversations.get_or_new(room_id, root).await;
        let output = self
            .prompt
            .send_chat_message(self.generator.as_ref(), question, &conversation)
            .await?;
        let answer = output.generated_text.trim();
        if answer.is_empty() {
            return Err(HandlerError::EmptyGeneration);
        }
        let reply_event_id = send_reply(
            self.client.as_ref(),
            room_id,
            root,
            answer,
            self.settings.threads,
            self.settings.rich_text,
        )
        .await?;
        self.conversations
            .record_answer(room_id, root, &message.event_id)
            .await;

        let (typing, receipt) = tokio::join!(
            self.client
                .set_typing(room_id, false, TYPING_STOP_TIMEOUT_MS),
            self.client.send_read_receipt(room_id, &message.event_id),
        );
        if let Err(e) = typing {
            log::warn!("handler: stopping typing in {} failed: {}", room_id, e);
        }
        if let Err(e) = receipt {
            log::warn!("handler: read receipt for {} failed: {}", message.event_id, e);
        }
        Ok(reply_event_id)
    }
}

/// `body` without `prefix` when the prefix stands alone or is followed by whitespace.
fn strip_command_prefix<'a>(body: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = body.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}
