//! Matrix channel: restore a session from config, send events, and run the sync loop.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lib::config::{self, Config};
use lib::handler::{HandleOutcome, MessageHandler};
use lib::inference::TextGeneration;
use lib::messaging::{MessagingClient, MessagingError};
use matrix_sdk::authentication::{matrix::MatrixSession, SessionTokens};
use matrix_sdk::config::SyncSettings;
use matrix_sdk::ruma::api::client::receipt::create_receipt::v3::ReceiptType;
use matrix_sdk::ruma::events::receipt::ReceiptThread;
use matrix_sdk::ruma::events::room::member::StrippedRoomMemberEvent;
use matrix_sdk::ruma::events::room::message::RoomMessageEventContent;
use matrix_sdk::ruma::events::AnySyncTimelineEvent;
use matrix_sdk::ruma::serde::Raw;
use matrix_sdk::ruma::{EventId, RoomId, UserId};
use matrix_sdk::{Client, Room, RoomState, SessionMeta};
use std::path::Path;
use std::sync::Arc;

/// Device id used when the config does not name the session's device.
const DEFAULT_DEVICE_ID: &str = "HFBOT";

const JOIN_ATTEMPTS: u32 = 3;

/// Message handler as used by the sync loop.
pub type BotHandler = MessageHandler<MatrixChannel, dyn TextGeneration>;

/// Matrix connection backed by a matrix-sdk client with a restored session.
pub struct MatrixChannel {
    client: Client,
    user_id: String,
}

impl MatrixChannel {
    /// Build the client (sqlite store under the configured store path) and restore the session from the configured access token.
    pub async fn connect(config: &Config, config_path: &Path) -> Result<Self> {
        let homeserver = config::resolve_homeserver_url(config).context(
            "matrix homeserver not configured (matrix.homeserverUrl or MATRIX_HOMESERVER_URL)",
        )?;
        let user_id = config::resolve_bot_user_id(config)
            .context("matrix user id not configured (matrix.userId or MATRIX_BOT_USERNAME)")?;
        let access_token = config::resolve_access_token(config).context(
            "matrix access token not configured (matrix.accessToken or MATRIX_ACCESS_TOKEN)",
        )?;
        let store = config::resolve_store_path(config, config_path);
        tokio::fs::create_dir_all(&store)
            .await
            .with_context(|| format!("creating matrix store directory {}", store.display()))?;

        let client = Client::builder()
            .homeserver_url(&homeserver)
            .sqlite_store(&store, None)
            .build()
            .await
            .context("building matrix client")?;

        let device_id = config
            .matrix
            .device_id
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string());
        let session = MatrixSession {
            meta: SessionMeta {
                user_id: UserId::parse(&user_id).context("invalid matrix user id")?,
                device_id: device_id.into(),
            },
            tokens: SessionTokens {
                access_token,
                refresh_token: None,
            },
        };
        client
            .restore_session(session)
            .await
            .context("restoring matrix session from access token")?;
        log::info!("matrix: session restored for {} on {}", user_id, homeserver);

        Ok(Self { client, user_id })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn room(&self, room_id: &str) -> Result<Room, MessagingError> {
        let id = RoomId::parse(room_id)
            .map_err(|e| MessagingError::InvalidId(format!("{}: {}", room_id, e)))?;
        self.client
            .get_room(&id)
            .ok_or_else(|| MessagingError::RoomNotFound(room_id.to_string()))
    }

    /// Sync until the connection fails. The backlog from the initial sync is skipped, so only
    /// events arriving after startup reach `handler`. Each event is handled on its own task.
    pub async fn run(&self, handler: Arc<BotHandler>, auto_join: bool) -> Result<()> {
        let initial = self
            .client
            .sync_once(SyncSettings::default())
            .await
            .context("initial matrix sync")?;
        log::info!("matrix: initial sync done, listening for messages");

        self.client.add_event_handler(
            move |raw: Raw<AnySyncTimelineEvent>, room: Room| {
                let handler = handler.clone();
                async move {
                    let event: serde_json::Value = match serde_json::from_str(raw.json().get()) {
                        Ok(v) => v,
                        Err(e) => {
                            log::debug!("matrix: undecodable timeline event: {}", e);
                            return;
                        }
                    };
                    let room_id = room.room_id().to_string();
                    tokio::spawn(async move {
                        match handler.handle(&room_id, &event).await {
                            HandleOutcome::Replied { reply_event_id, .. } => {
                                log::debug!("matrix: replied in {} with {}", room_id, reply_event_id);
                            }
                            HandleOutcome::Failed => {
                                log::debug!("matrix: reply in {} failed, error notice sent", room_id);
                            }
                            HandleOutcome::Ignored(_) => {}
                        }
                    });
                }
            },
        );

        if auto_join {
            self.client.add_event_handler(
                |event: StrippedRoomMemberEvent, client: Client, room: Room| async move {
                    let is_self = client
                        .user_id()
                        .is_some_and(|me| event.state_key == *me);
                    if !is_self || room.state() != RoomState::Invited {
                        return;
                    }
                    log::info!("matrix: auto-joining invited room {}", room.room_id());
                    for attempt in 1..=JOIN_ATTEMPTS {
                        match room.join().await {
                            Ok(_) => {
                                log::info!("matrix: joined {}", room.room_id());
                                return;
                            }
                            Err(e) => {
                                log::warn!(
                                    "matrix: joining {} failed (attempt {}): {}",
                                    room.room_id(),
                                    attempt,
                                    e
                                );
                                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                            }
                        }
                    }
                },
            );
        }

        let settings = SyncSettings::default().token(initial.next_batch);
        self.client
            .sync(settings)
            .await
            .context("matrix sync loop")?;
        log::info!("matrix: sync loop stopped");
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for MatrixChannel {
    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: serde_json::Value,
    ) -> Result<String, MessagingError> {
        let room = self.room(room_id)?;
        let response = room
            .send_raw(event_type, content)
            .await
            .map_err(|e| MessagingError::Send(e.to_string()))?;
        Ok(response.event_id.to_string())
    }

    async fn send_text(&self, room_id: &str, text: &str) -> Result<String, MessagingError> {
        let room = self.room(room_id)?;
        let response = room
            .send(RoomMessageEventContent::text_plain(text))
            .await
            .map_err(|e| MessagingError::Send(e.to_string()))?;
        Ok(response.event_id.to_string())
    }

    /// matrix-sdk picks the typing timeout itself; `timeout_ms` is not forwarded.
    async fn set_typing(
        &self,
        room_id: &str,
        typing: bool,
        _timeout_ms: u64,
    ) -> Result<(), MessagingError> {
        let room = self.room(room_id)?;
        room.typing_notice(typing)
            .await
            .map_err(|e| MessagingError::Send(e.to_string()))
    }

    async fn send_read_receipt(&self, room_id: &str, event_id: &str) -> Result<(), MessagingError> {
        let room = self.room(room_id)?;
        let event_id = EventId::parse(event_id)
            .map_err(|e| MessagingError::InvalidId(format!("{}: {}", event_id, e)))?;
        room.send_single_receipt(ReceiptType::Read, ReceiptThread::Unthreaded, event_id)
            .await
            .map_err(|e| MessagingError::Send(e.to_string()))
    }
}
