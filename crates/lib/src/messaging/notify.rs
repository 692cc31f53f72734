//! Error notice: stop typing, post the error text and mark the triggering event read.

use super::MessagingClient;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Timeout passed along with the typing-stop request.
pub const TYPING_STOP_TIMEOUT_MS: u64 = 500;

/// Report `text` into `room_id` without blocking the caller.
///
/// Spawns one task that stops the typing indicator, sends the text and sends a read receipt for `event_id`
/// concurrently. Failures are logged, never returned. The handle can be awaited to wait for all three.
pub fn send_error<C>(client: Arc<C>, text: &str, room_id: &str, event_id: &str) -> JoinHandle<()>
where
    C: MessagingClient + ?Sized + 'static,
{
    let text = text.to_string();
    let room_id = room_id.to_string();
    let event_id = event_id.to_string();
    tokio::spawn(async move {
        let (typing, sent, receipt) = tokio::join!(
            client.set_typing(&room_id, false, TYPING_STOP_TIMEOUT_MS),
            client.send_text(&room_id, &text),
            client.send_read_receipt(&room_id, &event_id),
        );
        if let Err(e) = typing {
            log::warn!("error notice: stopping typing in {} failed: {}", room_id, e);
        }
        if let Err(e) = sent {
            log::warn!("error notice: sending text to {} failed: {}", room_id, e);
        }
        if let Err(e) = receipt {
            log::warn!("error notice: read receipt for {} failed: {}", event_id, e);
        }
    })
}
