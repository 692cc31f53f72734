//! Send a (possibly threaded, possibly rich) reply into a room.

use super::{MessagingClient, MessagingError};
use crate::content::format_reply;
use crate::event::ROOM_MESSAGE_EVENT;

/// Send `text` to `room_id` as an `m.room.message`.
///
/// `thread` attaches the reply to the thread rooted at `root_event_id`; `rich` renders the text as markdown.
/// Returns the id of the sent event. Client errors are returned unchanged.
pub async fn send_reply<C: MessagingClient + ?Sized>(
    client: &C,
    room_id: &str,
    root_event_id: &str,
    text: &str,
    thread: bool,
    rich: bool,
) -> Result<String, MessagingError> {
    let content = format_reply(root_event_id, text, thread, rich);
    let content = serde_json::to_value(&content)?;
    client.send_event(room_id, ROOM_MESSAGE_EVENT, content).await
}
