//! Outgoing `m.room.message` content: plain or rich body, optionally threaded.
//!
//! Field names are the Matrix wire names (`org.matrix.msc1767.*` extensible-event fallbacks,
//! `m.relates_to` for threads). The body format is a sum type so plain and rich sections
//! never coexist; the thread relation is an optional additive section.

use serde::{Deserialize, Serialize};

use crate::event::{TEXT_MSGTYPE, THREAD_REL_TYPE};
use crate::markdown::render_markdown;

/// `format` value for HTML formatted bodies.
pub const HTML_FORMAT: &str = "org.matrix.custom.html";

pub const MIMETYPE_PLAIN: &str = "text/plain";
pub const MIMETYPE_HTML: &str = "text/html";

/// Content of a room message sent by the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    /// Raw reply text, always present.
    pub body: String,
    pub msgtype: String,
    #[serde(flatten)]
    pub format: BodyFormat,
    #[serde(
        rename = "m.relates_to",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relates_to: Option<ThreadRelation>,
}

/// Plain-only or rich (HTML) body section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyFormat {
    Rich {
        format: String,
        formatted_body: String,
        /// Plain and HTML representations, each tagged with its mimetype.
        #[serde(rename = "org.matrix.msc1767.message")]
        representations: Vec<Representation>,
    },
    Plain {
        #[serde(rename = "org.matrix.msc1767.text")]
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    pub body: String,
    pub mimetype: String,
}

/// Thread relation pointing at the thread root, with an in-reply-to fallback for clients without thread support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRelation {
    pub event_id: String,
    pub is_falling_back: bool,
    #[serde(rename = "m.in_reply_to")]
    pub in_reply_to: InReplyTo,
    pub rel_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InReplyTo {
    pub event_id: String,
}

impl MessageContent {
    /// Text-only message with the msc1767 text fallback.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            body: text.clone(),
            msgtype: TEXT_MSGTYPE.to_string(),
            format: BodyFormat::Plain { text },
            relates_to: None,
        }
    }

    /// Rich message: `text` is kept as body, `html` is the rendered form.
    pub fn rich(text: impl Into<String>, html: impl Into<String>) -> Self {
        let text = text.into();
        let html = html.into();
        Self {
            body: text.clone(),
            msgtype: TEXT_MSGTYPE.to_string(),
            format: BodyFormat::Rich {
                format: HTML_FORMAT.to_string(),
                formatted_body: html.clone(),
                representations: vec![
                    Representation {
                        body: text,
                        mimetype: MIMETYPE_PLAIN.to_string(),
                    },
                    Representation {
                        body: html,
                        mimetype: MIMETYPE_HTML.to_string(),
                    },
                ],
            },
            relates_to: None,
        }
    }

    /// Attach a thread relation to `root_event_id`.
    pub fn in_thread(mut self, root_event_id: impl Into<String>) -> Self {
        let root = root_event_id.into();
        self.relates_to = Some(ThreadRelation {
            event_id: root.clone(),
            is_falling_back: true,
            in_reply_to: InReplyTo { event_id: root },
            rel_type: THREAD_REL_TYPE.to_string(),
        });
        self
    }

    pub fn is_rich(&self) -> bool {
        matches!(self.format, BodyFormat::Rich { .. })
    }

    /// Rendered HTML, if this is a rich message.
    pub fn formatted_body(&self) -> Option<&str> {
        match &self.format {
            BodyFormat::Rich { formatted_body, .. } => Some(formatted_body),
            BodyFormat::Plain { .. } => None,
        }
    }
}

/// Build the reply content for `text`. `rich` renders markdown to HTML; `thread` attaches the reply to `root_event_id`'s thread.
pub fn format_reply(root_event_id: &str, text: &str, thread: bool, rich: bool) -> MessageContent {
    let content = if rich {
        MessageContent::rich(text, render_markdown(text))
    } else {
        MessageContent::plain(text)
    };
    if thread {
        content.in_thread(root_event_id)
    } else {
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn keys(v: &Value) -> Vec<&str> {
        let mut k: Vec<&str> = v
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        k.sort_unstable();
        k
    }

    #[test]
    fn plain_unthreaded_has_exactly_three_fields() {
        let v = serde_json::to_value(format_reply("$root", "hi *there*", false, false)).unwrap();
        assert_eq!(keys(&v), vec!["body", "msgtype", "org.matrix.msc1767.text"]);
        assert_eq!(v["body"], "hi *there*");
        assert_eq!(v["msgtype"], "m.text");
        assert_eq!(v["org.matrix.msc1767.text"], "hi *there*");
    }

    #[test]
    fn rich_threaded_payload() {
        let v = serde_json::to_value(format_reply("$root", "**bold**", true, true)).unwrap();
        assert_eq!(
            v,
            json!({
                "body": "**bold**",
                "msgtype": "m.text",
                "format": "org.matrix.custom.html",
                "formatted_body": "<p><strong>bold</strong></p>\n",
                "org.matrix.msc1767.message": [
                    { "body": "**bold**", "mimetype": "text/plain" },
                    { "body": "<p><strong>bold</strong></p>\n", "mimetype": "text/html" }
                ],
                "m.relates_to": {
                    "event_id": "$root",
                    "is_falling_back": true,
                    "m.in_reply_to": { "event_id": "$root" },
                    "rel_type": "m.thread"
                }
            })
        );
    }

    #[test]
    fn rich_has_no_plain_extension_field() {
        let v = serde_json::to_value(format_reply("$root", "x", false, true)).unwrap();
        assert!(v.get("org.matrix.msc1767.text").is_none());
        assert!(v.get("m.relates_to").is_none());
    }

    #[test]
    fn plain_threaded_has_relation_but_no_html() {
        let content = format_reply("$root", "x", true, false);
        assert!(!content.is_rich());
        assert_eq!(content.formatted_body(), None);
        let v = serde_json::to_value(&content).unwrap();
        assert_eq!(v["m.relates_to"]["rel_type"], "m.thread");
        assert!(v.get("format").is_none());
    }

    #[test]
    fn body_survives_serialization_for_every_flag_combination() {
        let text = "line one\n\n- item `code` <b>";
        for (thread, rich) in [(false, false), (false, true), (true, false), (true, true)] {
            let wire = serde_json::to_string(&format_reply("$r", text, thread, rich)).unwrap();
            let parsed: MessageContent = serde_json::from_str(&wire).unwrap();
            assert_eq!(parsed.body, text);
            assert_eq!(parsed.is_rich(), rich);
            assert_eq!(parsed.relates_to.is_some(), thread);
        }
    }
}
