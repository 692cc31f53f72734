//! Markdown to HTML for rich-text replies.

use pulldown_cmark::{html, Event, Options, Parser};

/// Render markdown to an HTML fragment (`formatted_body`).
///
/// Tables and strikethrough are enabled. Raw HTML in the input is escaped rather than passed through,
/// so model output cannot inject markup into the room.
pub fn render_markdown(text: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(text, opts).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}
