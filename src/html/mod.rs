pub mod scan;
pub mod segment;
pub mod strip;

pub use segment::{FaqEntry, ParsedDocument, QuickLinkEntry, Section};

/// Full parse pipeline: raw legacy markup → stripped markup → structured
/// document for rendering.
pub fn parse_document(raw: &str) -> ParsedDocument {
    segment::segment(&strip::strip_boilerplate(raw))
}

/// Flatten markup to plain text: drop tags, decode the handful of entities
/// legacy content actually uses.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    decode_entities(&out)
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Collapse whitespace runs to single spaces and trim.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
