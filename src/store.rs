use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const SLUG_LABEL: &str = "\"slug\"";
const CATEGORY_LABEL: &str = "\"category\"";
const BODY_LABEL: &str = "\"htmlContent\"";

/// How far past the slug label a category label may appear and still belong
/// to the same record.
const CATEGORY_WINDOW: usize = 600;

/// One record located inside a collection blob. `body` is the raw (escaped)
/// span of the htmlContent value; the surrounding structure is never parsed.
#[derive(Debug)]
pub struct RecordRef {
    pub slug: String,
    pub category: Option<String>,
    pub body: FieldState,
}

#[derive(Debug)]
pub enum FieldState {
    Found(Range<usize>),
    Missing,
    Unterminated,
}

/// A pending write: replace `start..end` of the collection text.
#[derive(Debug)]
pub struct Splice {
    pub start: usize,
    pub end: usize,
    pub new_content: String,
}

/// Collection files under the data directory, sorted by name for a stable
/// processing order.
pub fn collection_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read data dir {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Locate every record in a collection blob by scanning for slug labels.
/// Records come back in slug-discovery order.
pub fn scan_records(text: &str, window: usize) -> Vec<RecordRef> {
    let mut records = Vec::new();
    let mut slug_positions = Vec::new();
    let mut from = 0;
    while let Some(pos) = find_from(text, SLUG_LABEL, from) {
        slug_positions.push(pos);
        from = pos + SLUG_LABEL.len();
    }

    for (i, &pos) in slug_positions.iter().enumerate() {
        let record_end = slug_positions
            .get(i + 1)
            .copied()
            .unwrap_or(text.len());
        let Some((slug_range, _)) = value_after_label(text, pos + SLUG_LABEL.len()) else {
            continue;
        };
        let slug = text[slug_range.clone()].to_string();

        let window_end = (slug_range.end + window).min(record_end);
        let category = find_from(text, CATEGORY_LABEL, slug_range.end)
            .filter(|&p| p < window_end)
            .and_then(|p| value_after_label(text, p + CATEGORY_LABEL.len()))
            .map(|(r, _)| text[r].to_string());

        let body = match find_from(text, BODY_LABEL, slug_range.end).filter(|&p| p < record_end)
        {
            None => FieldState::Missing,
            Some(p) => match value_after_label(text, p + BODY_LABEL.len()) {
                Some((r, _)) => FieldState::Found(r),
                None => FieldState::Unterminated,
            },
        };

        records.push(RecordRef {
            slug,
            category,
            body,
        });
    }
    records
}

pub fn scan_records_default(text: &str) -> Vec<RecordRef> {
    scan_records(text, CATEGORY_WINDOW)
}

fn find_from(text: &str, needle: &str, from: usize) -> Option<usize> {
    text.get(from..)
        .and_then(|s| s.find(needle))
        .map(|i| from + i)
}

/// After a label, skip `:` and whitespace to an opening quote and return the
/// inner raw span up to the first unescaped closing quote.
fn value_after_label(text: &str, after_label: usize) -> Option<(Range<usize>, usize)> {
    let bytes = text.as_bytes();
    let mut i = after_label;
    while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b':') {
        i += 1;
    }
    if bytes.get(i) != Some(&b'"') {
        return None;
    }
    let start = i + 1;
    let end = find_closing_quote(text, start)?;
    Some((start..end, end + 1))
}

/// First unescaped `"` at or after `from`; backslash-escape-aware, so `\\"`
/// closes but `\"` and `\\\"` do not.
pub fn find_closing_quote(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Decode a JSON-style escaped string span into markup.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&code, 16).ok() {
                    Some(hi @ 0xD800..=0xDBFF) => {
                        // Surrogate pair: expect \uDC00-\uDFFF next.
                        let mut rest = chars.clone();
                        if rest.next() == Some('\\') && rest.next() == Some('u') {
                            let low: String = rest.by_ref().take(4).collect();
                            if let Some(lo @ 0xDC00..=0xDFFF) =
                                u32::from_str_radix(&low, 16).ok()
                            {
                                let cp = 0x10000
                                    + ((hi - 0xD800) << 10)
                                    + (lo - 0xDC00);
                                if let Some(c) = char::from_u32(cp) {
                                    out.push(c);
                                    chars = rest;
                                    continue;
                                }
                            }
                        }
                        out.push('\u{FFFD}');
                    }
                    Some(cp) => out.push(char::from_u32(cp).unwrap_or('\u{FFFD}')),
                    None => out.push('\u{FFFD}'),
                }
            }
            Some(other) => {
                // Unknown escape: keep it verbatim.
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Re-encode markup for splicing back into a quoted field.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Apply splices in descending start order so lower-offset spans stay valid.
pub fn apply_splices(text: &str, mut splices: Vec<Splice>) -> String {
    splices.sort_by(|a, b| b.start.cmp(&a.start));
    let mut out = text.to_string();
    for s in splices {
        out.replace_range(s.start..s.end, &s.new_content);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOB: &str = r#"{
      "pages": [
        { "id": 1, "slug": "tummy-time-basics", "category": "development",
          "htmlContent": "<p>He said \"hi\" and waved.</p>" },
        { "id": 2, "slug": "weaning-guide",
          "htmlContent": "<p>Second record body text here.</p>" }
      ]
    }"#;

    #[test]
    fn records_found_in_discovery_order() {
        let recs = scan_records_default(BLOB);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].slug, "tummy-time-basics");
        assert_eq!(recs[1].slug, "weaning-guide");
    }

    #[test]
    fn category_within_window_else_none() {
        let recs = scan_records_default(BLOB);
        assert_eq!(recs[0].category.as_deref(), Some("development"));
        assert!(recs[1].category.is_none());
    }

    #[test]
    fn category_outside_window_ignored() {
        let pad = " ".repeat(700);
        let blob = format!(
            r#""slug": "a"{}"category": "far", "htmlContent": "<p>xxxxx</p>""#,
            pad
        );
        let recs = scan_records_default(&blob);
        assert!(recs[0].category.is_none());
    }

    #[test]
    fn body_span_respects_escaped_quotes() {
        let recs = scan_records_default(BLOB);
        let FieldState::Found(range) = &recs[0].body else {
            panic!("expected body span");
        };
        let raw = &BLOB[range.clone()];
        assert!(raw.ends_with("waved.</p>"));
        assert_eq!(unescape(raw), "<p>He said \"hi\" and waved.</p>");
    }

    #[test]
    fn unterminated_field_flagged() {
        let blob = r#""slug": "a", "htmlContent": "<p>never closes"#;
        let recs = scan_records_default(blob);
        assert!(matches!(recs[0].body, FieldState::Unterminated));
    }

    #[test]
    fn missing_field_flagged() {
        let blob = r#""slug": "a", "title": "no body here""#;
        let recs = scan_records_default(blob);
        assert!(matches!(recs[0].body, FieldState::Missing));
    }

    #[test]
    fn body_label_from_next_record_not_borrowed() {
        let blob = r#""slug": "a", "slug": "b", "htmlContent": "<p>belongs to b</p>""#;
        let recs = scan_records_default(blob);
        assert!(matches!(recs[0].body, FieldState::Missing));
        assert!(matches!(recs[1].body, FieldState::Found(_)));
    }

    #[test]
    fn escape_unescape_roundtrip() {
        let html = "<p class=\"x\">a\\b\nline\ttab</p>";
        assert_eq!(unescape(&escape(html)), html);
    }

    #[test]
    fn unicode_escapes_decoded() {
        assert_eq!(unescape(r"caf\u00e9"), "café");
        assert_eq!(unescape(r"\ud83d\ude42"), "🙂");
        assert_eq!(unescape(r"\ud800 lone"), "\u{FFFD} lone");
    }

    #[test]
    fn splices_applied_in_reverse_offset_order() {
        let text = "0123456789";
        let out = apply_splices(
            text,
            vec![
                Splice { start: 2, end: 4, new_content: "AAAA".into() },
                Splice { start: 7, end: 8, new_content: "B".into() },
            ],
        );
        assert_eq!(out, "01AAAA456B89");
    }
}
