use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{LinkMapping, PipelineConfig};
use crate::html::scan::{self, Token};

/// Idempotency marker: once present, the injector is a no-op.
pub const SENTINEL: &str = "<!-- linkboost:done -->";

/// Fixed sentence of the synthesized closing paragraph; its presence guards
/// against double-appension across retries.
pub const CLOSING_SENTENCE: &str =
    "Every day of play is a chance to help your little one grow.";

/// Text inside these elements is never a link target.
const SKIP_TAGS: &[&str] = &[
    "a", "script", "style", "h1", "h2", "h3", "h4", "h5", "h6", "button", "input",
    "textarea", "select", "code", "pre",
];

static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

#[derive(Debug)]
pub struct Injection {
    pub html: String,
    pub internal_added: usize,
    pub external_added: usize,
    pub cta_added: bool,
    pub skipped: bool,
}

struct Cursor {
    words_so_far: usize,
    next_internal: usize,
    next_external: usize,
}

/// Enrich a document with internal and external links at word intervals,
/// guaranteeing one call-to-action anchor. Deterministic and idempotent.
pub fn inject(raw: &str, page_url: &str, cfg: &PipelineConfig) -> Injection {
    if raw.contains(SENTINEL) {
        return Injection {
            html: raw.to_string(),
            internal_added: 0,
            external_added: 0,
            cta_added: false,
            skipped: true,
        };
    }

    // Existing links count against per-document uniqueness, and a document
    // never links to itself.
    let mut used: HashSet<String> = HashSet::new();
    for caps in HREF_RE.captures_iter(raw) {
        if let Some(url) = caps.get(1).or_else(|| caps.get(2)) {
            used.insert(url.as_str().to_string());
        }
    }
    let had_cta = used.contains(&cfg.cta.target_url);
    used.insert(page_url.to_string());

    let mut cursor = Cursor {
        words_so_far: 0,
        next_internal: cfg.internal_interval,
        next_external: cfg.external_interval,
    };
    let mut internal_added = 0;
    let mut external_added = 0;
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for range in linkable_nodes(raw) {
        let original = &raw[range.clone()];
        let node_words = original.split_whitespace().count();
        let reach = cursor.words_so_far + node_words;
        let mut node_text = original.to_string();
        let mut modified = false;

        // Sub-2-word nodes feed the counter but are never candidates.
        if node_words >= 2 {
            if reach >= cursor.next_internal
                && try_inject(&mut node_text, &cfg.internal_mappings, &mut used, page_url)
            {
                internal_added += 1;
                cursor.next_internal = reach + cfg.internal_interval;
                modified = true;
            }
            if reach >= cursor.next_external
                && try_inject(&mut node_text, &cfg.external_mappings, &mut used, page_url)
            {
                external_added += 1;
                cursor.next_external = reach + cfg.external_interval;
                modified = true;
            }
        }

        cursor.words_so_far = reach;
        if modified {
            edits.push((range, node_text));
        }
    }

    let mut html = apply_edits(raw, edits);

    let mut cta_added = false;
    if !had_cta && !used.contains(&cfg.cta.target_url) {
        if let Some(with_cta) = guarantee_cta(&html, cfg) {
            html = with_cta;
            cta_added = true;
        }
    }

    // Finalize with the idempotency marker.
    insert_before_body_close(&mut html, SENTINEL);

    Injection {
        html,
        internal_added,
        external_added,
        cta_added,
        skipped: false,
    }
}

/// Ordered text runs whose ancestor chain contains no skip tag.
fn linkable_nodes(html: &str) -> Vec<Range<usize>> {
    let mut depth = 0usize;
    let mut nodes = Vec::new();
    for token in scan::tokens(html) {
        match token {
            Token::Open {
                name,
                self_closing: false,
                ..
            } if SKIP_TAGS.contains(&name.as_str()) => depth += 1,
            Token::Close { name, .. } if SKIP_TAGS.contains(&name.as_str()) => {
                depth = depth.saturating_sub(1);
            }
            Token::Text { range } if depth == 0 => {
                if !html[range.clone()].trim().is_empty() {
                    nodes.push(range);
                }
            }
            _ => {}
        }
    }
    nodes
}

/// Scan the mapping table in order; first keyword occurrence in the node
/// wins. Returns true when an anchor was substituted.
fn try_inject(
    node_text: &mut String,
    mappings: &[LinkMapping],
    used: &mut HashSet<String>,
    page_url: &str,
) -> bool {
    for mapping in mappings {
        if used.contains(&mapping.target_url) || mapping.target_url == page_url {
            continue;
        }
        for keyword in &mapping.keywords {
            if let Some(start) = find_outside_anchor(node_text, keyword) {
                let end = start + keyword.len();
                let matched = node_text[start..end].to_string();
                let anchor = build_anchor(&matched, mapping);
                node_text.replace_range(start..end, &anchor);
                used.insert(mapping.target_url.clone());
                return true;
            }
        }
    }
    false
}

fn build_anchor(matched: &str, mapping: &LinkMapping) -> String {
    let title = mapping
        .label
        .as_deref()
        .map(|l| format!(" title=\"{}\"", l))
        .unwrap_or_default();
    if mapping.external {
        format!(
            "<a href=\"{}\"{} target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
            mapping.target_url, title, matched
        )
    } else {
        format!("<a href=\"{}\"{}>{}</a>", mapping.target_url, title, matched)
    }
}

/// Case-insensitive substring search (ASCII folding, offset-safe) that skips
/// matches falling inside an anchor already injected into this node.
fn find_outside_anchor(text: &str, needle: &str) -> Option<usize> {
    let anchors = anchor_spans(text);
    let mut from = 0;
    while let Some(pos) = find_ascii_ci(text, needle, from) {
        let end = pos + needle.len();
        if !anchors.iter().any(|a| pos < a.end && end > a.start) {
            return Some(pos);
        }
        from = pos + 1;
    }
    None
}

fn anchor_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(open) = find_ascii_ci(text, "<a ", from) {
        let close = find_ascii_ci(text, "</a>", open)
            .map(|p| p + 4)
            .unwrap_or(text.len());
        spans.push(open..close);
        from = close;
    }
    spans
}

/// Byte-offset ASCII case-insensitive find; needles are ASCII keywords so
/// offsets are safe to splice with.
fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || from + n.len() > h.len() {
        return None;
    }
    (from..=h.len() - n.len()).find(|&i| {
        haystack.is_char_boundary(i)
            && h[i..i + n.len()].eq_ignore_ascii_case(n)
    })
}

/// Apply node edits against the original string in descending-offset order so
/// earlier ranges stay valid.
fn apply_edits(raw: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut out = raw.to_string();
    for (range, text) in edits {
        out.replace_range(range, &text);
    }
    out
}

/// Wrap the first CTA trigger phrase found in any linkable node, or append
/// the synthesized closing paragraph when no node matches. Returns the new
/// markup, or None when nothing was added.
fn guarantee_cta(html: &str, cfg: &PipelineConfig) -> Option<String> {
    for range in linkable_nodes(html) {
        let node = &html[range.clone()];
        for phrase in &cfg.cta_phrases {
            if let Some(pos) = find_outside_anchor(node, phrase) {
                let start = range.start + pos;
                let end = start + phrase.len();
                let matched = &html[start..end];
                let anchor = build_anchor(matched, &cfg.cta);
                let mut out = html.to_string();
                out.replace_range(start..end, &anchor);
                return Some(out);
            }
        }
    }

    if html.contains(CLOSING_SENTENCE) {
        return None;
    }
    let para = format!(
        "<p>{} <a href=\"{}\">Explore the BabyPillars courses</a>.</p>",
        CLOSING_SENTENCE, cfg.cta.target_url
    );
    let mut out = html.to_string();
    insert_before_body_close(&mut out, &para);
    Some(out)
}

fn insert_before_body_close(html: &mut String, fragment: &str) {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(pos) => html.insert_str(pos, fragment),
        None => {
            html.push('\n');
            html.push_str(fragment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PipelineConfig {
        PipelineConfig::default()
    }

    fn count_occurrences(hay: &str, needle: &str) -> usize {
        hay.matches(needle).count()
    }

    fn paragraphs(words_per: usize, n: usize) -> String {
        let filler = vec!["lorem"; words_per].join(" ");
        (0..n).map(|_| format!("<p>{}</p>", filler)).collect()
    }

    const PAGE: &str = "https://www.babypillars.com/some-article/";

    #[test]
    fn idempotent_second_run_is_noop() {
        let cfg = cfg();
        let raw = format!(
            "<p>{} milestone checklist follows here</p>",
            vec!["word"; 60].join(" ")
        );
        let first = inject(&raw, PAGE, &cfg);
        assert!(!first.skipped);
        let second = inject(&first.html, PAGE, &cfg);
        assert!(second.skipped);
        assert_eq!(second.internal_added, 0);
        assert_eq!(second.external_added, 0);
        assert_eq!(second.html, first.html);
    }

    #[test]
    fn interval_anchoring_scenario() {
        // Five 40-word paragraphs; the keyword sits in the 2nd. One internal
        // link lands there and nowhere before it.
        let cfg = cfg();
        let second = format!("<p>{} milestone checklist</p>", vec!["lorem"; 38].join(" "));
        let raw = format!(
            "{}{}{}",
            paragraphs(40, 1),
            second,
            paragraphs(40, 3)
        );
        let out = inject(&raw, PAGE, &cfg);
        assert_eq!(out.internal_added, 1);
        assert_eq!(out.external_added, 0);
        let anchor_pos = out.html.find("<a href=\"https://www.babypillars.com/milestone-checklist/\"").unwrap();
        let second_para_pos = out.html.find("milestone").unwrap();
        assert!(anchor_pos <= second_para_pos);
        // Nothing linked in the first paragraph.
        let first_para_end = out.html.find("</p>").unwrap();
        assert!(!out.html[..first_para_end].contains("<a "));
        assert!(out.html.contains("milestone checklist</a>"));
    }

    #[test]
    fn cadence_is_a_lower_bound_not_exact() {
        // Keyword only appears far past the interval; the threshold waits.
        let cfg = cfg();
        let raw = format!(
            "{}<p>try some tummy time today</p>",
            paragraphs(40, 5)
        );
        let out = inject(&raw, PAGE, &cfg);
        assert_eq!(out.internal_added, 1);
        assert!(out.html.contains("tummy-time-guide"));
    }

    #[test]
    fn short_nodes_feed_counter_but_never_link() {
        let cfg = cfg();
        // 30 two-word nodes push the counter past 60; the single-word keyword
        // node is never a candidate.
        let mut raw: String = (0..30).map(|_| "<p>two words</p>".to_string()).collect();
        raw.push_str("<p>crawling</p>");
        let out = inject(&raw, PAGE, &cfg);
        assert_eq!(out.internal_added, 0);
    }

    #[test]
    fn self_link_excluded() {
        let cfg = cfg();
        let page = "https://www.babypillars.com/tummy-time-guide/";
        let raw = format!(
            "<p>{} tummy time matters</p>",
            vec!["w"; 60].join(" ")
        );
        let out = inject(&raw, page, &cfg);
        assert!(!out.html.contains(&format!("href=\"{}\"", page)));
    }

    #[test]
    fn each_target_used_at_most_once() {
        let cfg = cfg();
        // Two far-apart occurrences of the same keyword; only one anchor.
        let raw = format!(
            "<p>{} tummy time</p>{}<p>{} tummy time</p>",
            vec!["a"; 59].join(" "),
            paragraphs(40, 2),
            vec!["b"; 59].join(" ")
        );
        let out = inject(&raw, PAGE, &cfg);
        assert_eq!(
            count_occurrences(&out.html, "href=\"https://www.babypillars.com/tummy-time-guide/\""),
            1
        );
    }

    #[test]
    fn preexisting_href_blocks_mapping() {
        let cfg = cfg();
        let raw = format!(
            "<p>See <a href=\"https://www.babypillars.com/tummy-time-guide/\">this</a></p>\
             <p>{} tummy time</p>",
            vec!["w"; 60].join(" ")
        );
        let out = inject(&raw, PAGE, &cfg);
        assert_eq!(out.internal_added, 0);
        assert_eq!(
            count_occurrences(&out.html, "tummy-time-guide"),
            1
        );
    }

    #[test]
    fn external_anchor_attributes() {
        let cfg = cfg();
        let raw = format!(
            "<p>{} ask your pediatrician about it</p>",
            vec!["lorem"; 209].join(" ")
        );
        let out = inject(&raw, PAGE, &cfg);
        assert_eq!(out.external_added, 1);
        assert!(out.html.contains("target=\"_blank\""));
        assert!(out.html.contains("rel=\"noopener noreferrer\""));
        assert!(out.html.contains("title=\"HealthyChildren.org (AAP)\""));
    }

    #[test]
    fn matched_casing_preserved() {
        let cfg = cfg();
        let raw = format!(
            "<p>{} Tummy Time is useful</p>",
            vec!["w"; 60].join(" ")
        );
        let out = inject(&raw, PAGE, &cfg);
        assert!(out.html.contains(">Tummy Time</a>"));
    }

    #[test]
    fn text_inside_headings_and_anchors_not_linkable() {
        let cfg = cfg();
        let raw = format!(
            "<h2>tummy time tips</h2><a href=\"/x\">tummy time</a><pre>tummy time</pre>\
             <p>{}</p>",
            vec!["w"; 70].join(" ")
        );
        let out = inject(&raw, PAGE, &cfg);
        assert_eq!(out.internal_added, 0);
    }

    #[test]
    fn cta_wraps_trigger_phrase() {
        // Scenario B: lone "babypillars" token gets the CTA anchor; no
        // synthesized paragraph.
        let cfg = cfg();
        let out = inject("<p>babypillars</p>", PAGE, &cfg);
        assert!(out.cta_added);
        assert_eq!(
            count_occurrences(&out.html, &format!("href=\"{}\"", cfg.cta.target_url)),
            1
        );
        assert!(out.html.contains(">babypillars</a>"));
        assert!(!out.html.contains(CLOSING_SENTENCE));
    }

    #[test]
    fn cta_synthesized_when_no_phrase_matches() {
        let cfg = cfg();
        let out = inject("<p>nothing matches in here</p>", PAGE, &cfg);
        assert!(out.cta_added);
        assert!(out.html.contains(CLOSING_SENTENCE));
        assert_eq!(
            count_occurrences(&out.html, &format!("href=\"{}\"", cfg.cta.target_url)),
            1
        );
    }

    #[test]
    fn cta_not_duplicated_when_anchor_exists() {
        let cfg = cfg();
        let raw = format!(
            "<p>join <a href=\"{}\">the courses</a> now</p>",
            cfg.cta.target_url
        );
        let out = inject(&raw, PAGE, &cfg);
        assert!(!out.cta_added);
        assert_eq!(
            count_occurrences(&out.html, &format!("href=\"{}\"", cfg.cta.target_url)),
            1
        );
        assert!(!out.html.contains(CLOSING_SENTENCE));
    }

    #[test]
    fn sentinel_lands_before_body_close() {
        let cfg = cfg();
        let out = inject("<body><p>babypillars</p></body>", PAGE, &cfg);
        let sentinel = out.html.find(SENTINEL).unwrap();
        let body_close = out.html.rfind("</body>").unwrap();
        assert!(sentinel < body_close);
    }

    #[test]
    fn empty_document_still_gets_cta_and_sentinel() {
        let cfg = cfg();
        let out = inject("", PAGE, &cfg);
        assert!(out.html.contains(SENTINEL));
        assert!(out.html.contains(CLOSING_SENTENCE));
        // Re-running after synthesis is still a no-op.
        let again = inject(&out.html, PAGE, &cfg);
        assert!(again.skipped);
    }
}
