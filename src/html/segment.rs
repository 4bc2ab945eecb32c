use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::{collapse_ws, strip_tags};

static QUICK_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<p[^>]*>\s*<(?:strong|b)[^>]*>\s*quick\s+links:?\s*</(?:strong|b)>\s*</p\s*>")
        .unwrap()
});
static NEXT_P_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*<p[^>]*>(.*?)</p\s*>").unwrap());
// Valid Roman sequences up to the thirties, not arbitrary runs of Roman
// letters; "Mix." or "Lid." must not read as numerals.
static NUMERAL_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:x{0,3}(?:ix|iv|v?i{1,3}|v)|x{1,3}|\d{1,3})\s*[.):-]\s*").unwrap()
});
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b[^>]*>(.*?)</a\s*>").unwrap());

static H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h2[^>]*>(.*?)</h2\s*>").unwrap());
static H3_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h3[^>]*>(.*?)</h3\s*>").unwrap());
static LI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<li[^>]*>(.*?)</li\s*>").unwrap());
static P_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p\s*>").unwrap());
static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:strong|b)\b[^>]*>(.*?)</(?:strong|b)\s*>").unwrap()
});

static KEY_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bkey\s+takeaways?\b").unwrap());
static FAQ_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)frequently\s+asked").unwrap());
static FAQ_EXACT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^faqs?$").unwrap());

static Q_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:q\s*[.:]|question\s*:)\s*").unwrap());
static Q_ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:p|h[3-6]|strong|b)\b[^>]*>\s*q\s*[.:]\s*(.*?)</(?:p|h[3-6]|strong|b)\s*>")
        .unwrap()
});

static LEADING_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:</[a-zA-Z][a-zA-Z0-9-]*\s*>\s*)+").unwrap());

const ROMAN: [&str; 15] = [
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII", "XIII", "XIV",
    "XV",
];

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub id: String,
    pub title: Option<String>,
    pub body_html: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickLinkEntry {
    pub numeral: String,
    pub label: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedDocument {
    pub sections: Vec<Section>,
    pub faqs: Vec<FaqEntry>,
    pub quick_links: Vec<QuickLinkEntry>,
    pub key_takeaways: Vec<String>,
}

/// Derive a jump-target id from a title: lowercase, non-alphanumeric runs
/// become single hyphens, capped at 60 chars.
pub fn slugify(title: &str) -> String {
    let mut out = String::new();
    let mut last_hyphen = true;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            out.push('-');
            last_hyphen = true;
        }
    }
    let trimmed: String = out.trim_matches('-').chars().take(60).collect();
    let trimmed = trimmed.trim_matches('-').to_string();
    if trimmed.is_empty() {
        "section".to_string()
    } else {
        trimmed
    }
}

fn unique_slug(title: &str, used: &mut HashSet<String>) -> String {
    let base = slugify(title);
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let cand = format!("{}-{}", base, n);
        if used.insert(cand.clone()) {
            return cand;
        }
        n += 1;
    }
}

/// Segment stripped markup into sections, FAQ entries, quick links and key
/// takeaways. Absence of any of them is valid; nothing here errors.
pub fn segment(html: &str) -> ParsedDocument {
    let (quick_links, html) = extract_quick_links(html);
    let mut doc = ParsedDocument {
        quick_links,
        ..Default::default()
    };

    let mut used = HashSet::new();
    for (title, body) in split_blocks(&html) {
        classify_block(title, body, &mut doc, &mut used);
    }
    fallback_faq_scan(&mut doc);
    doc
}

// ── Quick links ──

fn extract_quick_links(html: &str) -> (Vec<QuickLinkEntry>, String) {
    let Some(label) = QUICK_LABEL_RE.find(html) else {
        return (Vec::new(), html.to_string());
    };

    let mut entries = Vec::new();
    let mut pos = label.end();
    while let Some(caps) = NEXT_P_RE.captures(&html[pos..]) {
        let inner = &caps[1];
        let plain = collapse_ws(&strip_tags(inner));
        let has_numeral = NUMERAL_PREFIX_RE.is_match(&plain);
        let has_anchor = inner.to_ascii_lowercase().contains("<a");
        if plain.chars().count() >= 200 || (!has_numeral && !has_anchor) {
            break;
        }

        let mut label_text = NUMERAL_PREFIX_RE.replace(&plain, "").trim().to_string();
        if label_text.is_empty() {
            label_text = ANCHOR_RE
                .captures(inner)
                .map(|c| collapse_ws(&strip_tags(&c[1])))
                .unwrap_or_default();
        }

        let idx = entries.len();
        let numeral = if idx < ROMAN.len() {
            ROMAN[idx].to_string()
        } else {
            (idx + 1).to_string()
        };
        let id = slugify(&label_text);
        entries.push(QuickLinkEntry {
            numeral,
            label: label_text,
            id,
        });
        pos += caps.get(0).unwrap().end();
    }

    if entries.is_empty() {
        return (Vec::new(), html.to_string());
    }
    let mut out = String::with_capacity(html.len());
    out.push_str(&html[..label.start()]);
    out.push_str(&html[pos..]);
    (entries, out)
}

// ── Primary split ──

/// Split on `<h2>` boundaries. `(None, body)` is the pre-heading intro or,
/// when the document has no headings at all, the whole document.
fn split_blocks(html: &str) -> Vec<(Option<String>, String)> {
    let heads: Vec<_> = H2_RE.captures_iter(html).collect();
    if heads.is_empty() {
        let body = html.trim();
        if body.is_empty() {
            return Vec::new();
        }
        return vec![(None, body.to_string())];
    }

    let mut blocks = Vec::new();
    let first_start = heads[0].get(0).unwrap().start();
    let intro = LEADING_CLOSE_RE.replace(&html[..first_start], "");
    if !intro.trim().is_empty() {
        blocks.push((None, intro.trim().to_string()));
    }

    for (i, caps) in heads.iter().enumerate() {
        let title = collapse_ws(&strip_tags(&caps[1]));
        let body_start = caps.get(0).unwrap().end();
        let body_end = heads
            .get(i + 1)
            .map(|next| next.get(0).unwrap().start())
            .unwrap_or(html.len());
        let title = if title.is_empty() { None } else { Some(title) };
        blocks.push((title, html[body_start..body_end].trim().to_string()));
    }
    blocks
}

// ── Classification ──

fn classify_block(
    title: Option<String>,
    body: String,
    doc: &mut ParsedDocument,
    used: &mut HashSet<String>,
) {
    if let Some(raw_title) = &title {
        if KEY_TITLE_RE.is_match(raw_title) {
            doc.key_takeaways.extend(extract_takeaways(&body));
            return;
        }
        let t = raw_title.trim();
        if FAQ_TITLE_RE.is_match(t) || FAQ_EXACT_RE.is_match(t) {
            let pairs = extract_faq(&body);
            if !pairs.is_empty() {
                doc.faqs.extend(pairs);
                return;
            }
            // No strategy matched; keep as a normal section.
        }
    }

    let id = unique_slug(title.as_deref().unwrap_or(""), used);
    doc.sections.push(Section {
        id,
        title,
        body_html: body,
    });
}

/// Key-takeaway bullets: list items, else paragraphs over 20 chars, else
/// bold fragments over 10 chars. First non-empty strategy wins.
fn extract_takeaways(body: &str) -> Vec<String> {
    let items: Vec<String> = LI_RE
        .captures_iter(body)
        .map(|c| collapse_ws(&strip_tags(&c[1])))
        .filter(|t| !t.is_empty())
        .collect();
    if !items.is_empty() {
        return items;
    }

    let paras: Vec<String> = P_RE
        .captures_iter(body)
        .map(|c| collapse_ws(&strip_tags(&c[1])))
        .filter(|t| t.chars().count() > 20)
        .collect();
    if !paras.is_empty() {
        return paras;
    }

    BOLD_RE
        .captures_iter(body)
        .map(|c| collapse_ws(&strip_tags(&c[1])))
        .filter(|t| t.chars().count() > 10)
        .collect()
}

/// FAQ strategies in priority order: `<h3>` pairs, question-marker
/// paragraphs, alternating bold fragments. First one yielding a pair wins.
fn extract_faq(body: &str) -> Vec<FaqEntry> {
    let pairs = faq_from_h3(body);
    if !pairs.is_empty() {
        return pairs;
    }
    let pairs = faq_from_markers(body);
    if !pairs.is_empty() {
        return pairs;
    }
    faq_from_bold(body)
}

fn faq_from_h3(body: &str) -> Vec<FaqEntry> {
    let heads: Vec<_> = H3_RE.captures_iter(body).collect();
    let mut pairs = Vec::new();
    for (i, caps) in heads.iter().enumerate() {
        let question = collapse_ws(&strip_tags(&caps[1]));
        let start = caps.get(0).unwrap().end();
        let end = heads
            .get(i + 1)
            .map(|n| n.get(0).unwrap().start())
            .unwrap_or(body.len());
        let answer = collapse_ws(&strip_tags(&body[start..end]));
        if !question.is_empty() && !answer.is_empty() {
            pairs.push(FaqEntry {
                question,
                answer_text: answer,
            });
        }
    }
    pairs
}

fn faq_from_markers(body: &str) -> Vec<FaqEntry> {
    let paras: Vec<String> = P_RE
        .captures_iter(body)
        .map(|c| collapse_ws(&strip_tags(&c[1])))
        .collect();

    let mut pairs = Vec::new();
    let mut i = 0;
    while i < paras.len() {
        if let Some(m) = Q_MARKER_RE.find(&paras[i]) {
            let question = paras[i][m.end()..].trim().to_string();
            let mut answer_parts = Vec::new();
            let mut j = i + 1;
            while j < paras.len() && !Q_MARKER_RE.is_match(&paras[j]) {
                answer_parts.push(paras[j].clone());
                j += 1;
            }
            let answer = answer_parts.join(" ").trim().to_string();
            if !question.is_empty() && !answer.is_empty() {
                pairs.push(FaqEntry {
                    question,
                    answer_text: answer,
                });
            }
            i = j;
        } else {
            i += 1;
        }
    }
    pairs
}

fn faq_from_bold(body: &str) -> Vec<FaqEntry> {
    let frags: Vec<String> = BOLD_RE
        .captures_iter(body)
        .map(|c| collapse_ws(&strip_tags(&c[1])))
        .filter(|t| t.chars().count() > 10)
        .collect();
    if frags.len() < 2 {
        return Vec::new();
    }
    frags
        .chunks(2)
        .filter(|pair| pair.len() == 2)
        .map(|pair| FaqEntry {
            question: pair[0].clone(),
            answer_text: pair[1].clone(),
        })
        .collect()
}

/// If no FAQ block was found, look for an inline run of "Q." elements inside
/// a normal section; the first section with two or more converts wholesale.
fn fallback_faq_scan(doc: &mut ParsedDocument) {
    if !doc.faqs.is_empty() {
        return;
    }
    for idx in 0..doc.sections.len() {
        let body = &doc.sections[idx].body_html;
        let hits: Vec<_> = Q_ELEMENT_RE.captures_iter(body).collect();
        if hits.len() < 2 {
            continue;
        }
        let mut pairs = Vec::new();
        for (i, caps) in hits.iter().enumerate() {
            let question = collapse_ws(&strip_tags(&caps[1]));
            let start = caps.get(0).unwrap().end();
            let end = hits
                .get(i + 1)
                .map(|n| n.get(0).unwrap().start())
                .unwrap_or(body.len());
            let answer = collapse_ws(&strip_tags(&body[start..end]));
            if !question.is_empty() {
                pairs.push(FaqEntry {
                    question,
                    answer_text: answer,
                });
            }
        }
        if !pairs.is_empty() {
            doc.faqs = pairs;
            doc.sections.remove(idx);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_rules() {
        assert_eq!(slugify("When Do Babies Crawl?"), "when-do-babies-crawl");
        assert_eq!(slugify("  --  "), "section");
        let long = "a".repeat(80);
        assert_eq!(slugify(&long).len(), 60);
    }

    #[test]
    fn duplicate_titles_get_suffixed_ids() {
        let html = "<h2>Sleep</h2><p>one</p><h2>Sleep</h2><p>two</p>";
        let doc = segment(html);
        let ids: Vec<_> = doc.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["sleep", "sleep-2"]);
    }

    #[test]
    fn no_headings_yields_single_unlabeled_section() {
        let doc = segment("<p>Just one paragraph of content.</p>");
        assert_eq!(doc.sections.len(), 1);
        assert!(doc.sections[0].title.is_none());
    }

    #[test]
    fn intro_before_first_heading() {
        let html = "</div><p>intro text</p><h2>First</h2><p>body</p>";
        let doc = segment(html);
        assert_eq!(doc.sections.len(), 2);
        assert!(doc.sections[0].title.is_none());
        assert!(doc.sections[0].body_html.contains("intro text"));
        assert_eq!(doc.sections[1].title.as_deref(), Some("First"));
    }

    #[test]
    fn empty_intro_of_closing_tags_dropped() {
        let html = "</div></section><h2>First</h2><p>body</p>";
        let doc = segment(html);
        assert_eq!(doc.sections.len(), 1);
    }

    #[test]
    fn key_takeaways_from_list_items() {
        let html =
            "<h2>Key Takeaways</h2><ul><li>First point</li><li>Second point</li></ul><h2>Next</h2><p>x</p>";
        let doc = segment(html);
        assert_eq!(doc.key_takeaways, vec!["First point", "Second point"]);
        // The takeaways block does not appear as a section.
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title.as_deref(), Some("Next"));
    }

    #[test]
    fn key_takeaways_fall_back_to_paragraphs_then_bold() {
        let para = "<h2>Key takeaway</h2><p>A paragraph well over twenty characters long.</p>";
        assert_eq!(segment(para).key_takeaways.len(), 1);

        let bold = "<h2>Key takeaways</h2><div><b>short</b><b>a bolded takeaway line</b></div>";
        assert_eq!(
            segment(bold).key_takeaways,
            vec!["a bolded takeaway line"]
        );
    }

    #[test]
    fn faq_h3_strategy_beats_marker_scan() {
        let html = "<h2>FAQ</h2>\
            <h3>When do babies crawl?</h3><p>Q. not a marker here, most crawl by ten months.</p>\
            <h3>When do babies walk?</h3><p>Usually around their first birthday.</p>";
        let doc = segment(html);
        assert_eq!(doc.faqs.len(), 2);
        assert_eq!(doc.faqs[0].question, "When do babies crawl?");
        assert!(doc.faqs[1].answer_text.contains("first birthday"));
        assert!(doc.sections.is_empty());
    }

    #[test]
    fn faq_marker_strategy() {
        let html = "<h2>Frequently Asked Questions</h2>\
            <p>Q: How much tummy time?</p><p>Start with a few minutes a day.</p>\
            <p>Question: Is rolling late a problem?</p><p>Usually not.</p>";
        let doc = segment(html);
        assert_eq!(doc.faqs.len(), 2);
        assert_eq!(doc.faqs[0].question, "How much tummy time?");
        assert_eq!(doc.faqs[1].answer_text, "Usually not.");
    }

    #[test]
    fn faq_bold_pairs_strategy() {
        let html = "<h2>FAQs</h2>\
            <strong>How much tummy time daily?</strong><span>…</span>\
            <strong>A few minutes, several times.</strong>";
        let doc = segment(html);
        assert_eq!(doc.faqs.len(), 1);
    }

    #[test]
    fn unextractable_faq_block_stays_a_section() {
        let html = "<h2>FAQ</h2><p>short</p>";
        let doc = segment(html);
        assert!(doc.faqs.is_empty());
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].id, "faq");
    }

    #[test]
    fn fallback_faq_scan_converts_first_qualifying_section() {
        let html = "<h2>Common questions</h2>\
            <p>Q. When do babies sit up?</p><p>Around six months.</p>\
            <p>Q. When do they stand?</p><p>Closer to nine months.</p>\
            <h2>Other</h2><p>Q. lone question here</p>";
        let doc = segment(html);
        assert_eq!(doc.faqs.len(), 2);
        assert_eq!(doc.faqs[0].question, "When do babies sit up?");
        // Converted section removed; the other survives.
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title.as_deref(), Some("Other"));
    }

    #[test]
    fn quick_links_consumed_and_numbered() {
        let html = "<p><strong>Quick Links</strong></p>\
            <p>I. Baby milestones</p>\
            <p>II. Tummy time</p>\
            <p><a href=\"#sleep\">Sleep routines</a></p>\
            <p>This paragraph is regular prose without any numeral and long enough not to qualify as a quick link at all, so consumption stops here before it.</p>\
            <h2>Baby milestones</h2><p>body</p>";
        let doc = segment(html);
        assert_eq!(doc.quick_links.len(), 3);
        assert_eq!(doc.quick_links[0].numeral, "I");
        assert_eq!(doc.quick_links[0].label, "Baby milestones");
        assert_eq!(doc.quick_links[0].id, "baby-milestones");
        assert_eq!(doc.quick_links[2].label, "Sleep routines");
        // Quick-links block removed from the section flow; the prose
        // paragraph that stopped consumption survives in the intro.
        assert!(doc.sections[0].body_html.contains("regular prose"));
        // Quick-link id matches the section it targets.
        assert_eq!(doc.quick_links[0].id, doc.sections[1].id);
    }

    #[test]
    fn roman_letter_words_are_not_numerals() {
        let html = "<p><strong>Quick links</strong></p>\
            <p>I. First topic</p>\
            <p>Mix. a little patience into every day</p>\
            <h2>First topic</h2><p>body</p>";
        let doc = segment(html);
        // "Mix." is a word, not a numeral: consumption stops and the
        // paragraph survives intact.
        assert_eq!(doc.quick_links.len(), 1);
        assert_eq!(doc.quick_links[0].label, "First topic");
        assert!(doc.sections[0]
            .body_html
            .contains("Mix. a little patience"));
    }

    #[test]
    fn quick_links_decimal_beyond_fifteen() {
        let mut html = String::from("<p><b>Quick links:</b></p>");
        for i in 1..=17 {
            html.push_str(&format!("<p>{}. Entry {}</p>", i, i));
        }
        let doc = segment(&html);
        assert_eq!(doc.quick_links.len(), 17);
        assert_eq!(doc.quick_links[14].numeral, "XV");
        assert_eq!(doc.quick_links[15].numeral, "16");
    }

    #[test]
    fn everything_optional_on_plain_document() {
        let doc = segment("");
        assert!(doc.sections.is_empty());
        assert!(doc.faqs.is_empty());
        assert!(doc.quick_links.is_empty());
        assert!(doc.key_takeaways.is_empty());
    }
}
