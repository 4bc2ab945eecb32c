use std::fmt::Write;

use crate::html::ParsedDocument;

const JUMP_STRIP_MAX: usize = 6;
const JUMP_TITLE_MAX: usize = 30;
const TAKEAWAYS_MAX: usize = 8;

/// Lay out a parsed document: quick-links panel (or jump strip), key
/// takeaways, sections in order, FAQ accordion. Pure presentation over the
/// segmenter's data contract.
pub fn render_document(doc: &ParsedDocument) -> String {
    let mut out = String::new();

    if !doc.quick_links.is_empty() {
        out.push_str("<nav class=\"quick-links\"><ol>\n");
        for ql in &doc.quick_links {
            let _ = writeln!(
                out,
                "  <li><a href=\"#{}\">{}. {}</a></li>",
                ql.id,
                ql.numeral,
                escape_text(&ql.label)
            );
        }
        out.push_str("</ol></nav>\n");
    } else {
        render_jump_strip(&mut out, doc);
    }

    if !doc.key_takeaways.is_empty() {
        out.push_str("<aside class=\"key-takeaways\"><h2>Key takeaways</h2><ul>\n");
        for item in doc.key_takeaways.iter().take(TAKEAWAYS_MAX) {
            let _ = writeln!(out, "  <li>{}</li>", escape_text(item));
        }
        out.push_str("</ul></aside>\n");
    }

    for section in &doc.sections {
        let _ = writeln!(out, "<section id=\"{}\">", section.id);
        if let Some(title) = &section.title {
            let _ = writeln!(out, "<h2>{}</h2>", escape_text(title));
        }
        out.push_str(&section.body_html);
        out.push_str("\n</section>\n");
    }

    if !doc.faqs.is_empty() {
        out.push_str("<section id=\"faq\" class=\"faq\"><h2>FAQs</h2>\n");
        for entry in &doc.faqs {
            let _ = writeln!(
                out,
                "<details><summary>{}</summary><p>{}</p></details>",
                escape_text(&entry.question),
                escape_text(&entry.answer_text)
            );
        }
        out.push_str("</section>\n");
    }

    out
}

/// Short jump navigation built from section titles when no author-written
/// quick links exist.
fn render_jump_strip(out: &mut String, doc: &ParsedDocument) {
    let titled: Vec<_> = doc
        .sections
        .iter()
        .filter(|s| s.title.is_some())
        .take(JUMP_STRIP_MAX)
        .collect();
    if titled.is_empty() && doc.faqs.is_empty() {
        return;
    }
    out.push_str("<nav class=\"jump-strip\">\n");
    for section in titled {
        let title = section.title.as_deref().unwrap_or_default();
        let _ = writeln!(
            out,
            "  <a href=\"#{}\">{}</a>",
            section.id,
            escape_text(&truncate(title, JUMP_TITLE_MAX))
        );
    }
    if !doc.faqs.is_empty() {
        out.push_str("  <a href=\"#faq\" class=\"pill\">FAQs</a>\n");
    }
    out.push_str("</nav>\n");
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
