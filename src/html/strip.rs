use std::sync::LazyLock;

use regex::Regex;

// Trailing chrome: truncate the document at the earliest of these markers.
const FOOTER_MARKERS: &[&str] = &[
    "<footer",
    "id=\"comments\"",
    "<!--legacy-analytics",
    "<div class=\"fb-root\"",
];

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());
static OPEN_SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(?:script|style)\b.*\z").unwrap());

static HEADER_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</header\s*>").unwrap());
static LOGO_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a[^>]*class="[^"]*\blogo\b[^"]*"[^>]*>.*?</a>"#).unwrap()
});
static NAV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<nav\b[^>]*>.*?</nav\s*>").unwrap());
static MENU_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<ul[^>]*class="[^"]*\b(?:menu|nav)\b[^"]*"[^>]*>.*?</ul\s*>"#).unwrap()
});

static SVG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<svg\b(?:[^>]*/>|[^>]*>.*?</svg\s*>)").unwrap());
static HIDDEN_DIV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div[^>]*class="[^"]*\b(?:visually-hidden|screen-reader-text|hidden-util)\b[^"]*"[^>]*>.*?</div\s*>"#)
        .unwrap()
});
static VOID_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a[^>]*href="javascript:void\(0\);?"[^>]*>.*?</a\s*>"#).unwrap()
});
static LOGO_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<img[^>]*(?:class="[^"]*\blogo\b[^"]*"|src="[^"]*logo[^"]*")[^>]*>"#)
        .unwrap()
});
static QUOTE_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<img[^>]*src="[^"]*quote[^"]*"[^>]*>"#).unwrap()
});
static SIGNATURE_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<img[^>]*src="[^"]*signature[^"]*"[^>]*>"#).unwrap()
});
static QUIZ_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a[^>]*href="[^"]*/quiz[^"]*"[^>]*>.*?</a\s*>"#).unwrap()
});

static EMOJI_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<img[^>]*(?:class="[^"]*\bemoji\b[^"]*"|src="[^"]*images/core/emoji[^"]*")[^>]*>"#)
        .unwrap()
});
static ALT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)alt\s*=\s*"([^"]*)""#).unwrap());

static STYLE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\s*style\s*=\s*(?:"[^"]*"|'[^']*')"#).unwrap());
static IMG_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<img[^>]*>").unwrap());
static SIZE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+(?:width|height)\s*=\s*(?:"[^"]*"|'[^']*'|\d+)"#).unwrap()
});

static H1_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h1\b").unwrap());
static H1_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</h1\s*>").unwrap());

static EMPTY_P_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<p[^>]*>(?:\s|&nbsp;|<br\s*/?>)*</p\s*>").unwrap()
});
static EMPTY_DIV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<div[^>]*>\s*</div\s*>").unwrap());

static LEADING_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*</[a-zA-Z][a-zA-Z0-9-]*\s*>").unwrap());
static LEADING_DIV_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<div[^>]*>").unwrap());
static DIV_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<div\b").unwrap());
static DIV_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</div\s*>").unwrap());

/// Strip legacy chrome from a raw markup string. Ordered total-document
/// textual rewrites; tolerates unbalanced markup and is a fixed point when
/// applied twice.
pub fn strip_boilerplate(raw: &str) -> String {
    let mut html = truncate_at_footer(raw);

    // Script/style blocks, including an unclosed trailing one.
    html = SCRIPT_RE.replace_all(&html, "").into_owned();
    html = STYLE_RE.replace_all(&html, "").into_owned();
    html = OPEN_SCRIPT_RE.replace(&html, "").into_owned();

    html = remove_header(&html);

    for re in [
        &*SVG_RE,
        &*HIDDEN_DIV_RE,
        &*VOID_ANCHOR_RE,
        &*LOGO_IMG_RE,
        &*QUOTE_IMG_RE,
        &*SIGNATURE_IMG_RE,
        &*QUIZ_ANCHOR_RE,
    ] {
        html = re.replace_all(&html, "").into_owned();
    }

    // Emoji placeholder images become their alt text.
    html = EMOJI_IMG_RE
        .replace_all(&html, |caps: &regex::Captures| {
            ALT_RE
                .captures(&caps[0])
                .map(|alt| alt[1].to_string())
                .unwrap_or_default()
        })
        .into_owned();

    // Downstream layout owns sizing.
    html = STYLE_ATTR_RE.replace_all(&html, "").into_owned();
    html = IMG_TAG_RE
        .replace_all(&html, |caps: &regex::Captures| {
            SIZE_ATTR_RE.replace_all(&caps[0], "").into_owned()
        })
        .into_owned();

    // The host page supplies its own top-level heading.
    html = H1_OPEN_RE.replace_all(&html, "<h2").into_owned();
    html = H1_CLOSE_RE.replace_all(&html, "</h2>").into_owned();

    html = EMPTY_P_RE.replace_all(&html, "").into_owned();
    loop {
        let next = EMPTY_DIV_RE.replace_all(&html, "").into_owned();
        if next == html {
            break;
        }
        html = next;
    }

    trim_leading_orphans(&html)
}

/// Truncate at the earliest trailing-chrome marker, backing up to the start
/// of the containing tag when the marker sits mid-tag.
fn truncate_at_footer(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let cut = FOOTER_MARKERS
        .iter()
        .filter_map(|m| lower.find(m))
        .min();
    match cut {
        Some(pos) => {
            let start = if html[pos..].starts_with('<') {
                pos
            } else {
                html[..pos].rfind('<').unwrap_or(pos)
            };
            html[..start].to_string()
        }
        None => html.to_string(),
    }
}

fn remove_header(html: &str) -> String {
    if let Some(m) = HEADER_CLOSE_RE.find(html) {
        return html[m.end()..].to_string();
    }
    // No header wrapper: drop leftover navigation fragments individually.
    let mut out = LOGO_ANCHOR_RE.replace(html, "").into_owned();
    out = NAV_RE.replace(&out, "").into_owned();
    MENU_LIST_RE.replace(&out, "").into_owned()
}

/// Trim leading orphaned closing tags and leading unbalanced `<div>` opens,
/// both artifacts of the truncation passes.
fn trim_leading_orphans(html: &str) -> String {
    let mut rest = html.trim_start().to_string();
    loop {
        if let Some(m) = LEADING_CLOSE_RE.find(&rest) {
            rest = rest[m.end()..].trim_start().to_string();
            continue;
        }
        if let Some(m) = LEADING_DIV_OPEN_RE.find(&rest) {
            let opens = DIV_OPEN_RE.find_iter(&rest).count();
            let closes = DIV_CLOSE_RE.find_iter(&rest).count();
            if opens > closes {
                rest = rest[m.end()..].trim_start().to_string();
                continue;
            }
        }
        break;
    }
    rest
}
