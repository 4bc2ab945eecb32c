use std::ops::Range;

/// One token from the permissive tag scanner. Ranges index into the original
/// string, so callers can splice the source without re-serializing.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open {
        name: String,
        self_closing: bool,
        range: Range<usize>,
    },
    Close {
        name: String,
        range: Range<usize>,
    },
    Text {
        range: Range<usize>,
    },
    Comment {
        range: Range<usize>,
    },
}

/// Elements that never carry a closing tag. Their opens are reported as
/// self-closing so depth tracking stays balanced.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Elements whose content is raw text until the matching close tag.
const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea"];

/// Tokenize markup into tags and text runs. Never fails: anything that does
/// not scan as a tag is folded back into the surrounding text, and an
/// unterminated tag extends to the end of input.
pub fn tokens(html: &str) -> Vec<Token> {
    let bytes = html.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }

        let Some(token) = scan_tag(html, pos) else {
            // Literal '<' in text
            pos += 1;
            continue;
        };

        if text_start < pos {
            out.push(Token::Text {
                range: text_start..pos,
            });
        }

        let end = token_end(&token);
        let raw_name = match &token {
            Token::Open {
                name,
                self_closing: false,
                ..
            } if RAW_TEXT_TAGS.contains(&name.as_str()) => Some(name.clone()),
            _ => None,
        };
        out.push(token);
        pos = end;
        text_start = pos;

        // Raw-text content: everything until the matching close tag is text,
        // even if it contains '<'.
        if let Some(name) = raw_name {
            let (content_end, close) = find_raw_close(html, pos, &name);
            if content_end > pos {
                out.push(Token::Text {
                    range: pos..content_end,
                });
            }
            if let Some(close_range) = close {
                pos = close_range.end;
                out.push(Token::Close {
                    name,
                    range: close_range,
                });
            } else {
                pos = html.len();
            }
            text_start = pos;
        }
    }

    if text_start < bytes.len() {
        out.push(Token::Text {
            range: text_start..bytes.len(),
        });
    }

    out
}

fn token_end(token: &Token) -> usize {
    match token {
        Token::Open { range, .. }
        | Token::Close { range, .. }
        | Token::Text { range }
        | Token::Comment { range } => range.end,
    }
}

/// Try to scan a tag construct starting at `pos` (which points at '<').
/// Returns None when the '<' does not begin a tag.
fn scan_tag(html: &str, pos: usize) -> Option<Token> {
    let bytes = html.as_bytes();
    let next = *bytes.get(pos + 1)?;

    // Comment / declaration / processing instruction
    if next == b'!' {
        if html[pos..].starts_with("<!--") {
            let end = html[pos + 4..]
                .find("-->")
                .map(|i| pos + 4 + i + 3)
                .unwrap_or(html.len());
            return Some(Token::Comment { range: pos..end });
        }
        let end = html[pos..]
            .find('>')
            .map(|i| pos + i + 1)
            .unwrap_or(html.len());
        return Some(Token::Comment { range: pos..end });
    }
    if next == b'?' {
        let end = html[pos..]
            .find('>')
            .map(|i| pos + i + 1)
            .unwrap_or(html.len());
        return Some(Token::Comment { range: pos..end });
    }

    // Closing tag
    if next == b'/' {
        let name_start = pos + 2;
        let name_end = scan_name(bytes, name_start)?;
        let end = html[name_end..]
            .find('>')
            .map(|i| name_end + i + 1)
            .unwrap_or(html.len());
        return Some(Token::Close {
            name: html[name_start..name_end].to_ascii_lowercase(),
            range: pos..end,
        });
    }

    // Opening tag
    let name_end = scan_name(bytes, pos + 1)?;
    let name = html[pos + 1..name_end].to_ascii_lowercase();
    let (end, slash) = scan_attrs(bytes, name_end);
    let self_closing = slash || VOID_TAGS.contains(&name.as_str());
    Some(Token::Open {
        name,
        self_closing,
        range: pos..end,
    })
}

/// Scan a tag name at `start`: a letter followed by letters, digits or '-'.
fn scan_name(bytes: &[u8], start: usize) -> Option<usize> {
    if !bytes.get(start)?.is_ascii_alphabetic() {
        return None;
    }
    let mut i = start + 1;
    while i < bytes.len()
        && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-')
    {
        i += 1;
    }
    Some(i)
}

/// Walk attributes from `start` to the closing '>', honouring quoted values
/// (a '>' inside quotes does not end the tag). Returns (end, had '/' before '>').
fn scan_attrs(bytes: &[u8], start: usize) -> (usize, bool) {
    let mut i = start;
    let mut quote: Option<u8> = None;
    let mut last_non_ws = 0u8;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return (i + 1, last_non_ws == b'/'),
                _ => {}
            },
        }
        if !b.is_ascii_whitespace() && b != b'>' {
            last_non_ws = b;
        }
        i += 1;
    }
    (bytes.len(), false)
}

/// Find the end of raw-text content and the close tag for `name`, scanning
/// case-insensitively from `from`.
fn find_raw_close(html: &str, from: usize, name: &str) -> (usize, Option<Range<usize>>) {
    let bytes = html.as_bytes();
    let mut i = from;
    while i + 2 + name.len() <= bytes.len() {
        if bytes[i] == b'<' && bytes[i + 1] == b'/' {
            let cand = &html[i + 2..i + 2 + name.len()];
            if cand.eq_ignore_ascii_case(name) {
                let after = i + 2 + name.len();
                let end = html[after..]
                    .find('>')
                    .map(|j| after + j + 1)
                    .unwrap_or(html.len());
                return (i, Some(i..end));
            }
        }
        i += 1;
    }
    (html.len(), None)
}
