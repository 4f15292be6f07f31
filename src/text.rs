//! Text normalization for page content and comment bodies.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::Html;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_ASCII_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\x00-\x7F]+").unwrap());
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").unwrap());

const BULLET: char = '\u{2022}';

/// Reduce an HTML page to a single line of ASCII text.
///
/// Script and style bodies are dropped, runs of non-ASCII characters become a
/// space, and whitespace runs collapse to one space.
pub fn clean_html(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut text = String::with_capacity(html.len() / 2);
    for node in doc.root_element().descendants() {
        let Some(t) = node.value().as_text() else {
            continue;
        };
        let in_code = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
        if !in_code {
            text.push_str(t);
        }
    }
    let ascii = NON_ASCII_RE.replace_all(&text, " ");
    collapse_whitespace(&ascii)
}

/// Collapse whitespace runs to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Normalize a scraped comment body: decode entities, collapse whitespace,
/// and turn bullet glyphs into hyphens.
pub fn normalize_comment(raw: &str) -> String {
    let decoded = decode_entities(raw);
    collapse_whitespace(&decoded).replace(BULLET, "-")
}

/// Decode numeric character references and the common named entities.
/// Unknown names are left untouched.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "bull" => BULLET,
        "middot" => '\u{b7}',
        "sect" => '\u{a7}',
        "para" => '\u{b6}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "deg" => '\u{b0}',
        "frac12" => '\u{bd}',
        _ => return None,
    };
    Some(c)
}
