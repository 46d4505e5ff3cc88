use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use crate::model::SAFETY_BLOCK_MARKER;

static INVISIBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<template\b.*?</template\s*>|<!--.*?-->",
    )
    .unwrap()
});
static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(?:br|p|div|li|ul|ol|tr|table|thead|tbody|section|article|header|footer|main|nav|aside|h[1-6]|dt|dd|dl|form|button)\b[^>]*>",
    )
    .unwrap()
});
static ANY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[A-Za-z!][^>]*>").unwrap());
static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}\r\f\v]+").unwrap());
static PHONE_PARTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?(\d{3})\)?[\s.-]?(\d{3})[\s.-]?(\d{4})").unwrap());

pub const DATE: &str = r"\d{1,2}/\d{1,2}/\d{2,4}";
pub const NUMBER: &str = r"\d+(?:\.\d+)?";
pub const EMAIL: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";
pub const PHONE: &str = r"\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}";

// ── Markup stripping ──

/// Reduce a harvested blob to plain text with one visible fragment per line.
///
/// The tagged safety block is plain text appended after the markup; it is
/// split off first and re-appended verbatim so stripping never touches it.
pub fn strip_markup(input: &str) -> String {
    let (body, block) = match input.find(SAFETY_BLOCK_MARKER) {
        Some(idx) => (&input[..idx], Some(&input[idx..])),
        None => (input, None),
    };

    let text = INVISIBLE_RE.replace_all(body, " ");
    let text = BLOCK_TAG_RE.replace_all(&text, "\n");
    let text = ANY_TAG_RE.replace_all(&text, " ");
    let text = decode_entities(&text);

    let mut out = String::with_capacity(text.len());
    let mut blank_run = true;
    for line in text.lines() {
        let line = HSPACE_RE.replace_all(line, " ");
        let line = line.trim();
        if line.is_empty() {
            if !blank_run {
                out.push('\n');
                blank_run = true;
            }
            continue;
        }
        out.push_str(line);
        out.push('\n');
        blank_run = false;
    }
    let mut out = out.trim_end().to_string();

    if let Some(block) = block {
        out.push_str("\n\n");
        out.push_str(block);
    }
    out
}

/// Character references decoded by the HTML parser. Tags are already gone,
/// so any `<` left is text and is escaped before parsing.
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    Html::parse_fragment(&s.replace('<', "&lt;")).root_element().text().collect()
}

// ── Sections ──

/// Text from the first match of `start` up to the first match of `end`
/// after it (or the end of `text`).
pub fn section<'a>(text: &'a str, start: &Regex, end: &Regex) -> Option<&'a str> {
    let m = start.find(text)?;
    Some(bounded_from(text, m.start(), m.end(), end))
}

/// Every section opened by a match of `start`, in document order.
pub fn sections<'a>(text: &'a str, start: &Regex, end: &Regex) -> Vec<&'a str> {
    start
        .find_iter(text)
        .map(|m| bounded_from(text, m.start(), m.end(), end))
        .collect()
}

fn bounded_from<'a>(text: &'a str, from: usize, search_from: usize, end: &Regex) -> &'a str {
    let stop = end
        .find_at(text, search_from)
        .map(|e| e.start())
        .unwrap_or(text.len());
    &text[from..stop]
}

// ── Field cascades ──

/// Ordered patterns for one field; the first that captures wins.
pub struct FieldCascade {
    patterns: Vec<Regex>,
}

impl FieldCascade {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// Value on the same line as the label, then on the next line, then
    /// after one blank line. `label` and `value` are regex fragments; `value`
    /// must contain exactly one capture group.
    pub fn layouts(label: &str, value: &str) -> Self {
        let same_line = format!(r"(?im){label}[: \t]+{value}");
        let next_line = format!(r"(?im){label}[: \t]*\n[ \t]*{value}");
        let after_blank = format!(r"(?im){label}[: \t]*\n[ \t]*\n[ \t]*{value}");
        Self::new(
            [same_line, next_line, after_blank]
                .iter()
                .map(|p| Regex::new(p).unwrap())
                .collect(),
        )
    }

    pub fn find(&self, text: &str) -> Option<String> {
        first_capture(text, self.patterns.iter())
    }
}

/// First non-empty, trimmed group 1 across `patterns`.
pub fn first_capture<'r>(text: &str, patterns: impl IntoIterator<Item = &'r Regex>) -> Option<String> {
    patterns.into_iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Run attempts in order, returning the first success.
pub fn first_success<T>(text: &str, attempts: &[&dyn Fn(&str) -> Option<T>]) -> Option<T> {
    attempts.iter().find_map(|attempt| attempt(text))
}

/// Cut `value` at the first stop word, then keep it only if it is shorter
/// than `max_len`.
pub fn trim_scalar(value: &str, stop: &Regex, max_len: usize) -> Option<String> {
    let cut = match stop.find(value) {
        Some(m) => &value[..m.start()],
        None => value,
    };
    let cut = cut.trim();
    (!cut.is_empty() && cut.len() < max_len).then(|| cut.to_string())
}

pub fn parse_num<T: FromStr>(s: &str) -> Option<T> {
    s.trim().trim_start_matches('$').replace(',', "").parse().ok()
}

/// "(555) 123-4567" form for any ten-digit phone.
pub fn normalize_phone(s: &str) -> Option<String> {
    let caps = PHONE_PARTS_RE.captures(s)?;
    Some(format!("({}) {}-{}", &caps[1], &caps[2], &caps[3]))
}

/// `text[start..end]` widened to the nearest char boundaries.
pub fn window(text: &str, start: usize, end: usize) -> &str {
    let mut s = start.min(text.len());
    while !text.is_char_boundary(s) {
        s -= 1;
    }
    let mut e = end.min(text.len());
    while !text.is_char_boundary(e) {
        e += 1;
    }
    &text[s..e]
}

// ── Tests ──
