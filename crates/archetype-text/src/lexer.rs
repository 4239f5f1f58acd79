//! Line tokenizer.
//!
//! Every non-blank line is either a type tag (`!Type`) or an entry
//! (`key:` / `key: value`). Nesting is carried by leading spaces only.

use crate::error::{Result, TextError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Body {
    Tag(String),
    Entry { key: String, value: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    /// 1-based line number in the input.
    pub number: usize,
    pub indent: usize,
    pub body: Body,
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let number = i + 1;
        let raw = raw.trim_end_matches('\r');
        if raw.trim().is_empty() {
            continue;
        }
        let rest = raw.trim_start_matches(' ');
        if rest.starts_with('\t') {
            return Err(TextError::syntax(number, "tabs are not allowed in indentation"));
        }
        let indent = raw.len() - rest.len();
        let body = match rest.strip_prefix('!') {
            Some(tag) => Body::Tag(tag.trim_end().to_string()),
            None => split_entry(rest).ok_or_else(|| TextError::syntax(number, "expected `key: value`"))?,
        };
        lines.push(Line { number, indent, body });
    }
    Ok(lines)
}

/// Splits at the first `:` outside double quotes.
fn split_entry(rest: &str) -> Option<Body> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                let key = rest[..i].to_string();
                let after = &rest[i + 1..];
                let value = if after.trim().is_empty() {
                    None
                } else {
                    Some(after.strip_prefix(' ')?.trim_end().to_string())
                };
                return Some(Body::Entry { key, value });
            }
            _ => {}
        }
    }
    None
}
