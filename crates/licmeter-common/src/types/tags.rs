//! Tag sanitization
//!
//! Tags travel as dimensions on ingestion lines, so keys are reduced to the
//! dimension alphabet and values are quote-escaped. Every entity kind goes
//! through the same rules and the same entry cap.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum tags kept per entity
pub const MAX_TAGS: usize = 50;

/// Maximum tag key length in characters
pub const MAX_TAG_KEY_LEN: usize = 100;

/// Maximum tag value length in characters (escape pairs count once)
pub const MAX_TAG_VALUE_LEN: usize = 250;

/// Sanitized tags, ordered by key
pub type TagMap = BTreeMap<String, String>;

/// Tag as returned by the inventory API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTag {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl RawTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

/// Reduce a tag key to `[0-9a-z_-]`, at most 100 characters.
///
/// Returns `None` when nothing usable is left or the key is purely numeric.
pub fn sanitize_tag_key(raw: &str) -> Option<String> {
    let key: String = raw
        .chars()
        .filter(|c| *c != ' ')
        .flat_map(char::to_lowercase)
        .take(MAX_TAG_KEY_LEN)
        .filter(|c| matches!(c, '0'..='9' | 'a'..='z' | '_' | '-'))
        .collect();

    if key.is_empty() || key.chars().all(|c| c.is_ascii_digit()) {
        None
    } else {
        Some(key)
    }
}

/// Truncate a tag value to 250 characters and escape its quotes.
pub fn sanitize_tag_value(raw: &str) -> String {
    escape_limited(raw, Some(MAX_TAG_VALUE_LEN))
}

/// Escape `"` and `'` with a backslash, leaving already escaped quotes alone.
pub fn escape_quotes(raw: &str) -> String {
    escape_limited(raw, None)
}

fn escape_limited(raw: &str, limit: Option<usize>) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    let mut logical = 0usize;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if limit.is_some_and(|max| logical >= max) {
            break;
        }
        match c {
            '\\' if matches!(chars.peek(), Some('"') | Some('\'')) => {
                out.push('\\');
                if let Some(quote) = chars.next() {
                    out.push(quote);
                }
            }
            '"' | '\'' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
        logical += 1;
    }

    // a trailing backslash would swallow the closing quote of the dimension
    while out.ends_with('\\') {
        out.pop();
    }
    out
}

/// Build a capped, sanitized tag map. Tags without a value are ignored.
pub fn collect_tags<'a, I>(tags: I) -> TagMap
where
    I: IntoIterator<Item = &'a RawTag>,
{
    let mut map = TagMap::new();
    for tag in tags {
        let Some(value) = tag.value.as_deref() else {
            continue;
        };
        let Some(key) = sanitize_tag_key(&tag.key) else {
            continue;
        };
        if map.contains_key(&key) || map.len() < MAX_TAGS {
            map.insert(key, sanitize_tag_value(value));
        }
    }
    map
}
