//! Node label parsing.
//!
//! Labels are carried in a VM's `labels` tag using URL query-string
//! syntax, with comma-separated values:
//!
//! ```text
//! env=prod,staging&tier=web&ssd
//! ```
//!
//! which parses to `{env: [prod, staging], ssd: [], tier: [web]}`.

use std::borrow::Cow;
use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Label name to values. Ordered so generated commands are stable.
pub type Labels = BTreeMap<String, Vec<String>>;

pub type LabelResult<T> = Result<T, LabelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("invalid semicolon separator in labels {0:?}")]
    Semicolon(String),

    #[error("invalid percent escape in label pair {0:?}")]
    InvalidEscape(String),

    #[error("empty label name in pair {0:?}")]
    EmptyKey(String),

    #[error("label pair {0:?} is not valid UTF-8 once decoded")]
    InvalidUtf8(String),
}

/// Parse a query-string label set.
///
/// Blank input yields an empty map. A key given without `=` maps to no
/// values; repeated keys accumulate.
pub fn parse_labels(text: &str) -> LabelResult<Labels> {
    let text = text.trim();
    let mut labels = Labels::new();
    if text.is_empty() {
        return Ok(labels);
    }

    if text.contains(';') {
        return Err(LabelError::Semicolon(text.to_string()));
    }

    for pair in text.split('&').filter(|p| !p.is_empty()) {
        if !valid_escapes(pair) {
            return Err(LabelError::InvalidEscape(pair.to_string()));
        }

        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(raw_key, pair)?;
        let value = decode(raw_value, pair)?;
        if key.is_empty() {
            return Err(LabelError::EmptyKey(pair.to_string()));
        }

        let values = labels.entry(key).or_default();
        if pair.contains('=') {
            values.extend(value.split(',').filter(|v| !v.is_empty()).map(str::to_string));
        }
    }

    Ok(labels)
}

/// Form-decode one side of `pair`: `+` is a space, `%XX` a raw byte.
fn decode(component: &str, pair: &str) -> LabelResult<String> {
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| LabelError::InvalidUtf8(pair.to_string()))
}

/// Every `%` must introduce two hex digits.
fn valid_escapes(pair: &str) -> bool {
    let bytes = pair.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3);
            if !hex.is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}
