//! Decoding of `docker ... --format '{{ json . }}'` output.
//!
//! `docker info` prints one JSON document; `docker node ls` and
//! `docker node ps` print one document per line. A malformed document
//! fails the whole decode.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("error parsing json document: {0}")]
    Document(#[source] serde_json::Error),

    #[error("error parsing json on line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Decode a single JSON document.
pub fn decode_document<T: DeserializeOwned>(data: &[u8]) -> DecodeResult<T> {
    serde_json::from_slice(data).map_err(DecodeError::Document)
}

/// Decode one JSON document per line. Blank lines are ignored.
pub fn decode_lines<T: DeserializeOwned>(data: &[u8]) -> DecodeResult<Vec<T>> {
    data.split(|&b| b == b'\n')
        .enumerate()
        .filter(|(_, line)| !line.trim_ascii().is_empty())
        .map(|(idx, line)| {
            serde_json::from_slice(line).map_err(|source| DecodeError::Line {
                line: idx + 1,
                source,
            })
        })
        .collect()
}
