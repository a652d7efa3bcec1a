//! Code-block extraction from model replies.
//!
//! Finds the first fenced block tagged as data (```` ```json ````,
//! ```` ```python ```` or untagged) and decodes it with a strict JSON parser.
//! Nothing in a reply is ever executed.

use crate::error::{self, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Prefix of the legacy error string for undecodable blocks
pub const DECODE_ERROR_PREFIX: &str = "Error decoding code block:";

const DATA_LANGUAGES: &[&str] = &["json", "python", ""];

/// A fenced block found in a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    /// The info string after the opening fence, lowercased is up to the caller
    pub language: &'a str,
    /// Inner text, trimmed
    pub body: &'a str,
}

/// Outcome of decoding a reply
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// A data block was found and decoded
    Value(Value),
    /// No data block was found; the reply, unchanged
    Raw(String),
    /// A data block was found but is not valid JSON
    Invalid { code: String, error: String },
}

impl Extracted {
    pub fn is_value(&self) -> bool {
        matches!(self, Extracted::Value(_))
    }

    /// The decoded value, if any
    pub fn value(&self) -> Option<&Value> {
        match self {
            Extracted::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Collapse into a single value: raw text and decode errors become
    /// strings, the latter starting with [`DECODE_ERROR_PREFIX`].
    pub fn into_value(self) -> Value {
        match self {
            Extracted::Value(v) => v,
            Extracted::Raw(text) => Value::String(text),
            Extracted::Invalid { error, .. } => {
                Value::String(format!("{} {}", DECODE_ERROR_PREFIX, error))
            }
        }
    }

    /// Treat anything but a decoded value as an invalid response
    pub fn into_result(self) -> Result<Value> {
        match self {
            Extracted::Value(v) => Ok(v),
            Extracted::Raw(text) => Err(error::invalid_response("reply has no code block", &text)
                .with_operation("extract::into_result")),
            Extracted::Invalid { code, error } => Err(error::invalid_response(
                format!("{} {}", DECODE_ERROR_PREFIX, error),
                &code,
            )
            .with_operation("extract::into_result")),
        }
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```([A-Za-z0-9_+\-]*)(.*?)```").expect("fence pattern is valid")
    })
}

/// Every fenced block in the text, in order
pub fn code_blocks(text: &str) -> Vec<CodeBlock<'_>> {
    fence_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let language = caps.get(1)?.as_str();
            let body = caps.get(2)?.as_str().trim();
            Some(CodeBlock { language, body })
        })
        .collect()
}

/// The first fenced block whose language is one of `languages`
/// (compared case-insensitively; `""` matches untagged fences)
pub fn find_code_block<'a>(text: &'a str, languages: &[&str]) -> Option<CodeBlock<'a>> {
    code_blocks(text).into_iter().find(|block| {
        languages
            .iter()
            .any(|lang| block.language.eq_ignore_ascii_case(lang))
    })
}

/// Decode the first data block of a model reply
pub fn extract_code_block(text: &str) -> Extracted {
    let Some(block) = find_code_block(text, DATA_LANGUAGES) else {
        return Extracted::Raw(text.to_string());
    };

    match serde_json::from_str::<Value>(block.body) {
        Ok(value) => Extracted::Value(value),
        Err(e) => Extracted::Invalid {
            code: block.body.to_string(),
            error: e.to_string(),
        },
    }
}
