//! # Prompt templates
//!
//! Static prompt text with `{name}` placeholders. Literal braces are written
//! doubled (`{{` / `}}`), so JSON examples can live inside a template.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// A parameterized prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    name: &'static str,
    text: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, text: &'static str) -> Self {
        Self { name, text }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn text(&self) -> &'static str {
        self.text
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Result<Vec<&'static str>> {
        let mut names = Vec::new();
        for segment in self.segments()? {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    /// Fill every placeholder; a placeholder without a value is an error
    pub fn render(&self, vars: &PromptVars) -> Result<String> {
        let mut out = String::with_capacity(self.text.len());
        for segment in self.segments()? {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Brace(c) => out.push(c),
                Segment::Placeholder(name) => {
                    let value = vars.get(name).ok_or_else(|| {
                        Error::template_variable_missing(name)
                            .with_operation("prompt::render")
                            .with_context("template", self.name)
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    fn segments(&self) -> Result<Vec<Segment>> {
        let text = self.text;
        let bytes = text.as_bytes();
        let mut segments = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'{' if bytes.get(i + 1) == Some(&b'{') => {
                    segments.push(Segment::Literal(&text[start..i]));
                    segments.push(Segment::Brace('{'));
                    i += 2;
                    start = i;
                }
                b'}' if bytes.get(i + 1) == Some(&b'}') => {
                    segments.push(Segment::Literal(&text[start..i]));
                    segments.push(Segment::Brace('}'));
                    i += 2;
                    start = i;
                }
                b'{' => {
                    let close = text[i + 1..]
                        .find('}')
                        .map(|off| i + 1 + off)
                        .ok_or_else(|| self.brace_error(i))?;
                    let name = &text[i + 1..close];
                    if name.is_empty()
                        || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
                    {
                        return Err(self.brace_error(i));
                    }
                    segments.push(Segment::Literal(&text[start..i]));
                    segments.push(Segment::Placeholder(name));
                    i = close + 1;
                    start = i;
                }
                b'}' => return Err(self.brace_error(i)),
                _ => i += 1,
            }
        }
        segments.push(Segment::Literal(&text[start..]));
        Ok(segments)
    }

    fn brace_error(&self, offset: usize) -> Error {
        Error::invalid_argument("single brace in template; use '{{' or '}}' for literals")
            .with_operation("prompt::segments")
            .with_context("template", self.name)
            .with_context("offset", offset.to_string())
    }
}

enum Segment {
    Literal(&'static str),
    Brace(char),
    Placeholder(&'static str),
}

/// Named values for a template
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    values: BTreeMap<String, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value verbatim
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Insert a value rendered as compact JSON (lists of names, configs)
    pub fn json<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        let rendered = serde_json::to_string(value).unwrap_or_default();
        self.values.insert(name.into(), rendered);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}
