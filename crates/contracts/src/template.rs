//! Metadata templates for field rules.
//!
//! Templates use `${path}` syntax. The first path segment names a metadata
//! key, or `payload` for the JSON payload; further segments walk into the
//! JSON value.
//!
//! `payload` is reserved: `${payload...}` always reads the payload, so a
//! metadata entry stored under the key `payload` is not reachable from a
//! template. Use a `metadata` rule to read such an entry.
//!
//! ```text
//! "orders.${region}"          → "orders.eu"
//! "${tenant}.${payload.kind}" → "acme.created"
//! "static-topic"              → "static-topic"
//! ```
//!
//! Templates are compiled once when the rule is built; resolution is
//! segment concatenation.

use serde_json::Value;
use thiserror::Error;

use crate::Message;

/// Maximum number of dotted segments in a variable path
const MAX_PATH_DEPTH: usize = 3;

/// Template parsing error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed '${{' at position {pos} in template: {raw}")]
    UnclosedVariable { raw: String, pos: usize },

    #[error("path '{path}' exceeds max depth of 3 segments in template: {raw}")]
    PathTooDeep { raw: String, path: String },

    #[error("empty variable '${{}}' at position {pos} in template: {raw}")]
    EmptyVariable { raw: String, pos: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(Vec<String>),
}

/// Compiled template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    segments: Vec<Segment>,
    raw: String,
}

impl CompiledTemplate {
    /// Parse a template string
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = raw;
        let mut offset = 0;

        while let Some(start) = rest.find("${") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }

            let after_open = start + 2;
            let Some(end) = rest[after_open..].find('}') else {
                return Err(TemplateError::UnclosedVariable {
                    raw: raw.to_string(),
                    pos: offset + start,
                });
            };
            let end_abs = after_open + end;

            let path = &rest[after_open..end_abs];
            if path.is_empty() {
                return Err(TemplateError::EmptyVariable {
                    raw: raw.to_string(),
                    pos: offset + start,
                });
            }

            let parts: Vec<String> = path.split('.').map(str::to_string).collect();
            if parts.len() > MAX_PATH_DEPTH {
                return Err(TemplateError::PathTooDeep {
                    raw: raw.to_string(),
                    path: path.to_string(),
                });
            }
            segments.push(Segment::Variable(parts));

            offset += end_abs + 1;
            rest = &rest[end_abs + 1..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            segments,
            raw: raw.to_string(),
        })
    }

    /// Original template text
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// True when the template has no variables
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Render against a message
    ///
    /// Returns the first unresolvable variable path on failure.
    pub fn render(&self, message: &Message) -> Result<String, String> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(path) => {
                    let value = lookup(message, path).ok_or_else(|| path.join("."))?;
                    match value {
                        Value::String(s) => out.push_str(s),
                        Value::Null => return Err(path.join(".")),
                        other => out.push_str(&other.to_string()),
                    }
                }
            }
        }
        Ok(out)
    }
}

fn lookup<'a>(message: &'a Message, path: &[String]) -> Option<&'a Value> {
    let (head, tail) = path.split_first()?;
    let root = if head == "payload" {
        message.payload().as_json()?
    } else {
        message.get(head)?
    };
    tail.iter().try_fold(root, |value, segment| value.get(segment.as_str()))
}
