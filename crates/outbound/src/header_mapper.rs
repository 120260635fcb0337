//! DefaultHeaderMapper - metadata to broker headers
//!
//! Patterns are checked in order and the first match decides. A leading `!`
//! excludes the key, `*` matches any run of characters.
//!
//! | value type | header bytes | recorded in `json_header_types` |
//! |------------|--------------|---------------------------------|
//! | string     | raw UTF-8    | no                              |
//! | other      | JSON text    | yes (`"number"`, `"bool"`, ...) |

use serde_json::{Map, Value};

use contracts::{default_header_patterns, HeaderMapper, Metadata, RecordHeaders};

/// Header carrying the JSON type of every non-string header
pub const JSON_TYPES_HEADER: &str = "json_header_types";

/// One compiled pattern
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderPattern {
    glob: String,
    negate: bool,
}

impl HeaderPattern {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('!') {
            Some(rest) => Self {
                glob: rest.to_string(),
                negate: true,
            },
            None => Self {
                glob: raw.to_string(),
                negate: false,
            },
        }
    }

    fn matches(&self, key: &str) -> bool {
        glob_match(&self.glob, key)
    }
}

/// `*`-only glob matcher
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    if !pattern.contains('*') {
        return pattern == text;
    }
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let segments: Vec<&str> = parts.collect();
    let (last, middle) = match segments.split_last() {
        Some((last, middle)) => (*last, middle),
        None => return true,
    };
    for segment in middle {
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Pattern-driven header mapper
#[derive(Debug, Clone)]
pub struct DefaultHeaderMapper {
    patterns: Vec<HeaderPattern>,
}

impl Default for DefaultHeaderMapper {
    fn default() -> Self {
        Self::new(&default_header_patterns())
    }
}

impl DefaultHeaderMapper {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| HeaderPattern::parse(p.as_ref()))
                .collect(),
        }
    }

    /// True if the key should become a header
    pub fn is_mapped(&self, key: &str) -> bool {
        if key == JSON_TYPES_HEADER {
            return false;
        }
        self.patterns
            .iter()
            .find(|p| p.matches(key))
            .is_some_and(|p| !p.negate)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl HeaderMapper for DefaultHeaderMapper {
    fn from_metadata(&self, metadata: &Metadata) -> RecordHeaders {
        let mut headers = RecordHeaders::new();
        let mut types = Map::new();

        for (key, value) in metadata.iter().filter(|(k, _)| self.is_mapped(k)) {
            match value {
                Value::String(s) => headers.push(key.as_str(), s.clone().into_bytes()),
                other => {
                    headers.push(key.as_str(), other.to_string().into_bytes());
                    types.insert(key.clone(), Value::from(json_type(other)));
                }
            }
        }

        if !types.is_empty() {
            headers.push(JSON_TYPES_HEADER, Value::Object(types).to_string().into_bytes());
        }
        headers
    }
}
