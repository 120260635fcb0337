//! FieldRule - per-field resolution strategy
//!
//! A rule computes one record field from a message. `Ok(None)` means
//! "absent"; errors are fatal for the invocation.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::{CompiledTemplate, ContractError, Message};

/// Closure-backed rule body
pub type RuleFn = Arc<dyn Fn(&Message) -> Result<Option<Value>, ContractError> + Send + Sync>;

/// Field resolution rule
#[derive(Clone)]
pub enum FieldRule {
    /// Always the same value
    Static(Value),
    /// Value of a metadata key
    Metadata(String),
    /// `${path}` interpolation over metadata and JSON payload
    Template(Arc<CompiledTemplate>),
    /// Arbitrary function
    Custom(RuleFn),
}

impl FieldRule {
    pub fn fixed(value: impl Into<Value>) -> Self {
        Self::Static(value.into())
    }

    pub fn metadata(key: impl Into<String>) -> Self {
        Self::Metadata(key.into())
    }

    /// Compile a template rule
    pub fn template(raw: &str) -> Result<Self, ContractError> {
        Ok(Self::Template(Arc::new(CompiledTemplate::parse(raw)?)))
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Message) -> Result<Option<Value>, ContractError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Evaluate against a message
    ///
    /// JSON `null` is normalised to `None`.
    pub fn evaluate(&self, message: &Message) -> Result<Option<Value>, ContractError> {
        let value = match self {
            FieldRule::Static(value) => Some(value.clone()),
            FieldRule::Metadata(key) => message.get(key).cloned(),
            FieldRule::Template(template) => {
                let rendered = template.render(message).map_err(|path| {
                    ContractError::rule_evaluation(
                        template.raw(),
                        format!("variable '{path}' is not resolvable"),
                    )
                })?;
                Some(Value::String(rendered))
            }
            FieldRule::Custom(f) => f(message)?,
        };
        Ok(value.filter(|v| !v.is_null()))
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRule::Static(value) => f.debug_tuple("Static").field(value).finish(),
            FieldRule::Metadata(key) => f.debug_tuple("Metadata").field(key).finish(),
            FieldRule::Template(t) => f.debug_tuple("Template").field(&t.raw()).finish(),
            FieldRule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
