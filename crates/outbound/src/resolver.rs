//! FieldResolver - derives topic, partition, key and timestamp from a message

use serde_json::Value;
use tracing::trace;

use contracts::{metadata_keys, FieldRule, Message, ResolvedFields};

use crate::error::{OutboundError, RecordField};

/// Per-field resolution rules
///
/// A field without a rule falls back to its well-known metadata key.
#[derive(Debug, Clone, Default)]
pub struct FieldResolver {
    topic: Option<FieldRule>,
    partition: Option<FieldRule>,
    key: Option<FieldRule>,
    timestamp: Option<FieldRule>,
}

impl FieldResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, rule: FieldRule) -> Self {
        self.topic = Some(rule);
        self
    }

    pub fn with_partition(mut self, rule: FieldRule) -> Self {
        self.partition = Some(rule);
        self
    }

    pub fn with_key(mut self, rule: FieldRule) -> Self {
        self.key = Some(rule);
        self
    }

    pub fn with_timestamp(mut self, rule: FieldRule) -> Self {
        self.timestamp = Some(rule);
        self
    }

    /// Resolve all four fields
    ///
    /// # Errors
    /// - `Precondition` when the topic is missing or blank
    /// - `Resolution` when a rule fails or a value has the wrong shape
    pub fn resolve(&self, message: &Message) -> Result<ResolvedFields, OutboundError> {
        let topic = self
            .lookup(&self.topic, metadata_keys::TOPIC, RecordField::Topic, message)?
            .map(to_topic)
            .transpose()?
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| OutboundError::precondition("the 'topic' can not be empty or missing"))?;

        let partition = self
            .lookup(
                &self.partition,
                metadata_keys::PARTITION_ID,
                RecordField::Partition,
                message,
            )?
            .map(to_partition)
            .transpose()?;

        let key = self.lookup(&self.key, metadata_keys::MESSAGE_KEY, RecordField::Key, message)?;

        let timestamp = self
            .lookup(
                &self.timestamp,
                metadata_keys::TIMESTAMP,
                RecordField::Timestamp,
                message,
            )?
            .map(to_timestamp)
            .transpose()?;

        trace!(%topic, ?partition, has_key = key.is_some(), ?timestamp, "Fields resolved");

        Ok(ResolvedFields {
            topic,
            partition,
            key,
            timestamp,
        })
    }

    fn lookup(
        &self,
        rule: &Option<FieldRule>,
        fallback_key: &str,
        field: RecordField,
        message: &Message,
    ) -> Result<Option<Value>, OutboundError> {
        match rule {
            Some(rule) => rule
                .evaluate(message)
                .map_err(|e| OutboundError::resolution(field, e)),
            None => Ok(message.get(fallback_key).filter(|v| !v.is_null()).cloned()),
        }
    }
}

fn to_topic(value: Value) -> Result<String, OutboundError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(OutboundError::conversion(
            RecordField::Topic,
            format!("expected a string, got {other}"),
        )),
    }
}

fn to_partition(value: Value) -> Result<i32, OutboundError> {
    let raw = to_integer(&value, RecordField::Partition)?;
    i32::try_from(raw)
        .ok()
        .filter(|p| *p >= 0)
        .ok_or_else(|| {
            OutboundError::conversion(
                RecordField::Partition,
                format!("partition must be between 0 and {}, got {raw}", i32::MAX),
            )
        })
}

fn to_timestamp(value: Value) -> Result<i64, OutboundError> {
    let raw = to_integer(&value, RecordField::Timestamp)?;
    if raw < 0 {
        return Err(OutboundError::conversion(
            RecordField::Timestamp,
            format!("timestamp must be non-negative, got {raw}"),
        ));
    }
    Ok(raw)
}

/// Integer from a JSON number or numeric string
///
/// Floats are accepted only when finite and without a fractional part
/// (`2500.0` but not `2.5`).
pub(crate) fn to_integer(value: &Value, field: RecordField) -> Result<i64, OutboundError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_float)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| OutboundError::conversion(field, format!("expected an integer, got {value}")))
}

fn whole_float(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}
