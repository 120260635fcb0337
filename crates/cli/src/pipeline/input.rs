//! JSON-lines input.
//!
//! 每行一条消息：`{"payload": ..., "headers": {...}}`，或直接把整行 JSON 作为 payload。

use std::path::Path;

use contracts::{Message, Payload};
use serde_json::Value;
use tokio::io::{AsyncBufRead, BufReader};

use crate::error::{CliError, Result};

/// Open the input file, or stdin when no path is given
pub async fn open_input(path: Option<&Path>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

/// Parse one input line into a message
pub fn parse_line(line_no: u64, line: &str) -> Result<Message> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| CliError::input_parse(line_no, e.to_string()))?;

    match value {
        Value::Object(mut fields) if fields.contains_key("payload") => {
            let payload = fields.remove("payload").unwrap_or(Value::Null);
            let mut builder = Message::builder(to_payload(payload));
            match fields.remove("headers") {
                None | Some(Value::Null) => {}
                Some(Value::Object(headers)) => {
                    for (key, value) in headers {
                        builder = builder.with_metadata(key, value);
                    }
                }
                Some(other) => {
                    return Err(CliError::input_parse(
                        line_no,
                        format!("'headers' must be an object, got {other}"),
                    ));
                }
            }
            Ok(builder.build())
        }
        other => Ok(Message::new(to_payload(other))),
    }
}

// JSON 字符串按文本发送，不带引号
fn to_payload(value: Value) -> Payload {
    match value {
        Value::String(text) => Payload::Text(text),
        other => Payload::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncBufReadExt;

    #[test]
    fn test_payload_and_headers() {
        let message = parse_line(
            1,
            r#"{"payload": {"id": 7}, "headers": {"region": "eu", "kafka_partitionId": 2}}"#,
        )
        .unwrap();
        assert_eq!(message.payload(), &Payload::Json(json!({"id": 7})));
        assert_eq!(message.get("region"), Some(&json!("eu")));
        assert_eq!(message.get("kafka_partitionId"), Some(&json!(2)));
    }

    #[test]
    fn test_bare_values() {
        let text = parse_line(1, r#""hello""#).unwrap();
        assert_eq!(text.payload(), &Payload::Text("hello".into()));

        let doc = parse_line(2, r#"{"id": 1}"#).unwrap();
        assert_eq!(doc.payload(), &Payload::Json(json!({"id": 1})));

        let tombstone = parse_line(3, r#"{"payload": null}"#).unwrap();
        assert!(tombstone.payload().is_null());
    }

    #[test]
    fn test_invalid_lines() {
        let err = parse_line(4, "{not json").unwrap_err();
        assert!(err.to_string().contains("line 4"));

        let err = parse_line(5, r#"{"payload": 1, "headers": [1]}"#).unwrap_err();
        assert!(err.to_string().contains("'headers' must be an object"));
    }

    #[tokio::test]
    async fn test_open_file_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.jsonl");
        std::fs::write(&path, "1\n2\n").unwrap();

        let reader = open_input(Some(&path)).await.unwrap();
        let mut lines = reader.lines();
        let mut count = 0;
        while let Some(_line) = lines.next_line().await.unwrap() {
            count += 1;
        }
        assert_eq!(count, 2);

        assert!(open_input(Some(&dir.path().join("missing.jsonl")))
            .await
            .is_err());
    }
}
