//! FileSink - appends envelopes to a JSON Lines file

use contracts::{ContractError, Envelope, MessageSink};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file (created if missing, appended otherwise)
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output/outbound.jsonl"));

        Self { path }
    }
}

/// Sink that writes one JSON object per envelope
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl FileSink {
    /// Create a new FileSink, opening the file for append
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            config,
            writer: Some(BufWriter::new(file)),
            lines: 0,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    /// Lines written since open
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    fn write_line(&mut self, envelope: &Envelope) -> std::io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("file sink already closed"))?;
        serde_json::to_writer(&mut *writer, &envelope.to_json())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }
}

impl MessageSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_deliver",
        skip(self, envelope),
        fields(sink = %self.name, kind = envelope.kind())
    )]
    async fn deliver(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.write_line(envelope)
            .map_err(|e| ContractError::sink_delivery(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_delivery(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        self.writer = None;
        debug!(
            sink = %self.name,
            path = %self.config.path.display(),
            lines = self.lines,
            "FileSink closed"
        );
        Ok(())
    }
}
