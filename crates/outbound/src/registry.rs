//! SinkRegistry - named sinks shared by handlers

use std::collections::HashMap;
use tracing::{info, instrument};

use contracts::{SinkConfig, SinkType};

use crate::error::OutboundError;
use crate::handle::{SinkHandle, SinkRef};
use crate::metrics::SinkSnapshot;
use crate::sinks::{FileSink, LogSink};

/// Owns running sink workers, addressable by name
#[derive(Default)]
pub struct SinkRegistry {
    handles: HashMap<String, SinkHandle>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running sink
    ///
    /// # Errors
    /// `Configuration` if the name is taken.
    pub fn register(&mut self, handle: SinkHandle) -> Result<SinkRef, OutboundError> {
        let name = handle.name().to_string();
        if self.handles.contains_key(&name) {
            return Err(OutboundError::configuration(format!(
                "sink '{name}' is already registered"
            )));
        }
        let sink_ref = handle.sender();
        self.handles.insert(name, handle);
        Ok(sink_ref)
    }

    pub fn get(&self, name: &str) -> Option<SinkRef> {
        self.handles.get(name).map(SinkHandle::sender)
    }

    /// Look up a sink that must exist
    pub fn resolve(&self, name: &str) -> Result<SinkRef, OutboundError> {
        self.get(name)
            .ok_or_else(|| OutboundError::configuration(format!("unknown sink '{name}'")))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Metrics for all sinks, sorted by name
    pub fn metrics(&self) -> Vec<(String, SinkSnapshot)> {
        let mut metrics: Vec<_> = self
            .handles
            .iter()
            .map(|(name, h)| (name.clone(), h.metrics().snapshot()))
            .collect();
        metrics.sort_by(|a, b| a.0.cmp(&b.0));
        metrics
    }

    /// Drain and close every sink
    #[instrument(name = "sink_registry_shutdown", skip(self), fields(sinks = self.handles.len()))]
    pub async fn shutdown(self) {
        for (_, handle) in self.handles {
            handle.shutdown().await;
        }
        info!("All sinks shut down");
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "sink_registry_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, OutboundError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| OutboundError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::ChannelSink;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_register_and_resolve() {
        let mut registry = SinkRegistry::new();
        let (sink, _rx) = ChannelSink::new("errors");
        registry.register(SinkHandle::spawn(sink, 4)).unwrap();

        assert_eq!(registry.resolve("errors").unwrap().name(), "errors");
        assert!(matches!(
            registry.resolve("missing"),
            Err(OutboundError::Configuration { .. })
        ));
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let mut registry = SinkRegistry::new();
        registry
            .register(SinkHandle::spawn(LogSink::new("log"), 4))
            .unwrap();
        let duplicate = registry.register(SinkHandle::spawn(LogSink::new("log"), 4));
        assert!(duplicate.is_err());
        assert_eq!(registry.names(), vec!["log"]);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_create_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = SinkConfig {
            name: "file".into(),
            sink_type: SinkType::File,
            queue_capacity: 8,
            params: HashMap::from([(
                "path".to_string(),
                dir.path().join("out.jsonl").display().to_string(),
            )]),
        };

        let handle = create_sink_handle(&config).unwrap();
        assert_eq!(handle.name(), "file");
        handle.shutdown().await;
        assert!(dir.path().join("out.jsonl").exists());
    }
}
