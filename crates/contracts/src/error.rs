//! Layered error definitions
//!
//! Categorized by source: config / rule / sink / broker

use thiserror::Error;

use crate::TemplateError;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Rule Errors =====
    /// Template could not be compiled
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),

    /// Rule evaluation failed
    #[error("rule '{rule}' failed: {message}")]
    RuleEvaluation { rule: String, message: String },

    // ===== Sink Errors =====
    /// Sink delivery error
    #[error("sink '{sink_name}' delivery error: {message}")]
    SinkDelivery { sink_name: String, message: String },

    // ===== Broker Errors =====
    /// Broker client could not be created
    #[error("broker client error: {message}")]
    BrokerClient { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create rule evaluation error
    pub fn rule_evaluation(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuleEvaluation {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Create sink delivery error
    pub fn sink_delivery(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkDelivery {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create broker client error
    pub fn broker_client(message: impl Into<String>) -> Self {
        Self::BrokerClient {
            message: message.into(),
        }
    }
}
