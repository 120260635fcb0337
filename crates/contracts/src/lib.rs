//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Flow
//! `Message` → `ResolvedFields` → `OutboundRecord` → `OutcomeHandle` → `Envelope`

mod blueprint;
mod envelope;
mod error;
mod message;
mod outcome;
mod publish;
mod record;
mod rule;
mod sink;
mod template;

pub use blueprint::*;
pub use envelope::{Envelope, ErrorMessage, SendFailure};
pub use error::*;
pub use message::{metadata_keys, Message, MessageBuilder, Metadata, Payload};
pub use outcome::{
    OutcomeHandle, OutcomeSettler, OutcomeState, PublishFailure, PublishOutcome,
};
pub use publish::{ErrorMessageStrategy, HeaderMapper, PublishClient};
pub use record::*;
pub use rule::{FieldRule, RuleFn};
pub use sink::*;
pub use template::{CompiledTemplate, TemplateError};
