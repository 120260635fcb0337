//! Publish pipeline: input parsing, publishing and statistics.

mod input;
mod publisher;
mod stats;

pub use publisher::{Publisher, SendConfig};
