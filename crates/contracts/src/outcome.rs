//! OutcomeHandle - Dispatcher output
//!
//! Single-resolution completion cell shared by every observer of one publish.
//!
//! ```text
//! PublishClient ──settle()──► watch cell ──► OutcomeRouter
//!                                       └──► SyncGate (sync mode)
//! ```
//!
//! The settler is consumed by [`OutcomeSettler::settle`], so a second
//! resolution cannot be expressed. Observers read the retained value, which
//! makes late attachment race-free.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::RecordMetadata;

/// Broker-reported publish failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishFailure {
    /// No broker reachable
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// Broker or client refused the record
    #[error("record rejected: {0}")]
    Rejected(String),

    /// Client-side delivery timeout expired
    #[error("delivery timed out: {0}")]
    TimedOut(String),

    /// The client dropped the outcome without settling it
    #[error("publish outcome abandoned by the client")]
    Abandoned,

    #[error("{0}")]
    Other(String),
}

/// Result of one publish attempt
pub type PublishOutcome = Result<RecordMetadata, PublishFailure>;

/// Observable state of an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeState {
    Pending,
    Succeeded,
    Failed,
}

type Cell = Option<Arc<PublishOutcome>>;

/// Write side of an outcome, owned by the publish client
#[derive(Debug)]
pub struct OutcomeSettler {
    tx: watch::Sender<Cell>,
}

impl OutcomeSettler {
    /// Resolve the outcome
    ///
    /// Observers attached before or after this call all see the same value.
    pub fn settle(self, outcome: PublishOutcome) {
        self.tx.send_replace(Some(Arc::new(outcome)));
    }
}

/// Read side of an outcome
///
/// Cheap to clone; every clone observes the same single resolution.
#[derive(Debug, Clone)]
pub struct OutcomeHandle {
    rx: watch::Receiver<Cell>,
}

impl OutcomeHandle {
    /// Create an unresolved outcome and its settler
    pub fn pending() -> (OutcomeSettler, OutcomeHandle) {
        let (tx, rx) = watch::channel(None);
        (OutcomeSettler { tx }, OutcomeHandle { rx })
    }

    /// Create an already-resolved outcome
    pub fn settled(outcome: PublishOutcome) -> OutcomeHandle {
        let (settler, handle) = Self::pending();
        settler.settle(outcome);
        handle
    }

    /// Current state without waiting
    ///
    /// A dropped settler reports `Failed` (see [`PublishFailure::Abandoned`]).
    pub fn state(&self) -> OutcomeState {
        match self.try_outcome() {
            Some(outcome) if outcome.is_ok() => OutcomeState::Succeeded,
            Some(_) => OutcomeState::Failed,
            None => OutcomeState::Pending,
        }
    }

    /// Resolved value, if any
    pub fn try_outcome(&self) -> Option<Arc<PublishOutcome>> {
        if let Some(outcome) = self.rx.borrow().as_ref() {
            return Some(Arc::clone(outcome));
        }
        if self.rx.has_changed().is_err() {
            return Some(Arc::new(Err(PublishFailure::Abandoned)));
        }
        None
    }

    /// Wait for resolution
    ///
    /// Each call uses its own receiver, so concurrent waiters never race.
    pub async fn wait(&self) -> Arc<PublishOutcome> {
        let mut rx = self.rx.clone();
        let settled = rx.wait_for(Option::is_some).await.map(|cell| cell.clone());
        match settled {
            Ok(Some(outcome)) => outcome,
            _ => Arc::new(Err(PublishFailure::Abandoned)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn metadata(offset: i64) -> RecordMetadata {
        RecordMetadata {
            topic: "t".into(),
            partition: 0,
            offset,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_settle_before_wait() {
        let (settler, handle) = OutcomeHandle::pending();
        assert_eq!(handle.state(), OutcomeState::Pending);

        settler.settle(Ok(metadata(7)));

        assert_eq!(handle.state(), OutcomeState::Succeeded);
        let outcome = handle.wait().await;
        assert_eq!(*outcome, Ok(metadata(7)));
    }

    #[tokio::test]
    async fn test_two_observers_see_one_resolution() {
        let (settler, handle) = OutcomeHandle::pending();
        let first = handle.clone();
        let second = handle.clone();

        let a = tokio::spawn(async move { first.wait().await });
        let b = tokio::spawn(async move { second.wait().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        settler.settle(Err(PublishFailure::BrokerUnavailable("down".into())));

        let a = a.await.unwrap();
        let b = b.await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(handle.state(), OutcomeState::Failed);
    }

    #[tokio::test]
    async fn test_dropped_settler_is_abandoned() {
        let (settler, handle) = OutcomeHandle::pending();
        drop(settler);

        let outcome = handle.wait().await;
        assert_eq!(*outcome, Err(PublishFailure::Abandoned));
        assert_eq!(handle.state(), OutcomeState::Failed);
    }

    #[test]
    fn test_settled_constructor() {
        let handle = OutcomeHandle::settled(Ok(metadata(1)));
        assert_eq!(handle.state(), OutcomeState::Succeeded);
    }
}
