//! Single owner of the session's counters.
//!
//! Store tasks send one [`CompletionEvent`] each over an mpsc channel; the
//! aggregator applies them serially and persists progress after each one.

use std::collections::HashSet;
use std::sync::Arc;

use slotdata_core::Session;
use tokio::sync::mpsc;

use crate::traits::Ledger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Succeeded { records: u64 },
    Failed { messages: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub store_id: String,
    pub outcome: StoreOutcome,
}

/// Session plus the stores that reported, once the channel is drained.
#[derive(Debug, Clone)]
pub struct AggregateSummary {
    pub session: Session,
    pub reported: HashSet<String>,
    /// Stores that succeeded, in completion order.
    pub succeeded: Vec<String>,
}

pub struct SessionAggregator {
    session: Session,
    reported: HashSet<String>,
    succeeded: Vec<String>,
    ledger: Arc<dyn Ledger>,
}

impl SessionAggregator {
    #[must_use]
    pub fn new(session: Session, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            session,
            reported: HashSet::new(),
            succeeded: Vec::new(),
            ledger,
        }
    }

    /// Apply one event. Returns `false` when it was ignored (a repeat for the
    /// same store, or counters already full).
    pub fn apply(&mut self, event: CompletionEvent) -> bool {
        if self.reported.contains(&event.store_id) {
            tracing::warn!(
                session_id = self.session.id,
                store_id = %event.store_id,
                "ignoring repeated completion event"
            );
            return false;
        }

        let succeeded = matches!(event.outcome, StoreOutcome::Succeeded { .. });
        let applied = match event.outcome {
            StoreOutcome::Succeeded { records } => self
                .session
                .record_success(i64::try_from(records).unwrap_or(i64::MAX)),
            StoreOutcome::Failed { messages } => {
                self.session.record_failure(&event.store_id, messages)
            }
        };

        match applied {
            Ok(()) => {
                if succeeded {
                    self.succeeded.push(event.store_id.clone());
                }
                self.reported.insert(event.store_id);
                true
            }
            Err(e) => {
                tracing::warn!(
                    session_id = self.session.id,
                    store_id = %event.store_id,
                    error = %e,
                    "completion event rejected"
                );
                false
            }
        }
    }

    /// Consume events until every sender is dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<CompletionEvent>) -> AggregateSummary {
        while let Some(event) = events.recv().await {
            if !self.apply(event) {
                continue;
            }
            if let Err(e) = self.ledger.save_progress(&self.session).await {
                tracing::warn!(
                    session_id = self.session.id,
                    error = %e,
                    "failed to persist session progress"
                );
            }
        }

        AggregateSummary {
            session: self.session,
            reported: self.reported,
            succeeded: self.succeeded,
        }
    }
}
