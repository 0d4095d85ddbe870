//! Session orchestration: per-store units on a bounded task queue, retries
//! with backoff, and a single aggregator owning the session counters.
//!
//! Storage and capture are reached only through the traits in [`traits`], so
//! the whole pipeline runs against in-memory fakes in tests.

pub mod aggregator;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod retry;
pub mod traits;
pub mod worker;

pub use aggregator::{AggregateSummary, CompletionEvent, SessionAggregator, StoreOutcome};
pub use error::{OrchestratorError, TaskError};
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, RunSummary, StoreSelection, TIMED_OUT_MESSAGE,
};
pub use queue::{JoinReport, TaskQueue};
pub use retry::RetryPolicy;
pub use traits::{Ledger, RecordSink, StoreWorker};
pub use worker::{ScrapeWorker, WorkerSettings};
