//! Scraping-session state machine and per-store error reports.
//!
//! A [`Session`] moves `pending → running → {completed | partial | failed}`
//! and never leaves a terminal status. Counter updates are only accepted
//! while running, and `successful + failed` can never exceed `total`.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Error-log key used when the orchestration itself fails.
pub const ORCHESTRATION_ERROR_KEY: &str = "orchestration_error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Partial,
    Failed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Partial => "partial",
            SessionStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Partial | SessionStatus::Failed
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "running" => Ok(SessionStatus::Running),
            "completed" => Ok(SessionStatus::Completed),
            "partial" => Ok(SessionStatus::Partial),
            "failed" => Ok(SessionStatus::Failed),
            other => Err(CoreError::InvalidSessionStatus(other.to_string())),
        }
    }
}

/// Terminal status for a session given its store counters.
///
/// No failed store means `completed`, even when the overall timeout cut
/// some stores off before they reported. With failures, any success makes
/// it `partial`, otherwise `failed`.
#[must_use]
pub fn finalize_status(successful: u32, failed: u32) -> SessionStatus {
    if failed == 0 {
        SessionStatus::Completed
    } else if successful > 0 {
        SessionStatus::Partial
    } else {
        SessionStatus::Failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub date: NaiveDate,
    pub status: SessionStatus,
    pub total_stores: u32,
    pub successful_stores: u32,
    pub failed_stores: u32,
    pub total_records: i64,
    /// `store_id → messages`, plus [`ORCHESTRATION_ERROR_KEY`] on fatal errors.
    pub error_log: BTreeMap<String, Vec<String>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    #[must_use]
    pub fn new(id: i64, date: NaiveDate, total_stores: u32) -> Self {
        Self {
            id,
            date,
            status: SessionStatus::Pending,
            total_stores,
            successful_stores: 0,
            failed_stores: 0,
            total_records: 0,
            error_log: BTreeMap::new(),
            started_at: None,
            ended_at: None,
        }
    }

    /// `pending → running`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionTerminal`] unless the session is pending.
    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.status != SessionStatus::Pending {
            return Err(CoreError::SessionTerminal {
                status: self.status,
                action: "start",
            });
        }
        self.status = SessionStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Count one store as scraped and add its record count.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the session is not running or the counters
    /// would exceed `total_stores`.
    pub fn record_success(&mut self, records: i64) -> Result<(), CoreError> {
        self.ensure_running("record success")?;
        self.ensure_capacity()?;
        self.successful_stores += 1;
        self.total_records = self.total_records.saturating_add(records.max(0));
        Ok(())
    }

    /// Count one store as permanently failed and log its messages.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the session is not running or the counters
    /// would exceed `total_stores`.
    pub fn record_failure(&mut self, store_id: &str, messages: Vec<String>) -> Result<(), CoreError> {
        self.ensure_running("record failure")?;
        self.ensure_capacity()?;
        self.failed_stores += 1;
        self.error_log.insert(store_id.to_string(), messages);
        Ok(())
    }

    /// Append to the error log without touching counters.
    pub fn note_error(&mut self, key: &str, message: impl Into<String>) {
        self.error_log
            .entry(key.to_string())
            .or_default()
            .push(message.into());
    }

    /// Apply [`finalize_status`] and stamp the end time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionTerminal`] unless the session is running.
    pub fn finalize(&mut self) -> Result<SessionStatus, CoreError> {
        self.ensure_running("finalize")?;
        self.status = finalize_status(self.successful_stores, self.failed_stores);
        self.ended_at = Some(Utc::now());
        Ok(self.status)
    }

    /// Force the session to `failed` after an orchestration-level error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionTerminal`] if already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::SessionTerminal {
                status: self.status,
                action: "fail",
            });
        }
        self.note_error(ORCHESTRATION_ERROR_KEY, reason);
        self.status = SessionStatus::Failed;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    #[must_use]
    pub fn error_log_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.error_log).unwrap_or(serde_json::Value::Null)
    }

    fn ensure_running(&self, action: &'static str) -> Result<(), CoreError> {
        if self.status == SessionStatus::Running {
            Ok(())
        } else {
            Err(CoreError::SessionTerminal {
                status: self.status,
                action,
            })
        }
    }

    fn ensure_capacity(&self) -> Result<(), CoreError> {
        if self.successful_stores + self.failed_stores >= self.total_stores {
            return Err(CoreError::CounterOverflow {
                total: self.total_stores,
            });
        }
        Ok(())
    }
}

/// Category of a per-store failure, persisted as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    Fetch,
    Render,
    Extraction,
    NoData,
    Persistence,
    Timeout,
    Task,
}

impl StoreErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StoreErrorKind::Fetch => "fetch",
            StoreErrorKind::Render => "render",
            StoreErrorKind::Extraction => "extraction",
            StoreErrorKind::NoData => "no_data",
            StoreErrorKind::Persistence => "persistence",
            StoreErrorKind::Timeout => "timeout",
            StoreErrorKind::Task => "task",
        }
    }
}

impl std::fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed attempt for one store, ready to be appended to the error table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreErrorReport {
    pub store_id: String,
    pub kind: StoreErrorKind,
    pub message: String,
    pub url: String,
    /// Zero for the first attempt.
    pub retry_count: u32,
}
