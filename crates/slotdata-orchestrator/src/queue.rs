//! In-process task queue: a `JoinSet` of store units sharing a semaphore.
//!
//! Units acquire a permit per attempt (see [`TaskQueue::permits`]) so a unit
//! sleeping through a retry backoff does not hold a concurrency slot.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// How the queue's units ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub finished: usize,
    pub aborted: usize,
    pub panicked: usize,
    pub timed_out: bool,
}

pub struct TaskQueue {
    tasks: JoinSet<()>,
    permits: Arc<Semaphore>,
}

impl TaskQueue {
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Semaphore units must hold while doing work.
    #[must_use]
    pub fn permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.permits)
    }

    pub fn submit<F>(&mut self, unit: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(unit);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every unit, up to `timeout`. On timeout the remaining units
    /// are aborted and drained before returning.
    pub async fn join(mut self, timeout: Duration) -> JoinReport {
        let mut report = JoinReport::default();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                next = self.tasks.join_next() => match next {
                    None => return report,
                    Some(result) => tally(&mut report, result),
                },
                () = &mut deadline => {
                    report.timed_out = true;
                    break;
                }
            }
        }

        tracing::warn!(
            remaining = self.tasks.len(),
            timeout_secs = timeout.as_secs(),
            "task queue timed out; aborting remaining units"
        );
        self.tasks.abort_all();
        while let Some(result) = self.tasks.join_next().await {
            tally(&mut report, result);
        }
        report
    }
}

fn tally(report: &mut JoinReport, result: Result<(), tokio::task::JoinError>) {
    match result {
        Ok(()) => report.finished += 1,
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "task unit panicked");
            report.panicked += 1;
        }
        Err(_) => report.aborted += 1,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn joins_all_units() {
        let mut queue = TaskQueue::new(2);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let done = Arc::clone(&done);
            queue.submit(async move {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(queue.len(), 5);

        let report = queue.join(Duration::from_secs(5)).await;
        assert_eq!(report.finished, 5);
        assert!(!report.timed_out);
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn timeout_aborts_stragglers() {
        let mut queue = TaskQueue::new(4);
        queue.submit(async {});
        queue.submit(async {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        });

        let report = queue.join(Duration::from_millis(100)).await;
        assert!(report.timed_out);
        assert_eq!(report.finished, 1);
        assert_eq!(report.aborted, 1);
    }

    #[tokio::test]
    async fn permits_bound_concurrency() {
        let mut queue = TaskQueue::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..6 {
            let permits = queue.permits();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            queue.submit(async move {
                let _permit = permits.acquire().await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        queue.join(Duration::from_secs(5)).await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_unit_is_counted() {
        let mut queue = TaskQueue::new(1);
        queue.submit(async { panic!("boom") });
        let report = queue.join(Duration::from_secs(5)).await;
        assert_eq!(report.panicked, 1);
    }
}
