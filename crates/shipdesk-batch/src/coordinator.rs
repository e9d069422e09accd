use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use shipdesk_domain::Keyed;
use tracing::{debug, info, warn};

use crate::error::BatchItemError;
use crate::progress::{BatchProgress, ProgressBus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub key: String,
    pub reason: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchVerdict {
    AllSucceeded,
    AllFailed,
    Partial,
    /// Stopped before any item finished.
    Aborted,
}

/// Outcome of one batch run. Items skipped after an abort count as neither
/// succeeded nor failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRun<O = ()> {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
    /// Results of succeeded items, in completion order.
    pub outputs: Vec<(String, O)>,
    pub aborted: Option<String>,
}

impl<O> BatchRun<O> {
    fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            outputs: Vec::new(),
            aborted: None,
        }
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn verdict(&self) -> BatchVerdict {
        if self.aborted.is_some() && self.completed() == 0 {
            BatchVerdict::Aborted
        } else if self.succeeded == self.total {
            BatchVerdict::AllSucceeded
        } else if self.succeeded == 0 {
            BatchVerdict::AllFailed
        } else {
            BatchVerdict::Partial
        }
    }

    pub fn succeeded_keys(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|(key, _)| key.as_str())
    }

    pub fn failed_keys(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|failure| failure.key.as_str())
    }

    /// The selection to re-run: everything except items that failed.
    pub fn retry_selection<'a>(&self, selection: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let failed = self.failed_keys().collect::<HashSet<_>>();
        selection
            .into_iter()
            .filter(|key| !failed.contains(*key))
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Records one item result and returns `false` once the run must stop.
    fn record(&mut self, key: String, result: Result<O, BatchItemError>) -> bool {
        match result {
            Ok(output) => {
                self.succeeded += 1;
                self.outputs.push((key, output));
                true
            }
            Err(BatchItemError::Rejected { reason, suggestion }) => {
                debug!(key = %key, reason = %reason, "batch item rejected");
                self.failed += 1;
                self.failures.push(BatchFailure {
                    key,
                    reason,
                    suggestion,
                });
                true
            }
            Err(BatchItemError::Aborted(message)) => {
                warn!(key = %key, error = %message, "batch aborted");
                self.aborted = Some(message);
                false
            }
        }
    }
}

/// Runs one operation over many items, publishing progress after each item.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationCoordinator {
    bus: Arc<ProgressBus>,
}

impl BatchOperationCoordinator {
    pub fn new(bus: Arc<ProgressBus>) -> Self {
        Self { bus }
    }

    pub fn progress(&self) -> &ProgressBus {
        &self.bus
    }

    /// Processes `items` one at a time in order.
    pub async fn run<I, O, F, Fut>(&self, operation: &'static str, items: Vec<I>, op: F) -> BatchRun<O>
    where
        I: Keyed,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<O, BatchItemError>>,
    {
        self.run_then(operation, items, op, |_| {}).await
    }

    /// Like [`Self::run`], invoking `on_complete` with the finished run.
    pub async fn run_then<I, O, F, Fut>(
        &self,
        operation: &'static str,
        items: Vec<I>,
        mut op: F,
        on_complete: impl FnOnce(&BatchRun<O>),
    ) -> BatchRun<O>
    where
        I: Keyed,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<O, BatchItemError>>,
    {
        let mut run = BatchRun::new(items.len());
        info!(operation, total = run.total, "batch started");

        for item in items {
            let key = item.entity_key().to_owned();
            let result = op(item).await;
            let proceed = run.record(key, result);
            self.publish(operation, &run);
            if !proceed {
                break;
            }
        }

        self.finish(operation, &run);
        on_complete(&run);
        run
    }

    /// Processes `items` with at most `concurrency_limit` operations in
    /// flight. Results are recorded in completion order.
    pub async fn run_bounded<I, O, F, Fut>(
        &self,
        operation: &'static str,
        items: Vec<I>,
        mut op: F,
        concurrency_limit: usize,
    ) -> BatchRun<O>
    where
        I: Keyed,
        F: FnMut(I) -> Fut,
        Fut: Future<Output = Result<O, BatchItemError>>,
    {
        let mut run = BatchRun::new(items.len());
        info!(
            operation,
            total = run.total,
            concurrency_limit,
            "bounded batch started"
        );

        let mut results = stream::iter(items.into_iter().map(|item| {
            let key = item.entity_key().to_owned();
            let pending = op(item);
            async move { (key, pending.await) }
        }))
        .buffer_unordered(concurrency_limit.max(1));

        while let Some((key, result)) = results.next().await {
            let proceed = run.record(key, result);
            self.publish(operation, &run);
            if !proceed {
                break;
            }
        }

        self.finish(operation, &run);
        run
    }

    fn publish<O>(&self, operation: &'static str, run: &BatchRun<O>) -> BatchProgress {
        self.bus
            .publish(operation, run.completed(), run.total, run.succeeded, run.failed)
    }

    fn finish<O>(&self, operation: &'static str, run: &BatchRun<O>) {
        info!(
            operation,
            total = run.total,
            succeeded = run.succeeded,
            failed = run.failed,
            aborted = run.aborted.is_some(),
            "batch finished"
        );
    }
}
