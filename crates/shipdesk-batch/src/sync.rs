use std::sync::Arc;
use std::time::Duration;

use shipdesk_api::{ApiError, ShipmentApi, SyncJobState, SyncStartRequest, SyncStatus};
use shipdesk_domain::{PostingNumber, SyncTaskId};
use tracing::{debug, info, warn};

use crate::coordinator::{BatchOperationCoordinator, BatchRun};
use crate::error::BatchItemError;

pub const DEFAULT_SYNC_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncJobOutcome {
    Completed { message: Option<String> },
    Failed { error: String },
    /// The job did not finish in time. It is treated as failed and not
    /// retried automatically.
    TimedOut,
}

impl SyncJobOutcome {
    fn from_terminal(status: SyncStatus) -> Self {
        match status.status {
            SyncJobState::Completed => Self::Completed {
                message: status.message,
            },
            _ => Self::Failed {
                error: status
                    .error
                    .or(status.message)
                    .unwrap_or_else(|| "sync failed".to_owned()),
            },
        }
    }
}

/// Starts remote sync jobs and polls them to completion.
pub struct SyncJobPoller {
    api: Arc<dyn ShipmentApi>,
    interval: Duration,
    timeout: Duration,
}

impl SyncJobPoller {
    pub fn new(api: Arc<dyn ShipmentApi>, interval: Duration, timeout: Duration) -> Self {
        Self {
            api,
            interval,
            timeout,
        }
    }

    pub async fn start(&self, posting_numbers: Vec<PostingNumber>) -> Result<SyncTaskId, ApiError> {
        let task_id = self
            .api
            .start_sync(SyncStartRequest { posting_numbers })
            .await?;
        info!(task_id = %task_id, "sync job started");
        Ok(task_id)
    }

    /// Polls `task_id` every interval until it reaches a terminal state or the
    /// overall timeout elapses. Individual poll failures are retried on the
    /// next tick.
    pub async fn wait(&self, task_id: &SyncTaskId) -> SyncJobOutcome {
        match tokio::time::timeout(self.timeout, self.poll_until_terminal(task_id)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(task_id = %task_id, timeout_secs = self.timeout.as_secs(), "sync job timed out");
                SyncJobOutcome::TimedOut
            }
        }
    }

    pub async fn sync(&self, posting_numbers: Vec<PostingNumber>) -> Result<SyncJobOutcome, ApiError> {
        let task_id = self.start(posting_numbers).await?;
        Ok(self.wait(&task_id).await)
    }

    /// Syncs each posting as its own job, one after another.
    pub async fn sync_each(
        &self,
        coordinator: &BatchOperationCoordinator,
        posting_numbers: Vec<PostingNumber>,
    ) -> BatchRun<()> {
        coordinator
            .run("sync", posting_numbers, |posting| async move {
                let outcome = match self.sync(vec![posting]).await {
                    Ok(outcome) => outcome,
                    Err(error) => return Err(BatchItemError::from(error)),
                };
                match outcome {
                    SyncJobOutcome::Completed { .. } => Ok(()),
                    SyncJobOutcome::Failed { error } => Err(BatchItemError::rejected(
                        error,
                        "Check the posting on the marketplace and sync again",
                    )),
                    SyncJobOutcome::TimedOut => Err(BatchItemError::rejected(
                        "sync did not finish in time",
                        "Sync again later",
                    )),
                }
            })
            .await
    }

    async fn poll_until_terminal(&self, task_id: &SyncTaskId) -> SyncJobOutcome {
        loop {
            match self.api.sync_status(task_id).await {
                Ok(status) if status.status.is_terminal() => {
                    debug!(task_id = %task_id, state = ?status.status, "sync job finished");
                    return SyncJobOutcome::from_terminal(status);
                }
                Ok(status) => {
                    debug!(task_id = %task_id, progress = status.progress, "sync job running");
                }
                Err(error) => {
                    warn!(task_id = %task_id, error = %error, "sync status poll failed");
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
