//! Batch actions over selected shipments: sequential and bounded-concurrency
//! runs, label printing, and remote sync jobs.

pub mod coordinator;
pub mod error;
pub mod print;
pub mod progress;
pub mod sync;

pub use coordinator::{BatchFailure, BatchOperationCoordinator, BatchRun, BatchVerdict};
pub use error::BatchItemError;
pub use print::{LabelPrintFlow, PrintOutcome, DEFAULT_PRINT_CONCURRENCY, MAX_PRINT_BATCH};
pub use progress::{BatchProgress, ProgressBus, DEFAULT_PROGRESS_BUFFER_CAPACITY};
pub use sync::{
    SyncJobOutcome, SyncJobPoller, DEFAULT_SYNC_POLL_INTERVAL, DEFAULT_SYNC_TIMEOUT,
};
