use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use shipdesk_api::{BatchPrintRequest, BatchPrintResponse, FailedPosting, ShipmentApi};
use shipdesk_domain::{Keyed, PostingNumber};
use tracing::{debug, info};

use crate::coordinator::{BatchOperationCoordinator, BatchRun};
use crate::error::BatchItemError;

/// Largest selection the batch-print endpoint accepts per request.
pub const MAX_PRINT_BATCH: usize = 20;
pub const DEFAULT_PRINT_CONCURRENCY: usize = 2;

const UNPRINTED_SUGGESTION: &str = "Retry printing this shipment";

#[derive(Debug, Clone, PartialEq, Eq)]
struct PrintChunk {
    key: String,
    postings: Vec<PostingNumber>,
}

impl Keyed for PrintChunk {
    fn entity_key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChunkReport {
    Printed {
        pdf_url: Option<String>,
        printed: Vec<PostingNumber>,
        failed: Vec<FailedPosting>,
    },
    NotReady {
        message: String,
        retry_after: Option<Duration>,
    },
}

/// Combined result of printing labels for a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    AllSucceeded {
        pdf_urls: Vec<String>,
        printed: Vec<PostingNumber>,
    },
    Partial {
        pdf_urls: Vec<String>,
        printed: Vec<PostingNumber>,
        failed: Vec<FailedPosting>,
    },
    AllFailed {
        failed: Vec<FailedPosting>,
    },
    /// Nothing was printed; labels are still being generated.
    NotReady {
        message: String,
        retry_after: Option<Duration>,
    },
    Unexpected {
        message: String,
    },
}

impl PrintOutcome {
    pub fn printed(&self) -> &[PostingNumber] {
        match self {
            Self::AllSucceeded { printed, .. } | Self::Partial { printed, .. } => printed,
            _ => &[],
        }
    }

    pub fn failed(&self) -> &[FailedPosting] {
        match self {
            Self::Partial { failed, .. } | Self::AllFailed { failed } => failed,
            _ => &[],
        }
    }

    pub fn pdf_urls(&self) -> &[String] {
        match self {
            Self::AllSucceeded { pdf_urls, .. } | Self::Partial { pdf_urls, .. } => pdf_urls,
            _ => &[],
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
}

/// Prints shipping labels for a selection in endpoint-sized chunks.
pub struct LabelPrintFlow {
    api: Arc<dyn ShipmentApi>,
    coordinator: BatchOperationCoordinator,
    chunk_size: usize,
    concurrency: usize,
}

impl LabelPrintFlow {
    pub fn new(api: Arc<dyn ShipmentApi>, coordinator: BatchOperationCoordinator) -> Self {
        Self {
            api,
            coordinator,
            chunk_size: MAX_PRINT_BATCH,
            concurrency: DEFAULT_PRINT_CONCURRENCY,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_PRINT_BATCH);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn print(&self, selection: &[PostingNumber]) -> PrintOutcome {
        if selection.is_empty() {
            debug!("print requested for empty selection");
            return PrintOutcome::AllSucceeded {
                pdf_urls: Vec::new(),
                printed: Vec::new(),
            };
        }

        let chunks = selection
            .chunks(self.chunk_size)
            .enumerate()
            .map(|(index, postings)| PrintChunk {
                key: format!("chunk-{}", index + 1),
                postings: postings.to_vec(),
            })
            .collect::<Vec<_>>();
        let layout = chunks
            .iter()
            .map(|chunk| (chunk.key.clone(), chunk.postings.clone()))
            .collect::<Vec<_>>();
        info!(
            selected = selection.len(),
            chunks = chunks.len(),
            "printing shipping labels"
        );

        let run = self
            .coordinator
            .run_bounded(
                "print",
                chunks,
                |chunk| print_chunk(self.api.clone(), chunk),
                self.concurrency,
            )
            .await;
        combine(selection, &layout, run)
    }

    /// The selection to submit again: everything except postings that were
    /// rejected.
    pub fn retry_selection(selection: &[PostingNumber], outcome: &PrintOutcome) -> Vec<PostingNumber> {
        let failed = outcome
            .failed()
            .iter()
            .map(|failure| failure.posting_number.as_str())
            .collect::<HashSet<_>>();
        selection
            .iter()
            .filter(|posting| !failed.contains(posting.as_str()))
            .cloned()
            .collect()
    }
}

async fn print_chunk(api: Arc<dyn ShipmentApi>, chunk: PrintChunk) -> Result<ChunkReport, BatchItemError> {
    let response = api
        .batch_print(BatchPrintRequest {
            posting_numbers: chunk.postings.clone(),
        })
        .await?;

    let report = match response {
        BatchPrintResponse::Printed {
            pdf_url,
            total,
            cached_count,
            fetched_count,
        } => {
            debug!(
                chunk = %chunk.key,
                total,
                cached_count,
                fetched_count,
                "label chunk printed"
            );
            ChunkReport::Printed {
                pdf_url: Some(pdf_url),
                printed: chunk.postings,
                failed: Vec::new(),
            }
        }
        BatchPrintResponse::PartialFailure {
            pdf_url,
            success_postings,
            failed_postings,
        } => ChunkReport::Printed {
            pdf_url,
            printed: success_postings,
            failed: failed_postings,
        },
        BatchPrintResponse::AllFailed { failed_postings } => ChunkReport::Printed {
            pdf_url: None,
            printed: Vec::new(),
            failed: failed_postings,
        },
        BatchPrintResponse::NotReady {
            message,
            retry_after,
        } => ChunkReport::NotReady {
            message,
            retry_after,
        },
    };
    Ok(report)
}

/// Why the postings of one chunk were not printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shortfall {
    Rejected,
    NotReady,
    Unexpected,
}

struct ChunkFailure {
    kind: Shortfall,
    reason: String,
    suggestion: String,
}

fn not_ready_suggestion(retry_after: Option<Duration>) -> String {
    match retry_after {
        Some(cooldown) => format!("Retry in {}s once labels are generated", cooldown.as_secs()),
        None => "Retry once labels are generated".to_owned(),
    }
}

/// Merges chunk results so every selected posting ends up either printed or
/// failed with the reason of its own chunk.
fn combine(
    selection: &[PostingNumber],
    chunks: &[(String, Vec<PostingNumber>)],
    run: BatchRun<ChunkReport>,
) -> PrintOutcome {
    let mut pdf_urls = Vec::new();
    let mut printed = Vec::new();
    let mut failed = Vec::new();
    let mut chunk_failures = HashMap::new();
    let mut not_ready = None;
    let mut rejected = false;

    for (key, report) in run.outputs {
        match report {
            ChunkReport::Printed {
                pdf_url,
                printed: chunk_printed,
                failed: chunk_failed,
            } => {
                pdf_urls.extend(pdf_url);
                printed.extend(chunk_printed);
                rejected |= !chunk_failed.is_empty();
                failed.extend(chunk_failed);
                chunk_failures.insert(
                    key,
                    ChunkFailure {
                        kind: Shortfall::Rejected,
                        reason: "label was not printed".to_owned(),
                        suggestion: UNPRINTED_SUGGESTION.to_owned(),
                    },
                );
            }
            ChunkReport::NotReady {
                message,
                retry_after,
            } => {
                chunk_failures.insert(
                    key,
                    ChunkFailure {
                        kind: Shortfall::NotReady,
                        reason: message.clone(),
                        suggestion: not_ready_suggestion(retry_after),
                    },
                );
                not_ready.get_or_insert((message, retry_after));
            }
        }
    }

    let mut unexpected = Vec::new();
    for failure in run.failures {
        unexpected.push(failure.reason.clone());
        let suggestion = if failure.suggestion.is_empty() {
            UNPRINTED_SUGGESTION.to_owned()
        } else {
            failure.suggestion
        };
        chunk_failures.insert(
            failure.key,
            ChunkFailure {
                kind: Shortfall::Unexpected,
                reason: failure.reason,
                suggestion,
            },
        );
    }
    let skipped_reason = match &run.aborted {
        Some(message) => format!("batch aborted: {message}"),
        None => "label was not printed".to_owned(),
    };
    unexpected.extend(run.aborted);

    let accounted = printed
        .iter()
        .map(PostingNumber::as_str)
        .chain(failed.iter().map(|failure| failure.posting_number.as_str()))
        .map(ToOwned::to_owned)
        .collect::<HashSet<_>>();
    for (key, postings) in chunks {
        let chunk_failure = chunk_failures.get(key);
        for posting in postings {
            if accounted.contains(posting.as_str()) {
                continue;
            }
            let (kind, reason, suggestion) = match chunk_failure {
                Some(chunk) => (chunk.kind, chunk.reason.clone(), chunk.suggestion.clone()),
                None => (
                    Shortfall::Unexpected,
                    skipped_reason.clone(),
                    UNPRINTED_SUGGESTION.to_owned(),
                ),
            };
            rejected |= kind == Shortfall::Rejected;
            failed.push(FailedPosting {
                posting_number: posting.clone(),
                error: reason,
                suggestion,
            });
        }
    }

    let order = selection
        .iter()
        .enumerate()
        .map(|(index, posting)| (posting.as_str(), index))
        .collect::<HashMap<_, _>>();
    failed.sort_by_key(|failure| {
        order
            .get(failure.posting_number.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });

    if failed.is_empty() {
        return PrintOutcome::AllSucceeded { pdf_urls, printed };
    }
    if !printed.is_empty() {
        return PrintOutcome::Partial {
            pdf_urls,
            printed,
            failed,
        };
    }

    match not_ready {
        Some((message, retry_after)) if !rejected && unexpected.is_empty() => {
            PrintOutcome::NotReady {
                message,
                retry_after,
            }
        }
        None if !rejected => {
            let message = if unexpected.is_empty() {
                "no labels were printed".to_owned()
            } else {
                unexpected.join("; ")
            };
            PrintOutcome::Unexpected { message }
        }
        _ => PrintOutcome::AllFailed { failed },
    }
}
