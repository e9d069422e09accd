use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shipdesk_domain::{PostingNumber, PrintStatusFilter, Shipment, ShipmentQuery, SyncTaskId};

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListShipmentsRequest {
    pub query: ShipmentQuery,
    pub offset: usize,
    pub limit: usize,
}

/// One page of the list endpoint. `total` counts every match of the filters,
/// independent of pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentPage {
    #[serde(alias = "data")]
    pub items: Vec<Shipment>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLookupRequest {
    pub query: String,
    pub offset: usize,
    pub limit: usize,
    pub print_status: PrintStatusFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLookupPage {
    pub data: Vec<Shipment>,
    pub total: usize,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPrintRequest {
    pub posting_numbers: Vec<PostingNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPosting {
    pub posting_number: PostingNumber,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPrintResponse {
    Printed {
        pdf_url: String,
        total: usize,
        cached_count: usize,
        fetched_count: usize,
    },
    PartialFailure {
        pdf_url: Option<String>,
        success_postings: Vec<PostingNumber>,
        failed_postings: Vec<FailedPosting>,
    },
    AllFailed {
        failed_postings: Vec<FailedPosting>,
    },
    /// Labels are not generated yet; nothing succeeded and the caller may
    /// retry after the cooldown.
    NotReady {
        message: String,
        retry_after: Option<Duration>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStartRequest {
    pub posting_numbers: Vec<PostingNumber>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncJobState {
    Running,
    Completed,
    Failed,
}

impl SyncJobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub status: SyncJobState,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait ShipmentApi: Send + Sync {
    async fn list_shipments(&self, request: ListShipmentsRequest)
        -> Result<ShipmentPage, ApiError>;

    async fn scan_lookup(&self, request: ScanLookupRequest) -> Result<ScanLookupPage, ApiError>;

    async fn batch_print(&self, request: BatchPrintRequest)
        -> Result<BatchPrintResponse, ApiError>;

    async fn start_sync(&self, request: SyncStartRequest) -> Result<SyncTaskId, ApiError>;

    async fn sync_status(&self, task_id: &SyncTaskId) -> Result<SyncStatus, ApiError>;
}
