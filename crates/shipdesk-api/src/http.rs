use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use shipdesk_domain::{PostingNumber, RemoteStatusQuery, ShopFilter, SyncTaskId};
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::interface::{
    BatchPrintRequest, BatchPrintResponse, FailedPosting, ListShipmentsRequest, ScanLookupPage,
    ScanLookupRequest, ShipmentApi, ShipmentPage, SyncStartRequest, SyncStatus,
};
use crate::transport::{
    truncate_for_error, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport,
};

const LIST_PATH: &str = "/api/packing/postings";
const SCAN_PATH: &str = "/api/packing/postings/scan";
const BATCH_PRINT_PATH: &str = "/api/packing/postings/batch-print";
const SYNC_PATH: &str = "/api/packing/postings/sync";
const SYNC_TASKS_PATH: &str = "/api/packing/sync-tasks";

const PARTIAL_FAILURE_CODE: &str = "PARTIAL_FAILURE";
const ALL_FAILED_CODE: &str = "ALL_FAILED";
const NOT_READY_STATUS: u16 = 422;

#[derive(Clone)]
pub struct HttpShipmentApi {
    transport: Arc<dyn HttpTransport>,
}

impl HttpShipmentApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let transport = ReqwestHttpTransport::new(config)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ShipmentApi for HttpShipmentApi {
    async fn list_shipments(
        &self,
        request: ListShipmentsRequest,
    ) -> Result<ShipmentPage, ApiError> {
        let http_request = list_request(&request)?;
        let response = self.transport.send(http_request).await?;
        let page: ShipmentPage = decode_success(response, "shipment list")?;
        debug!(
            offset = request.offset,
            limit = request.limit,
            returned = page.items.len(),
            total = page.total,
            "fetched shipment page"
        );
        Ok(page)
    }

    async fn scan_lookup(&self, request: ScanLookupRequest) -> Result<ScanLookupPage, ApiError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(ApiError::InvalidRequest(
                "scan lookup query cannot be empty".to_owned(),
            ));
        }

        let http_request = HttpRequest::get(SCAN_PATH)
            .param("query", query)
            .param("offset", request.offset)
            .param("limit", request.limit)
            .param("print_status_filter", request.print_status.as_param());
        let response = self.transport.send(http_request).await?;
        decode_success(response, "scan lookup")
    }

    async fn batch_print(
        &self,
        request: BatchPrintRequest,
    ) -> Result<BatchPrintResponse, ApiError> {
        if request.posting_numbers.is_empty() {
            return Err(ApiError::InvalidRequest(
                "batch print requires at least one posting number".to_owned(),
            ));
        }

        let response = self
            .transport
            .send(HttpRequest::post(
                BATCH_PRINT_PATH,
                json!({ "posting_numbers": request.posting_numbers }),
            ))
            .await?;
        classify_batch_print_response(response)
    }

    async fn start_sync(&self, request: SyncStartRequest) -> Result<SyncTaskId, ApiError> {
        if request.posting_numbers.is_empty() {
            return Err(ApiError::InvalidRequest(
                "sync requires at least one posting number".to_owned(),
            ));
        }

        let response = self
            .transport
            .send(HttpRequest::post(
                SYNC_PATH,
                json!({ "posting_numbers": request.posting_numbers }),
            ))
            .await?;
        let started: SyncStartedPayload = decode_success(response, "sync start")?;
        Ok(started.task_id)
    }

    async fn sync_status(&self, task_id: &SyncTaskId) -> Result<SyncStatus, ApiError> {
        let path = format!("{SYNC_TASKS_PATH}/{}", task_id.as_str());
        let response = self.transport.send(HttpRequest::get(path)).await?;
        decode_success(response, "sync status")
    }
}

#[derive(Debug, Deserialize)]
struct SyncStartedPayload {
    task_id: SyncTaskId,
}

#[derive(Debug, Deserialize)]
struct BatchPrintPayload {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    pdf_url: Option<String>,
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    cached_count: usize,
    #[serde(default)]
    fetched_count: usize,
    #[serde(default)]
    success_postings: Vec<PostingNumber>,
    #[serde(default)]
    failed_postings: Vec<FailedPosting>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<u64>,
    #[serde(default)]
    failed_postings: Vec<FailedPosting>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<NestedErrorDetail>,
    #[serde(default)]
    detail: Option<DetailValue>,
}

#[derive(Debug, Default, Deserialize)]
struct NestedErrorDetail {
    #[serde(default)]
    detail: Option<DetailValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DetailValue {
    Structured(ErrorDetail),
    Message(String),
}

impl ErrorEnvelope {
    fn into_detail(self) -> Option<ErrorDetail> {
        let value = self
            .error
            .and_then(|nested| nested.detail)
            .or(self.detail)?;
        Some(match value {
            DetailValue::Structured(detail) => detail,
            DetailValue::Message(message) => ErrorDetail {
                message: Some(message),
                ..ErrorDetail::default()
            },
        })
    }
}

fn list_request(request: &ListShipmentsRequest) -> Result<HttpRequest, ApiError> {
    let query = &request.query;
    let mut http_request = HttpRequest::get(LIST_PATH)
        .param("offset", request.offset)
        .param("limit", request.limit)
        .param("sort_order", query.sort_order.as_param());

    http_request = match query.status_tab.remote_query() {
        RemoteStatusQuery::OperationStatus(status) => {
            http_request.param("operation_status", status)
        }
        RemoteStatusQuery::ProviderStatuses(statuses) => {
            http_request.param("status", statuses.join(","))
        }
        RemoteStatusQuery::ScanOnly => {
            return Err(ApiError::InvalidRequest(format!(
                "tab `{}` has no list query",
                query.status_tab.as_key()
            )));
        }
    };

    if let ShopFilter::Shop(shop_id) = &query.shop {
        http_request = http_request.param("shop_id", shop_id.as_str());
    }
    let search = &query.search;
    for (name, value) in [
        ("posting_number", &search.posting_number),
        ("sku", &search.sku),
        ("tracking_number", &search.tracking_number),
        ("date_from", &search.date_from),
        ("date_to", &search.date_to),
        ("platform", &query.platform),
    ] {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            http_request = http_request.param(name, value);
        }
    }
    if let Some(purchase_info) = query.purchase_info.as_param() {
        http_request = http_request.param("purchase_info", purchase_info);
    }

    Ok(http_request)
}

fn decode_success<T>(response: HttpResponse, context: &'static str) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    if !response.is_success() {
        return Err(ApiError::Status {
            status: response.status,
            body: truncate_for_error(&response.body),
        });
    }

    serde_json::from_str(&response.body).map_err(|error| ApiError::decode(context, error))
}

fn classify_batch_print_response(response: HttpResponse) -> Result<BatchPrintResponse, ApiError> {
    if !response.is_success() {
        let detail = serde_json::from_str::<ErrorEnvelope>(&response.body)
            .ok()
            .and_then(ErrorEnvelope::into_detail);

        // The all-failed body wins over the status code.
        let detail = match detail {
            Some(detail) if detail.error.as_deref() == Some(ALL_FAILED_CODE) => {
                return Ok(BatchPrintResponse::AllFailed {
                    failed_postings: detail.failed_postings,
                });
            }
            other => other,
        };

        if response.status == NOT_READY_STATUS {
            let detail = detail.unwrap_or_default();
            return Ok(BatchPrintResponse::NotReady {
                message: detail
                    .message
                    .or(detail.error)
                    .unwrap_or_else(|| truncate_for_error(&response.body)),
                retry_after: detail.retry_after.map(Duration::from_secs),
            });
        }

        return Err(ApiError::Status {
            status: response.status,
            body: truncate_for_error(&response.body),
        });
    }

    let payload: BatchPrintPayload = serde_json::from_str(&response.body)
        .map_err(|error| ApiError::decode("batch print", error))?;

    if payload.success {
        let pdf_url = payload.pdf_url.ok_or_else(|| {
            ApiError::decode("batch print", "successful response is missing pdf_url")
        })?;
        return Ok(BatchPrintResponse::Printed {
            pdf_url,
            total: payload
                .total
                .unwrap_or(payload.cached_count + payload.fetched_count),
            cached_count: payload.cached_count,
            fetched_count: payload.fetched_count,
        });
    }

    match payload.error.as_deref() {
        Some(PARTIAL_FAILURE_CODE) => Ok(BatchPrintResponse::PartialFailure {
            pdf_url: payload.pdf_url,
            success_postings: payload.success_postings,
            failed_postings: payload.failed_postings,
        }),
        Some(ALL_FAILED_CODE) => Ok(BatchPrintResponse::AllFailed {
            failed_postings: payload.failed_postings,
        }),
        other => Err(ApiError::decode(
            "batch print",
            format!("unrecognized error code {:?}", other.unwrap_or_default()),
        )),
    }
}
