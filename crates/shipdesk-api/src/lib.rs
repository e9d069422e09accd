//! Client surface of the packing back-office API.

pub mod config;
pub mod error;
pub mod http;
pub mod interface;
pub mod transport;

pub use config::{ApiConfig, DEFAULT_API_URL};
pub use error::ApiError;
pub use http::HttpShipmentApi;
pub use interface::{
    BatchPrintRequest, BatchPrintResponse, FailedPosting, ListShipmentsRequest, ScanLookupPage,
    ScanLookupRequest, ShipmentApi, ShipmentPage, SyncJobState, SyncStartRequest, SyncStatus,
};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};
