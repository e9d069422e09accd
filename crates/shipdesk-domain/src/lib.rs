//! Shared shipment domain types for the packing workflow.

pub mod error;
pub mod expiring_set;
pub mod identifiers;
pub mod query;
pub mod shipment;

pub use error::CoreError;
pub use expiring_set::ExpiringSet;
pub use identifiers::{FilterGeneration, PostingNumber, ShopId, SyncTaskId};
pub use query::{
    PrintStatusFilter, PurchaseInfoFilter, RemoteStatusQuery, SearchFilters, ShipmentQuery,
    ShopFilter, SortOrder, StatusTab, ViewMode,
};
pub use shipment::{Keyed, Shipment, ShipmentProduct};
