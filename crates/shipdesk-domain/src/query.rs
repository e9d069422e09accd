use serde::{Deserialize, Serialize};

use crate::identifiers::ShopId;

/// Workflow tabs of the packing view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTab {
    #[default]
    AwaitingStock,
    Allocating,
    Allocated,
    TrackingConfirmed,
    Shipping,
    Printed,
    Scan,
}

/// Remote query parameters a tab resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatusQuery {
    /// Internal workflow status tracked by the back office.
    OperationStatus(&'static str),
    /// Provider-native posting statuses.
    ProviderStatuses(&'static [&'static str]),
    /// The tab has no list query; lookups go through the scan paginator.
    ScanOnly,
}

const SHIPPING_PROVIDER_STATUSES: &[&str] = &["awaiting_deliver", "delivering"];

impl StatusTab {
    pub const ALL: [StatusTab; 7] = [
        StatusTab::AwaitingStock,
        StatusTab::Allocating,
        StatusTab::Allocated,
        StatusTab::TrackingConfirmed,
        StatusTab::Shipping,
        StatusTab::Printed,
        StatusTab::Scan,
    ];

    pub const fn as_key(self) -> &'static str {
        match self {
            Self::AwaitingStock => "awaiting_stock",
            Self::Allocating => "allocating",
            Self::Allocated => "allocated",
            Self::TrackingConfirmed => "tracking_confirmed",
            Self::Shipping => "shipping",
            Self::Printed => "printed",
            Self::Scan => "scan",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tab| tab.as_key().eq_ignore_ascii_case(key.trim()))
    }

    pub const fn remote_query(self) -> RemoteStatusQuery {
        match self {
            Self::AwaitingStock => RemoteStatusQuery::OperationStatus("awaiting_stock"),
            Self::Allocating => RemoteStatusQuery::OperationStatus("allocating"),
            Self::Allocated => RemoteStatusQuery::OperationStatus("allocated"),
            Self::TrackingConfirmed => RemoteStatusQuery::OperationStatus("tracking_confirmed"),
            Self::Shipping => RemoteStatusQuery::ProviderStatuses(SHIPPING_PROVIDER_STATUSES),
            Self::Printed => RemoteStatusQuery::OperationStatus("printed"),
            Self::Scan => RemoteStatusQuery::ScanOnly,
        }
    }

    pub const fn supports_list_fetch(self) -> bool {
        !matches!(self.remote_query(), RemoteStatusQuery::ScanOnly)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ShopFilter {
    #[default]
    All,
    Shop(ShopId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SearchFilters {
    pub posting_number: Option<String>,
    pub sku: Option<String>,
    pub tracking_number: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        [
            &self.posting_number,
            &self.sku,
            &self.tracking_number,
            &self.date_from,
            &self.date_to,
        ]
        .into_iter()
        .all(|value| value.as_deref().map(str::trim).unwrap_or_default().is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Desc => "desc",
            Self::Asc => "asc",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewMode {
    #[default]
    Card,
    List,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PurchaseInfoFilter {
    #[default]
    All,
    Complete,
    Missing,
}

impl PurchaseInfoFilter {
    pub const fn as_param(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Complete => Some("complete"),
            Self::Missing => Some("missing"),
        }
    }
}

/// Print-status sub-filter of the scan mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PrintStatusFilter {
    #[default]
    All,
    Printed,
    Unprinted,
}

impl PrintStatusFilter {
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Printed => "printed",
            Self::Unprinted => "unprinted",
        }
    }
}

/// The full filter tuple of the packing list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShipmentQuery {
    pub shop: ShopFilter,
    pub status_tab: StatusTab,
    pub search: SearchFilters,
    pub sort_order: SortOrder,
    pub view_mode: ViewMode,
    pub platform: Option<String>,
    pub purchase_info: PurchaseInfoFilter,
}
