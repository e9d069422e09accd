//! Incremental accumulation of the packing list: viewport-driven page sizes,
//! generation-tagged fetches, deduplicating merges and scroll triggering.

pub mod coordinator;
pub mod feed;
pub mod page_sizer;
pub mod planner;
pub mod scan;
pub mod scroll;
pub mod selection;
pub mod store;

pub use coordinator::{FetchTicket, MergeOutcome, QueryCoordinator};
pub use feed::{FeedSnapshot, FeedUpdate, ShipmentFeed};
pub use page_sizer::{
    compute_columns, PageGeometry, ViewportPageSizer, DEFAULT_CARD_WIDTH,
    DEFAULT_CONTINUATION_ROWS, DEFAULT_INITIAL_ROWS, DEFAULT_MAX_PAGE_SIZE, DEFAULT_RESERVED_WIDTH,
};
pub use planner::{FetchCursor, FetchPlanner};
pub use scan::{
    ClipboardDecision, ScanLookup, ScanLookupPaginator, ScanTicket, ScanUpdate,
    DEFAULT_CLIPBOARD_REJECT_TTL, DEFAULT_SCAN_PAGE_SIZE,
};
pub use scroll::{
    ScrollMetrics, ScrollTrigger, ScrollTriggerConfig, TriggerState, DEFAULT_SCROLL_THRESHOLD,
    DEFAULT_SCROLL_THROTTLE,
};
pub use selection::SelectionSet;
pub use store::AccumulationStore;
