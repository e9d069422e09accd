use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shipdesk_api::{ScanLookupPage, ScanLookupRequest, ShipmentApi};
use shipdesk_domain::{ExpiringSet, Keyed, PrintStatusFilter, Shipment};
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_SCAN_PAGE_SIZE: usize = 20;
pub const DEFAULT_CLIPBOARD_REJECT_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTicket {
    pub sequence: u64,
    pub query: String,
    pub offset: usize,
    pub limit: usize,
    pub print_status: PrintStatusFilter,
    pub append: bool,
}

impl ScanTicket {
    pub fn request(&self) -> ScanLookupRequest {
        ScanLookupRequest {
            query: self.query.clone(),
            offset: self.offset,
            limit: self.limit,
            print_status: self.print_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanUpdate {
    Replaced { count: usize, has_more: bool },
    Appended { added: usize, has_more: bool },
    Stale,
    Idle,
    Failed { notice: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardDecision {
    Submit(String),
    Empty,
    /// Same text as the active query.
    Duplicate,
    /// Recently produced no match; ignored until the rejection expires.
    RecentlyRejected,
}

/// Lookup-by-scan results, paged independently of the main list.
#[derive(Debug)]
pub struct ScanLookupPaginator {
    page_size: usize,
    reject_ttl: Duration,
    query: String,
    print_filter: PrintStatusFilter,
    offset: usize,
    results: Vec<Shipment>,
    keys: HashSet<String>,
    total: usize,
    has_more: bool,
    sequence: u64,
    in_flight: Option<u64>,
    rejected: ExpiringSet<String>,
}

impl Default for ScanLookupPaginator {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_PAGE_SIZE, DEFAULT_CLIPBOARD_REJECT_TTL)
    }
}

impl ScanLookupPaginator {
    pub fn new(page_size: usize, reject_ttl: Duration) -> Self {
        Self {
            page_size: page_size.max(1),
            reject_ttl,
            query: String::new(),
            print_filter: PrintStatusFilter::default(),
            offset: 0,
            results: Vec::new(),
            keys: HashSet::new(),
            total: 0,
            has_more: false,
            sequence: 0,
            in_flight: None,
            rejected: ExpiringSet::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn print_filter(&self) -> PrintStatusFilter {
        self.print_filter
    }

    pub fn results(&self) -> &[Shipment] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Starts a new lookup from offset 0. Results of any earlier request are
    /// dropped when they arrive.
    pub fn begin_search(&mut self, query: &str, print_filter: PrintStatusFilter) -> Option<ScanTicket> {
        self.query = query.trim().to_owned();
        self.print_filter = print_filter;
        self.sequence += 1;
        self.offset = 0;
        self.results.clear();
        self.keys.clear();
        self.total = 0;
        self.has_more = false;
        self.in_flight = None;

        if self.query.is_empty() {
            return None;
        }
        Some(self.issue(0, false))
    }

    pub fn begin_load_more(&mut self) -> Option<ScanTicket> {
        if self.query.is_empty() || !self.has_more || self.in_flight.is_some() {
            return None;
        }
        Some(self.issue(self.offset, true))
    }

    /// The print-status sub-filter is applied server side, so a change
    /// re-runs the lookup.
    pub fn set_print_filter(&mut self, print_filter: PrintStatusFilter) -> Option<ScanTicket> {
        if print_filter == self.print_filter {
            return None;
        }
        let query = self.query.clone();
        self.begin_search(&query, print_filter)
    }

    pub fn apply(&mut self, ticket: &ScanTicket, page: ScanLookupPage) -> ScanUpdate {
        if self.in_flight != Some(ticket.sequence) {
            debug!(
                sequence = ticket.sequence,
                current = self.sequence,
                "discarding stale scan lookup result"
            );
            return ScanUpdate::Stale;
        }
        self.in_flight = None;

        let returned = page.data.len();
        let mut added = 0;
        for shipment in page.data {
            if self.keys.insert(shipment.entity_key().to_owned()) {
                self.results.push(shipment);
                added += 1;
            }
        }
        self.offset = ticket.offset + returned;
        self.total = page.total;
        self.has_more = page.has_more && returned > 0;

        if ticket.append {
            ScanUpdate::Appended {
                added,
                has_more: self.has_more,
            }
        } else {
            ScanUpdate::Replaced {
                count: self.results.len(),
                has_more: self.has_more,
            }
        }
    }

    pub fn apply_failure(&mut self, ticket: &ScanTicket, message: &str) -> ScanUpdate {
        if self.in_flight != Some(ticket.sequence) {
            return ScanUpdate::Stale;
        }
        self.in_flight = None;
        warn!(query = %ticket.query, error = %message, "scan lookup failed");
        ScanUpdate::Failed {
            notice: format!("Scan lookup failed: {message}"),
        }
    }

    pub fn accept_clipboard(&mut self, text: &str, now: Instant) -> ClipboardDecision {
        let text = text.trim();
        if text.is_empty() {
            return ClipboardDecision::Empty;
        }
        if self.rejected.contains_at(text, now.into_std()) {
            return ClipboardDecision::RecentlyRejected;
        }
        if text == self.query {
            return ClipboardDecision::Duplicate;
        }
        ClipboardDecision::Submit(text.to_owned())
    }

    pub fn reject_clipboard(&mut self, text: &str, now: Instant) {
        let text = text.trim();
        if !text.is_empty() {
            self.rejected.insert_at(text.to_owned(), self.reject_ttl, now.into_std());
        }
    }

    fn issue(&mut self, offset: usize, append: bool) -> ScanTicket {
        self.in_flight = Some(self.sequence);
        ScanTicket {
            sequence: self.sequence,
            query: self.query.clone(),
            offset,
            limit: self.page_size,
            print_status: self.print_filter,
            append,
        }
    }
}

/// Async driver for [`ScanLookupPaginator`].
pub struct ScanLookup {
    api: Arc<dyn ShipmentApi>,
    paginator: Mutex<ScanLookupPaginator>,
}

impl ScanLookup {
    pub fn new(api: Arc<dyn ShipmentApi>, paginator: ScanLookupPaginator) -> Self {
        Self {
            api,
            paginator: Mutex::new(paginator),
        }
    }

    pub fn with_paginator<R>(&self, f: impl FnOnce(&mut ScanLookupPaginator) -> R) -> R {
        let mut paginator = self.paginator.lock().expect("scan lookup lock poisoned");
        f(&mut paginator)
    }

    pub async fn search(&self, query: &str, print_filter: PrintStatusFilter) -> ScanUpdate {
        let ticket = self.with_paginator(|paginator| paginator.begin_search(query, print_filter));
        self.run(ticket).await
    }

    pub async fn load_more(&self) -> ScanUpdate {
        let ticket = self.with_paginator(ScanLookupPaginator::begin_load_more);
        self.run(ticket).await
    }

    pub async fn set_print_filter(&self, print_filter: PrintStatusFilter) -> ScanUpdate {
        let ticket = self.with_paginator(|paginator| paginator.set_print_filter(print_filter));
        self.run(ticket).await
    }

    /// Submits clipboard text as a lookup. Text that matches nothing is
    /// remembered and ignored for a while.
    pub async fn search_clipboard(&self, text: &str, now: Instant) -> ScanUpdate {
        let decision = self.with_paginator(|paginator| paginator.accept_clipboard(text, now));
        let query = match decision {
            ClipboardDecision::Submit(query) => query,
            skipped => {
                debug!(decision = ?skipped, "clipboard text not submitted");
                return ScanUpdate::Idle;
            }
        };

        let print_filter = self.with_paginator(|paginator| paginator.print_filter());
        let update = self.search(&query, print_filter).await;
        if matches!(update, ScanUpdate::Replaced { count: 0, .. }) {
            self.with_paginator(|paginator| paginator.reject_clipboard(&query, now));
        }
        update
    }

    pub fn results(&self) -> Vec<Shipment> {
        self.with_paginator(|paginator| paginator.results().to_vec())
    }

    async fn run(&self, ticket: Option<ScanTicket>) -> ScanUpdate {
        let Some(ticket) = ticket else {
            return ScanUpdate::Idle;
        };
        match self.api.scan_lookup(ticket.request()).await {
            Ok(page) => self.with_paginator(|paginator| paginator.apply(&ticket, page)),
            Err(error) => {
                let message = error.to_string();
                self.with_paginator(|paginator| paginator.apply_failure(&ticket, &message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use shipdesk_api::{
        ApiError, BatchPrintRequest, BatchPrintResponse, ListShipmentsRequest, ShipmentPage,
        SyncStartRequest, SyncStatus,
    };
    use shipdesk_domain::SyncTaskId;
    use tokio::sync::Mutex as AsyncMutex;

    use super::*;

    fn page(keys: &[&str], total: usize, has_more: bool) -> ScanLookupPage {
        ScanLookupPage {
            data: keys.iter().map(|key| Shipment::new(*key)).collect(),
            total,
            has_more,
        }
    }

    fn result_keys(paginator: &ScanLookupPaginator) -> Vec<&str> {
        paginator
            .results()
            .iter()
            .map(|shipment| shipment.posting_number.as_str())
            .collect()
    }

    #[test]
    fn search_then_load_more_appends_without_duplicates() {
        let mut paginator = ScanLookupPaginator::new(2, Duration::from_secs(5));
        let first = paginator
            .begin_search(" 4607 ", PrintStatusFilter::All)
            .expect("search ticket");
        assert_eq!((first.query.as_str(), first.offset, first.limit), ("4607", 0, 2));
        paginator.apply(&first, page(&["P-1", "P-2"], 3, true));

        let more = paginator.begin_load_more().expect("load more ticket");
        assert_eq!(more.offset, 2);
        let update = paginator.apply(&more, page(&["P-2", "P-3"], 3, false));

        assert_eq!(
            update,
            ScanUpdate::Appended {
                added: 1,
                has_more: false
            }
        );
        assert_eq!(result_keys(&paginator), vec!["P-1", "P-2", "P-3"]);
        assert!(paginator.begin_load_more().is_none());
    }

    #[test]
    fn changing_print_filter_restarts_from_offset_zero() {
        let mut paginator = ScanLookupPaginator::default();
        let first = paginator
            .begin_search("SKU-1", PrintStatusFilter::All)
            .expect("search ticket");
        paginator.apply(&first, page(&["P-1", "P-2"], 40, true));

        let ticket = paginator
            .set_print_filter(PrintStatusFilter::Unprinted)
            .expect("re-search ticket");

        assert_eq!(ticket.offset, 0);
        assert_eq!(ticket.print_status, PrintStatusFilter::Unprinted);
        assert!(!ticket.append);
        assert!(paginator.results().is_empty());
        assert!(paginator.set_print_filter(PrintStatusFilter::Unprinted).is_none());
    }

    #[test]
    fn result_of_superseded_query_is_discarded() {
        let mut paginator = ScanLookupPaginator::default();
        let old = paginator
            .begin_search("OLD", PrintStatusFilter::All)
            .expect("old ticket");
        let new = paginator
            .begin_search("NEW", PrintStatusFilter::All)
            .expect("new ticket");

        assert_eq!(paginator.apply(&old, page(&["X-1"], 1, false)), ScanUpdate::Stale);
        assert_eq!(paginator.apply_failure(&old, "late"), ScanUpdate::Stale);
        assert!(paginator.is_loading());
        paginator.apply(&new, page(&["N-1"], 1, false));
        assert_eq!(result_keys(&paginator), vec!["N-1"]);
    }

    #[test]
    fn blank_query_clears_results_without_request() {
        let mut paginator = ScanLookupPaginator::default();
        let ticket = paginator
            .begin_search("P", PrintStatusFilter::All)
            .expect("ticket");
        paginator.apply(&ticket, page(&["P-1"], 1, false));

        assert!(paginator.begin_search("   ", PrintStatusFilter::All).is_none());
        assert!(paginator.results().is_empty());
        assert!(!paginator.is_loading());
    }

    #[test]
    fn rejected_clipboard_text_is_ignored_until_ttl_elapses() {
        let mut paginator = ScanLookupPaginator::new(20, Duration::from_secs(10));
        let start = Instant::now();

        assert_eq!(
            paginator.accept_clipboard(" 123-ABC ", start),
            ClipboardDecision::Submit("123-ABC".to_owned())
        );
        paginator.reject_clipboard("123-ABC", start);
        assert_eq!(
            paginator.accept_clipboard("123-ABC", start + Duration::from_secs(9)),
            ClipboardDecision::RecentlyRejected
        );
        assert_eq!(
            paginator.accept_clipboard("123-ABC", start + Duration::from_secs(10)),
            ClipboardDecision::Submit("123-ABC".to_owned())
        );
        assert_eq!(paginator.accept_clipboard("", start), ClipboardDecision::Empty);
    }

    #[derive(Default)]
    struct StubScanApi {
        pages: AsyncMutex<VecDeque<ScanLookupPage>>,
        requests: AsyncMutex<Vec<ScanLookupRequest>>,
    }

    #[async_trait]
    impl ShipmentApi for StubScanApi {
        async fn list_shipments(
            &self,
            _request: ListShipmentsRequest,
        ) -> Result<ShipmentPage, ApiError> {
            Err(ApiError::Transport("list not stubbed".to_owned()))
        }

        async fn scan_lookup(&self, request: ScanLookupRequest) -> Result<ScanLookupPage, ApiError> {
            self.requests.lock().await.push(request);
            self.pages
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| ApiError::Transport("no scan page queued".to_owned()))
        }

        async fn batch_print(
            &self,
            _request: BatchPrintRequest,
        ) -> Result<BatchPrintResponse, ApiError> {
            Err(ApiError::Transport("batch print not stubbed".to_owned()))
        }

        async fn start_sync(&self, _request: SyncStartRequest) -> Result<SyncTaskId, ApiError> {
            Err(ApiError::Transport("sync not stubbed".to_owned()))
        }

        async fn sync_status(&self, _task_id: &SyncTaskId) -> Result<SyncStatus, ApiError> {
            Err(ApiError::Transport("sync not stubbed".to_owned()))
        }
    }

    #[tokio::test]
    async fn clipboard_search_with_no_match_is_remembered() {
        let api = Arc::new(StubScanApi::default());
        api.pages.lock().await.push_back(page(&[], 0, false));
        let lookup = ScanLookup::new(api.clone(), ScanLookupPaginator::default());
        let now = Instant::now();

        let first = lookup.search_clipboard("ghost", now).await;
        let second = lookup
            .search_clipboard("ghost", now + Duration::from_secs(1))
            .await;

        assert_eq!(
            first,
            ScanUpdate::Replaced {
                count: 0,
                has_more: false
            }
        );
        assert_eq!(second, ScanUpdate::Idle);
        assert_eq!(api.requests.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn lookup_failure_becomes_notice() {
        let api = Arc::new(StubScanApi::default());
        let lookup = ScanLookup::new(api, ScanLookupPaginator::default());

        let update = lookup.search("P-1", PrintStatusFilter::Printed).await;

        let ScanUpdate::Failed { notice } = update else {
            panic!("expected failure, got {update:?}");
        };
        assert!(notice.contains("no scan page queued"));
        assert!(lookup.results().is_empty());
    }
}
