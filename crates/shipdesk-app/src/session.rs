use std::sync::Arc;

use shipdesk_api::{ApiConfig, HttpShipmentApi, ShipmentApi};
use shipdesk_batch::{
    BatchOperationCoordinator, BatchRun, LabelPrintFlow, PrintOutcome, ProgressBus, SyncJobPoller,
};
use shipdesk_config::{LayoutSection, ScrollSection, ShipdeskConfig};
use shipdesk_domain::{CoreError, Keyed, PostingNumber, StatusTab};
use shipdesk_listing::{
    FeedUpdate, QueryCoordinator, ScanLookup, ScanLookupPaginator, ScrollTriggerConfig,
    ShipmentFeed, ViewportPageSizer,
};
use tracing::{info, warn};

pub fn page_sizer_from_config(layout: &LayoutSection) -> ViewportPageSizer {
    ViewportPageSizer {
        reserved_width: layout.reserved_width,
        card_width: layout.card_width,
        initial_rows: layout.initial_rows,
        continuation_rows: layout.continuation_rows,
        max_page_size: layout.max_page_size,
    }
}

pub fn scroll_config_from_config(scroll: &ScrollSection) -> ScrollTriggerConfig {
    ScrollTriggerConfig {
        threshold: scroll.threshold,
        throttle: scroll.throttle(),
    }
}

/// One operator session: the accumulated list, the scan lookup and the batch
/// actions that run over the list selection.
pub struct DeskSession {
    feed: ShipmentFeed,
    scan: ScanLookup,
    batches: BatchOperationCoordinator,
    printer: LabelPrintFlow,
    sync: SyncJobPoller,
}

impl DeskSession {
    pub fn new(config: &ShipdeskConfig, api: Arc<dyn ShipmentApi>, container_width: u32) -> Self {
        let coordinator = QueryCoordinator::new(
            page_sizer_from_config(&config.layout),
            container_width,
            scroll_config_from_config(&config.scroll),
        );
        let batches = BatchOperationCoordinator::new(Arc::new(ProgressBus::default()));
        let printer = LabelPrintFlow::new(api.clone(), batches.clone())
            .with_chunk_size(config.batch.print_chunk_size)
            .with_concurrency(config.batch.print_concurrency);
        let sync = SyncJobPoller::new(
            api.clone(),
            config.batch.sync_poll_interval(),
            config.batch.sync_timeout(),
        );
        let scan = ScanLookup::new(
            api.clone(),
            ScanLookupPaginator::new(config.scan.page_size, config.scan.clipboard_reject_ttl()),
        );

        Self {
            feed: ShipmentFeed::new(api, coordinator),
            scan,
            batches,
            printer,
            sync,
        }
    }

    /// Builds a session against the HTTP API, reading the token from the
    /// environment.
    pub fn connect(config: &ShipdeskConfig, container_width: u32) -> Result<Self, CoreError> {
        let api_config = ApiConfig::from_env(Some(config.api.base_url.as_str()))?;
        let api = HttpShipmentApi::new(&api_config).map_err(CoreError::from)?;
        Ok(Self::new(config, Arc::new(api), container_width))
    }

    pub fn feed(&self) -> &ShipmentFeed {
        &self.feed
    }

    pub fn scan(&self) -> &ScanLookup {
        &self.scan
    }

    pub fn progress(&self) -> &ProgressBus {
        self.batches.progress()
    }

    pub fn selected_postings(&self) -> Vec<PostingNumber> {
        self.feed.with_coordinator(|coordinator| {
            coordinator
                .selected_entities()
                .into_iter()
                .map(|shipment| shipment.posting_number.clone())
                .collect()
        })
    }

    /// Prints labels for the current selection, then drops printed postings
    /// from the selection. Printed postings leave every tab except
    /// `Printed`, in which case the list restarts from its first page.
    pub async fn print_selected(&self) -> PrintOutcome {
        let selection = self.selected_postings();
        let outcome = self.printer.print(&selection).await;
        self.settle(outcome.printed(), |tab| tab != StatusTab::Printed)
            .await;
        outcome
    }

    pub async fn print_postings(&self, postings: &[PostingNumber]) -> PrintOutcome {
        self.printer.print(postings).await
    }

    /// Re-submits `selection` without the postings `previous` rejected.
    pub async fn retry_print(&self, selection: &[PostingNumber], previous: &PrintOutcome) -> PrintOutcome {
        let retry = LabelPrintFlow::retry_selection(selection, previous);
        info!(
            selected = selection.len(),
            retrying = retry.len(),
            "retrying label print without rejected postings"
        );
        self.printer.print(&retry).await
    }

    /// Syncs every selected posting with the marketplace, then reloads the
    /// list since remote statuses may have changed.
    pub async fn sync_selected(&self) -> BatchRun<()> {
        let selection = self.selected_postings();
        let run = self.sync.sync_each(&self.batches, selection).await;
        let synced = run
            .succeeded_keys()
            .map(PostingNumber::new)
            .collect::<Vec<_>>();
        self.settle(&synced, |_| true).await;
        run
    }

    pub async fn sync_postings(&self, postings: Vec<PostingNumber>) -> BatchRun<()> {
        self.sync.sync_each(&self.batches, postings).await
    }

    async fn settle(&self, processed: &[PostingNumber], leaves_view: impl FnOnce(StatusTab) -> bool) {
        if processed.is_empty() {
            return;
        }
        let keys = processed
            .iter()
            .map(Keyed::entity_key)
            .collect::<Vec<_>>();
        let restarted = self.feed.with_coordinator(|coordinator| {
            let left = leaves_view(coordinator.query().status_tab);
            coordinator.settle_batch(keys.iter().copied(), left);
            left
        });
        if restarted {
            let update = self.feed.load_next().await;
            if let FeedUpdate::Failed { notice } = update {
                warn!(notice = %notice, "reload after batch failed");
            }
        }
    }
}
