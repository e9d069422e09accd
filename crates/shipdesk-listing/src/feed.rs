use std::sync::{Arc, Mutex};

use shipdesk_api::{ListShipmentsRequest, ShipmentApi};
use shipdesk_domain::{FilterGeneration, Shipment, StatusTab};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::coordinator::{FetchTicket, MergeOutcome, QueryCoordinator};
use crate::scroll::ScrollMetrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
    Merged { added: usize, has_more: bool },
    /// The response belonged to a superseded generation and was dropped.
    Stale,
    /// No fetch was due.
    Idle,
    Failed { notice: String },
}

/// Point-in-time copy of the list for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub generation: FilterGeneration,
    pub status_tab: StatusTab,
    pub shipments: Vec<Shipment>,
    pub reported_total: usize,
    pub has_more: bool,
    pub loading: bool,
    pub selected: Vec<String>,
    pub notice: Option<String>,
}

/// Drives a [`QueryCoordinator`] against the remote list endpoint.
pub struct ShipmentFeed {
    api: Arc<dyn ShipmentApi>,
    coordinator: Mutex<QueryCoordinator<Shipment>>,
}

impl ShipmentFeed {
    pub fn new(api: Arc<dyn ShipmentApi>, coordinator: QueryCoordinator<Shipment>) -> Self {
        Self {
            api,
            coordinator: Mutex::new(coordinator),
        }
    }

    /// Runs `f` with exclusive access to the coordinator. The lock is released
    /// before any network call.
    pub fn with_coordinator<R>(&self, f: impl FnOnce(&mut QueryCoordinator<Shipment>) -> R) -> R {
        let mut coordinator = self.coordinator.lock().expect("shipment feed lock poisoned");
        f(&mut coordinator)
    }

    pub async fn load_next(&self) -> FeedUpdate {
        match self.with_coordinator(QueryCoordinator::begin_fetch) {
            Some(ticket) => self.execute(ticket).await,
            None => FeedUpdate::Idle,
        }
    }

    pub async fn on_scroll(&self, container: &str, metrics: ScrollMetrics, now: Instant) -> FeedUpdate {
        match self.with_coordinator(|coordinator| coordinator.on_scroll(container, metrics, now)) {
            Some(ticket) => self.execute(ticket).await,
            None => FeedUpdate::Idle,
        }
    }

    /// Loads pages until `pages` have merged or the generation is exhausted.
    pub async fn load_pages(&self, pages: usize) -> Vec<FeedUpdate> {
        let mut updates = Vec::new();
        for _ in 0..pages {
            let update = self.load_next().await;
            let done = !matches!(update, FeedUpdate::Merged { has_more: true, .. });
            updates.push(update);
            if done {
                break;
            }
        }
        updates
    }

    /// Performs the fetch described by `ticket` and hands the result back to
    /// the coordinator.
    pub async fn execute(&self, ticket: FetchTicket) -> FeedUpdate {
        let request = ListShipmentsRequest {
            query: ticket.query.clone(),
            offset: ticket.cursor.offset,
            limit: ticket.cursor.limit,
        };
        debug!(
            generation = ticket.generation.value(),
            offset = request.offset,
            limit = request.limit,
            tab = ticket.query.status_tab.as_key(),
            "fetching shipment page"
        );

        match self.api.list_shipments(request).await {
            Ok(page) => {
                let outcome = self.with_coordinator(|coordinator| {
                    coordinator.apply_page(&ticket, page.items, page.total)
                });
                match outcome {
                    MergeOutcome::Merged { added, has_more } => {
                        FeedUpdate::Merged { added, has_more }
                    }
                    MergeOutcome::Stale => FeedUpdate::Stale,
                }
            }
            Err(error) => {
                let notice = self.with_coordinator(|coordinator| {
                    coordinator.apply_failure(&ticket, error.to_string())
                });
                match notice {
                    Some(notice) => FeedUpdate::Failed { notice },
                    None => {
                        warn!(
                            generation = ticket.generation.value(),
                            error = %error,
                            "ignoring failure of superseded shipment fetch"
                        );
                        FeedUpdate::Stale
                    }
                }
            }
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.with_coordinator(|coordinator| FeedSnapshot {
            generation: coordinator.generation(),
            status_tab: coordinator.query().status_tab,
            shipments: coordinator.store().entries().to_vec(),
            reported_total: coordinator.store().reported_total(),
            has_more: coordinator.has_more(),
            loading: coordinator.is_fetching(),
            selected: coordinator.selection().keys().map(ToOwned::to_owned).collect(),
            notice: coordinator.last_notice().map(ToOwned::to_owned),
        })
    }
}
