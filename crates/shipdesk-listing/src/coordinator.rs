use shipdesk_domain::{
    FilterGeneration, Keyed, PurchaseInfoFilter, SearchFilters, ShipmentQuery, ShopFilter,
    SortOrder, StatusTab, ViewMode,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::page_sizer::{PageGeometry, ViewportPageSizer};
use crate::planner::{FetchCursor, FetchPlanner};
use crate::scroll::{ScrollMetrics, ScrollTrigger, ScrollTriggerConfig, TriggerState};
use crate::selection::SelectionSet;
use crate::store::AccumulationStore;

/// A fetch issued by the coordinator. The result must be handed back with
/// the same ticket so stale generations can be discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: FilterGeneration,
    pub cursor: FetchCursor,
    pub query: ShipmentQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged { added: usize, has_more: bool },
    Stale,
}

/// Owns the filter tuple and everything derived from it: generation, fetch
/// cursor, accumulated entities, selection and scroll trigger.
#[derive(Debug)]
pub struct QueryCoordinator<T> {
    query: ShipmentQuery,
    generation: FilterGeneration,
    sizer: ViewportPageSizer,
    container_width: u32,
    geometry: PageGeometry,
    planner: FetchPlanner,
    store: AccumulationStore<T>,
    selection: SelectionSet,
    trigger: ScrollTrigger,
    next_page_index: usize,
    /// Loaded rows that left the server-side view since the first page.
    removed_from_view: usize,
    in_flight_page: Option<usize>,
    last_notice: Option<String>,
}

impl<T> QueryCoordinator<T>
where
    T: Keyed,
{
    pub fn new(
        sizer: ViewportPageSizer,
        container_width: u32,
        trigger_config: ScrollTriggerConfig,
    ) -> Self {
        let query = ShipmentQuery::default();
        let geometry = sizer.geometry(container_width, query.view_mode);
        let generation = FilterGeneration::initial();
        Self {
            query,
            generation,
            sizer,
            container_width,
            geometry,
            planner: FetchPlanner::from_geometry(geometry),
            store: AccumulationStore::new(generation),
            selection: SelectionSet::new(),
            trigger: ScrollTrigger::new(trigger_config),
            next_page_index: 1,
            removed_from_view: 0,
            in_flight_page: None,
            last_notice: None,
        }
    }

    pub fn query(&self) -> &ShipmentQuery {
        &self.query
    }

    pub fn generation(&self) -> FilterGeneration {
        self.generation
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn store(&self) -> &AccumulationStore<T> {
        &self.store
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn trigger_state(&self) -> TriggerState {
        self.trigger.state()
    }

    pub fn has_more(&self) -> bool {
        self.store.has_more()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight_page.is_some()
    }

    pub fn last_notice(&self) -> Option<&str> {
        self.last_notice.as_deref()
    }

    pub fn attach_scroll_container(&mut self, container: impl Into<String>) {
        self.trigger.attach(container);
    }

    /// Forgets a container and its last recorded position.
    pub fn detach_scroll_container(&mut self, container: &str) -> bool {
        self.trigger.detach(container)
    }

    /// Applies `change` to a copy of the filter tuple and invalidates the
    /// accumulation when the tuple actually changed.
    pub fn update_query(&mut self, change: impl FnOnce(&mut ShipmentQuery)) -> bool {
        let mut next = self.query.clone();
        change(&mut next);
        if next == self.query {
            return false;
        }

        self.query = next;
        self.invalidate("filters changed");
        true
    }

    pub fn set_status_tab(&mut self, tab: StatusTab) -> bool {
        self.update_query(|query| query.status_tab = tab)
    }

    pub fn set_shop(&mut self, shop: ShopFilter) -> bool {
        self.update_query(|query| query.shop = shop)
    }

    pub fn set_search(&mut self, search: SearchFilters) -> bool {
        self.update_query(|query| query.search = search)
    }

    pub fn set_sort_order(&mut self, sort_order: SortOrder) -> bool {
        self.update_query(|query| query.sort_order = sort_order)
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) -> bool {
        self.update_query(|query| query.view_mode = view_mode)
    }

    pub fn set_platform(&mut self, platform: Option<String>) -> bool {
        self.update_query(|query| query.platform = platform)
    }

    pub fn set_purchase_info(&mut self, purchase_info: PurchaseInfoFilter) -> bool {
        self.update_query(|query| query.purchase_info = purchase_info)
    }

    /// Starts a fresh generation for the same filters.
    pub fn refresh(&mut self) {
        self.invalidate("refresh requested");
    }

    /// Records a new container width. Page sizes of a generation that has
    /// already issued fetches stay fixed so offsets remain contiguous; the
    /// new geometry applies from the next generation.
    pub fn resize(&mut self, container_width: u32) -> bool {
        self.container_width = container_width;
        let geometry = self.sizer.geometry(container_width, self.query.view_mode);
        if geometry == self.geometry {
            return false;
        }
        if self.store.is_loaded() || self.in_flight_page.is_some() {
            debug!(
                generation = self.generation.value(),
                columns = geometry.columns,
                "deferring page geometry change to next generation"
            );
            return false;
        }

        self.apply_geometry(geometry);
        true
    }

    /// Issues the next fetch of the current generation, if one is due.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        if !self.query.status_tab.supports_list_fetch() || self.in_flight_page.is_some() {
            return None;
        }
        if self.next_page_index > 1 && !self.store.has_more() {
            return None;
        }

        let mut cursor = self
            .planner
            .plan(self.generation, self.store.len(), self.next_page_index);
        if !cursor.is_first_page() {
            cursor.offset = cursor.offset.saturating_sub(self.removed_from_view);
        }
        self.in_flight_page = Some(cursor.page_index);
        self.trigger.mark_pending();
        Some(FetchTicket {
            generation: self.generation,
            cursor,
            query: self.query.clone(),
        })
    }

    /// Feeds a scroll sample to the trigger and issues the next fetch when
    /// the threshold was crossed.
    pub fn on_scroll(
        &mut self,
        container: &str,
        metrics: ScrollMetrics,
        now: Instant,
    ) -> Option<FetchTicket> {
        let has_more = self.store.is_loaded() && self.store.has_more();
        if !self.trigger.observe(container, metrics, has_more, now) {
            return None;
        }

        let ticket = self.begin_fetch();
        if ticket.is_none() {
            self.trigger.complete();
        }
        ticket
    }

    pub fn apply_page(&mut self, ticket: &FetchTicket, items: Vec<T>, total: usize) -> MergeOutcome {
        if !self.accepts(ticket) {
            debug!(
                ticket_generation = ticket.generation.value(),
                generation = self.generation.value(),
                page_index = ticket.cursor.page_index,
                "discarding stale shipment page"
            );
            return MergeOutcome::Stale;
        }

        let before = if ticket.cursor.is_first_page() {
            0
        } else {
            self.store.len()
        };
        let has_more = self.store.merge(
            self.generation,
            items,
            ticket.cursor.is_first_page(),
            ticket.cursor.limit,
            total,
        );
        let added = self.store.len().saturating_sub(before);

        self.in_flight_page = None;
        self.next_page_index += 1;
        self.trigger.complete();
        self.last_notice = None;

        debug!(
            generation = self.generation.value(),
            page_index = ticket.cursor.page_index,
            added,
            accumulated = self.store.len(),
            total,
            has_more,
            "merged shipment page"
        );
        MergeOutcome::Merged { added, has_more }
    }

    /// Records a failed fetch. Accumulated state stays intact; the returned
    /// notice is meant for the user.
    pub fn apply_failure(&mut self, ticket: &FetchTicket, message: impl Into<String>) -> Option<String> {
        if !self.accepts(ticket) {
            return None;
        }

        let message = message.into();
        warn!(
            generation = self.generation.value(),
            page_index = ticket.cursor.page_index,
            error = %message,
            "shipment page fetch failed"
        );
        self.in_flight_page = None;
        self.trigger.complete();
        let notice = format!("Failed to load shipments: {message}");
        self.last_notice = Some(notice.clone());
        Some(notice)
    }

    pub fn toggle_selection(&mut self, key: &str) -> bool {
        if !self.selection.contains(key) && !self.store.contains(key) {
            return false;
        }
        self.selection.toggle(key)
    }

    pub fn select_all_loaded(&mut self) {
        let unselected = self
            .store
            .keys()
            .filter(|key| !self.selection.contains(key))
            .map(ToOwned::to_owned)
            .collect::<Vec<_>>();
        for key in unselected {
            self.selection.toggle(&key);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selected_entities(&self) -> Vec<&T> {
        self.selection.ordered_from(self.store.iter())
    }

    /// Drops entities after a terminal action moved them out of this view.
    /// Later continuation offsets move back by the number removed, since the
    /// server no longer counts those rows. A fetch already in flight keeps
    /// the offset it was planned with.
    pub fn remove_entries<'a>(&mut self, keys: impl IntoIterator<Item = &'a str> + Clone) -> usize {
        self.selection.remove_processed(keys.clone());
        let removed = self.store.remove(keys);
        self.removed_from_view += removed;
        removed
    }

    /// Cleans up after a batch run. When the processed entities no longer
    /// match the active filters the server-side offsets have shifted, so the
    /// accumulation restarts from the first page.
    pub fn settle_batch<'a>(
        &mut self,
        processed: impl IntoIterator<Item = &'a str>,
        left_current_view: bool,
    ) {
        if left_current_view {
            self.invalidate("batch moved entities out of view");
        } else {
            self.selection.remove_processed(processed);
        }
    }

    fn accepts(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
            && self.in_flight_page == Some(ticket.cursor.page_index)
    }

    fn apply_geometry(&mut self, geometry: PageGeometry) {
        self.geometry = geometry;
        self.planner = FetchPlanner::from_geometry(geometry);
    }

    fn invalidate(&mut self, reason: &'static str) {
        self.generation = self.generation.next();
        let geometry = self
            .sizer
            .geometry(self.container_width, self.query.view_mode);
        self.apply_geometry(geometry);
        self.store.reset(self.generation);
        self.selection.clear();
        self.trigger.reset();
        self.next_page_index = 1;
        self.removed_from_view = 0;
        self.in_flight_page = None;
        self.last_notice = None;
        info!(
            generation = self.generation.value(),
            tab = self.query.status_tab.as_key(),
            reason,
            "shipment list invalidated"
        );
    }
}
