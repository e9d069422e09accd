use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

pub const DEFAULT_SCROLL_THRESHOLD: f64 = 0.85;
pub const DEFAULT_SCROLL_THROTTLE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollTriggerConfig {
    pub threshold: f64,
    pub throttle: Duration,
}

impl Default for ScrollTriggerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SCROLL_THRESHOLD,
            throttle: DEFAULT_SCROLL_THROTTLE,
        }
    }
}

/// Position of one scrollable container along its scroll axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub offset: f64,
    pub viewport: f64,
    pub total: f64,
}

impl ScrollMetrics {
    pub fn new(offset: f64, viewport: f64, total: f64) -> Self {
        Self {
            offset,
            viewport,
            total,
        }
    }

    /// Content that does not fill the viewport counts as fully scrolled.
    pub fn progress(&self) -> f64 {
        if self.total <= 0.0 || self.total <= self.viewport {
            return 1.0;
        }
        ((self.offset.max(0.0) + self.viewport) / self.total).min(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    LoadPending,
}

/// Fires "load next page" at most once per pending fetch, sampling the
/// scroll position no more often than the throttle window allows.
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    config: ScrollTriggerConfig,
    state: TriggerState,
    last_evaluated_at: Option<Instant>,
    containers: BTreeMap<String, Option<ScrollMetrics>>,
}

impl ScrollTrigger {
    pub fn new(config: ScrollTriggerConfig) -> Self {
        Self {
            config,
            state: TriggerState::Idle,
            last_evaluated_at: None,
            containers: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> ScrollTriggerConfig {
        self.config
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == TriggerState::LoadPending
    }

    pub fn attach(&mut self, container: impl Into<String>) {
        self.containers.entry(container.into()).or_insert(None);
    }

    pub fn detach(&mut self, container: &str) -> bool {
        self.containers.remove(container).is_some()
    }

    pub fn attached(&self) -> impl Iterator<Item = &str> {
        self.containers.keys().map(String::as_str)
    }

    /// Records a scroll sample and returns `true` when it moved the trigger
    /// from `Idle` to `LoadPending`. Unknown containers are attached on
    /// first sight.
    pub fn observe(
        &mut self,
        container: &str,
        metrics: ScrollMetrics,
        has_more: bool,
        now: Instant,
    ) -> bool {
        self.containers
            .insert(container.to_owned(), Some(metrics));

        if let Some(last) = self.last_evaluated_at {
            if now.saturating_duration_since(last) < self.config.throttle {
                return false;
            }
        }
        self.last_evaluated_at = Some(now);

        if self.state == TriggerState::LoadPending || !has_more {
            return false;
        }

        let crossed = self
            .containers
            .iter()
            .filter_map(|(name, metrics)| metrics.map(|metrics| (name, metrics)))
            .find(|(_, metrics)| metrics.progress() > self.config.threshold);
        let Some((name, metrics)) = crossed else {
            return false;
        };

        trace!(
            container = %name,
            progress = metrics.progress(),
            "scroll threshold crossed"
        );
        self.state = TriggerState::LoadPending;
        true
    }

    /// Marks a fetch as in flight without a scroll sample, e.g. the first
    /// page of a generation.
    pub fn mark_pending(&mut self) {
        self.state = TriggerState::LoadPending;
    }

    /// The triggered fetch was merged or failed.
    pub fn complete(&mut self) {
        self.state = TriggerState::Idle;
    }

    /// Re-arms after a filter change; the next sample is evaluated
    /// immediately.
    pub fn reset(&mut self) {
        self.state = TriggerState::Idle;
        self.last_evaluated_at = None;
    }
}

impl Default for ScrollTrigger {
    fn default() -> Self {
        Self::new(ScrollTriggerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{ScrollMetrics, ScrollTrigger, ScrollTriggerConfig, TriggerState};

    fn trigger() -> ScrollTrigger {
        ScrollTrigger::new(ScrollTriggerConfig {
            threshold: 0.85,
            throttle: Duration::from_millis(150),
        })
    }

    fn at(progress_offset: f64) -> ScrollMetrics {
        ScrollMetrics::new(progress_offset, 100.0, 1000.0)
    }

    #[test]
    fn progress_accounts_for_viewport_extent() {
        assert_eq!(at(750.0).progress(), 0.85);
        assert_eq!(ScrollMetrics::new(0.0, 800.0, 500.0).progress(), 1.0);
        assert_eq!(ScrollMetrics::new(0.0, 0.0, 0.0).progress(), 1.0);
    }

    #[test]
    fn crossing_fires_once_while_pending() {
        let mut trigger = trigger();
        let start = Instant::now();

        assert!(!trigger.observe("window", at(500.0), true, start));
        assert!(trigger.observe(
            "window",
            at(800.0),
            true,
            start + Duration::from_millis(200)
        ));
        assert_eq!(trigger.state(), TriggerState::LoadPending);
        assert!(!trigger.observe(
            "window",
            at(900.0),
            true,
            start + Duration::from_millis(400)
        ));
    }

    #[test]
    fn two_crossings_inside_throttle_window_fire_once() {
        let mut trigger = trigger();
        let start = Instant::now();

        assert!(trigger.observe("window", at(800.0), true, start));
        trigger.complete();
        assert!(!trigger.observe(
            "window",
            at(880.0),
            true,
            start + Duration::from_millis(100)
        ));
        assert_eq!(trigger.state(), TriggerState::Idle);

        assert!(trigger.observe(
            "window",
            at(880.0),
            true,
            start + Duration::from_millis(160)
        ));
    }

    #[test]
    fn exhausted_list_never_fires() {
        let mut trigger = trigger();
        assert!(!trigger.observe("window", at(900.0), false, Instant::now()));
        assert_eq!(trigger.state(), TriggerState::Idle);
    }

    #[test]
    fn any_attached_container_crossing_is_authoritative() {
        let mut trigger = trigger();
        trigger.attach("window");
        trigger.attach("panel");
        let start = Instant::now();

        assert!(!trigger.observe("window", at(0.0), true, start));
        assert!(trigger.observe(
            "panel",
            at(850.0),
            true,
            start + Duration::from_millis(150)
        ));
        assert_eq!(trigger.attached().collect::<Vec<_>>(), vec!["panel", "window"]);
    }

    #[test]
    fn throttled_samples_still_update_container_positions() {
        let mut trigger = trigger();
        let start = Instant::now();

        assert!(!trigger.observe("window", at(0.0), true, start));
        assert!(!trigger.observe(
            "panel",
            at(900.0),
            true,
            start + Duration::from_millis(50)
        ));
        // The panel sample was recorded while throttled and is evaluated on the
        // next window sample.
        assert!(trigger.observe(
            "window",
            at(0.0),
            true,
            start + Duration::from_millis(200)
        ));
    }

    #[test]
    fn reset_rearms_and_skips_throttle() {
        let mut trigger = trigger();
        let start = Instant::now();
        trigger.mark_pending();
        assert!(!trigger.observe("window", at(900.0), true, start));

        trigger.reset();
        assert!(trigger.observe(
            "window",
            at(900.0),
            true,
            start + Duration::from_millis(10)
        ));
    }
}
