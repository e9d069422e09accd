use std::collections::HashSet;

use shipdesk_domain::{FilterGeneration, Keyed};

/// Deduplicated, insertion-ordered accumulation of fetched pages for one
/// filter generation.
#[derive(Debug, Clone)]
pub struct AccumulationStore<T> {
    generation: FilterGeneration,
    entries: Vec<T>,
    keys: HashSet<String>,
    reported_total: usize,
    loaded: bool,
    exhausted: bool,
}

impl<T> Default for AccumulationStore<T> {
    fn default() -> Self {
        Self {
            generation: FilterGeneration::initial(),
            entries: Vec::new(),
            keys: HashSet::new(),
            reported_total: 0,
            loaded: false,
            exhausted: false,
        }
    }
}

impl<T> AccumulationStore<T>
where
    T: Keyed,
{
    pub fn new(generation: FilterGeneration) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn generation(&self) -> FilterGeneration {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn reported_total(&self) -> usize {
        self.reported_total
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Keyed::entity_key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        if !self.keys.contains(key) {
            return None;
        }
        self.entries.iter().find(|entry| entry.entity_key() == key)
    }

    /// Nothing is known about a generation before its first page lands, so
    /// the store reports more data until then.
    pub fn has_more(&self) -> bool {
        if !self.loaded {
            return !self.exhausted;
        }
        !self.exhausted && self.entries.len() < self.reported_total
    }

    /// Merges one page and returns the recomputed has-more flag.
    ///
    /// A page shorter than `requested_limit` ends the generation regardless of
    /// the reported total, which the server only approximates.
    pub fn merge(
        &mut self,
        generation: FilterGeneration,
        page: Vec<T>,
        is_first_page: bool,
        requested_limit: usize,
        reported_total: usize,
    ) -> bool {
        let returned = page.len();
        if is_first_page || generation != self.generation {
            self.reset(generation);
        }

        for entity in page {
            if self.keys.insert(entity.entity_key().to_owned()) {
                self.entries.push(entity);
            }
        }

        self.reported_total = reported_total;
        self.loaded = true;
        if returned < requested_limit {
            self.exhausted = true;
        }
        self.has_more()
    }

    /// Removes entities that left the current view and returns how many were
    /// dropped. The reported total shrinks with them.
    pub fn remove<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) -> usize {
        let doomed = keys
            .into_iter()
            .filter(|key| self.keys.contains(*key))
            .map(ToOwned::to_owned)
            .collect::<HashSet<_>>();
        if doomed.is_empty() {
            return 0;
        }
        self.retain(|entity| !doomed.contains(entity.entity_key()))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.entries.len();
        let keys = &mut self.keys;
        self.entries.retain(|entity| {
            let kept = keep(entity);
            if !kept {
                keys.remove(entity.entity_key());
            }
            kept
        });
        let removed = before - self.entries.len();
        self.reported_total = self.reported_total.saturating_sub(removed);
        removed
    }

    pub fn reset(&mut self, generation: FilterGeneration) {
        self.generation = generation;
        self.entries.clear();
        self.keys.clear();
        self.reported_total = 0;
        self.loaded = false;
        self.exhausted = false;
    }
}

#[cfg(test)]
mod tests {
    use shipdesk_domain::{FilterGeneration, Keyed};

    use super::AccumulationStore;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        key: String,
        version: u32,
    }

    impl Keyed for Item {
        fn entity_key(&self) -> &str {
            &self.key
        }
    }

    fn item(key: &str, version: u32) -> Item {
        Item {
            key: key.to_owned(),
            version,
        }
    }

    fn page(prefix: &str, range: std::ops::Range<usize>) -> Vec<Item> {
        range.map(|index| item(&format!("{prefix}{index}"), 1)).collect()
    }

    fn keys(store: &AccumulationStore<Item>) -> Vec<String> {
        store.keys().map(ToOwned::to_owned).collect()
    }

    #[test]
    fn first_page_deduplicates_within_itself_keeping_first_occurrence() {
        let generation = FilterGeneration::initial();
        let mut store = AccumulationStore::new(generation);

        store.merge(
            generation,
            vec![item("a", 1), item("b", 1), item("a", 2)],
            true,
            3,
            10,
        );

        assert_eq!(keys(&store), vec!["a", "b"]);
        assert_eq!(store.get("a").map(|entry| entry.version), Some(1));
    }

    #[test]
    fn continuation_merges_keep_first_seen_data_and_order() {
        let generation = FilterGeneration::initial();
        let mut store = AccumulationStore::new(generation);

        store.merge(generation, vec![item("a", 1), item("b", 1)], true, 2, 10);
        store.merge(generation, vec![item("b", 2), item("c", 1)], false, 2, 10);
        store.merge(generation, vec![item("d", 1), item("a", 3)], false, 2, 10);

        assert_eq!(keys(&store), vec!["a", "b", "c", "d"]);
        assert_eq!(store.get("b").map(|entry| entry.version), Some(1));
        assert_eq!(store.get("a").map(|entry| entry.version), Some(1));
    }

    #[test]
    fn has_more_turns_false_when_count_reaches_total() {
        let generation = FilterGeneration::initial();
        let mut store = AccumulationStore::new(generation);

        assert!(store.merge(generation, page("p", 0..20), true, 20, 57));
        assert!(store.merge(generation, page("p", 20..40), false, 20, 57));
        assert!(!store.merge(generation, page("p", 40..57), false, 20, 57));
        assert_eq!(store.len(), 57);
    }

    #[test]
    fn empty_page_after_overcount_stays_exhausted() {
        let generation = FilterGeneration::initial();
        let mut store = AccumulationStore::new(generation);

        store.merge(generation, page("p", 0..20), true, 20, 57);
        store.merge(generation, page("p", 20..40), false, 20, 57);
        // 60 accumulated against a reported total of 57.
        assert!(!store.merge(generation, page("p", 40..60), false, 20, 57));
        assert_eq!(store.len(), 60);

        assert!(!store.merge(generation, Vec::new(), false, 20, 57));
        assert_eq!(store.len(), 60);
    }

    #[test]
    fn short_page_ends_generation_even_when_total_claims_more() {
        let generation = FilterGeneration::initial();
        let mut store = AccumulationStore::new(generation);

        assert!(store.merge(generation, page("p", 0..20), true, 20, 100));
        assert!(store.merge(generation, page("p", 20..40), false, 20, 100));
        assert!(!store.merge(generation, page("p", 40..57), false, 20, 100));
        assert!(!store.has_more());
        assert_eq!(store.reported_total(), 100);
    }

    #[test]
    fn full_page_of_duplicates_does_not_count_as_short() {
        let generation = FilterGeneration::initial();
        let mut store = AccumulationStore::new(generation);

        store.merge(generation, page("p", 0..4), true, 4, 20);
        assert!(store.merge(generation, page("p", 2..6), false, 4, 20));
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn merge_from_another_generation_replaces_contents() {
        let first = FilterGeneration::initial();
        let second = first.next();
        let mut store = AccumulationStore::new(first);

        store.merge(first, page("a", 0..3), true, 3, 9);
        store.merge(second, page("b", 0..2), false, 3, 2);

        assert_eq!(store.generation(), second);
        assert_eq!(keys(&store), vec!["b0", "b1"]);
        assert!(!store.has_more());
    }

    #[test]
    fn remove_drops_keys_and_shrinks_total() {
        let generation = FilterGeneration::initial();
        let mut store = AccumulationStore::new(generation);
        store.merge(generation, page("p", 0..5), true, 5, 12);

        let removed = store.remove(["p1", "p3", "missing"]);

        assert_eq!(removed, 2);
        assert_eq!(keys(&store), vec!["p0", "p2", "p4"]);
        assert!(!store.contains("p1"));
        assert_eq!(store.reported_total(), 10);
        assert!(store.has_more());
    }

    #[test]
    fn unloaded_store_reports_more_data() {
        let store = AccumulationStore::<Item>::new(FilterGeneration::initial());
        assert!(store.has_more());
        assert!(!store.is_loaded());
        assert!(store.is_empty());
    }
}
