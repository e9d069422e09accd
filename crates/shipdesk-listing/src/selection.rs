use std::collections::BTreeSet;

use shipdesk_domain::Keyed;

/// Keys the user picked for a batch action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    keys: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership and returns whether the key is now selected.
    pub fn toggle(&mut self, key: &str) -> bool {
        if self.keys.remove(key) {
            false
        } else {
            self.keys.insert(key.to_owned());
            true
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Drops keys a batch run processed successfully.
    pub fn remove_processed<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) -> usize {
        keys.into_iter()
            .filter(|key| self.keys.remove(*key))
            .count()
    }

    /// Returns the selected entities in display order.
    pub fn ordered_from<'a, T>(&self, entities: impl IntoIterator<Item = &'a T>) -> Vec<&'a T>
    where
        T: Keyed + 'a,
    {
        entities
            .into_iter()
            .filter(|entity| self.keys.contains(entity.entity_key()))
            .collect()
    }

    /// Selection minus the given keys, in key order.
    pub fn excluding<'a>(&self, excluded: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let excluded = excluded.into_iter().collect::<BTreeSet<_>>();
        self.keys
            .iter()
            .filter(|key| !excluded.contains(key.as_str()))
            .cloned()
            .collect()
    }
}
