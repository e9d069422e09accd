use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A set whose members expire after a per-entry time-to-live.
///
/// Expired members are evicted lazily when they are read.
#[derive(Debug, Clone)]
pub struct ExpiringSet<K> {
    entries: HashMap<K, Instant>,
}

impl<K> Default for ExpiringSet<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K> ExpiringSet<K>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_at(&mut self, key: K, ttl: Duration, now: Instant) {
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        self.entries.insert(key, expires_at);
    }

    pub fn contains_at<Q>(&mut self, key: &Q, now: Instant) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        match self.entries.get(key) {
            Some(expires_at) if *expires_at > now => true,
            Some(_) => {
                self.entries.remove(key);
                false
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::ExpiringSet;

    #[test]
    fn members_are_visible_until_their_ttl_elapses() {
        let mut set = ExpiringSet::<String>::new();
        let start = Instant::now();
        set.insert_at("PN-1".to_owned(), Duration::from_secs(30), start);

        assert!(set.contains_at("PN-1", start + Duration::from_secs(29)));
        assert!(!set.contains_at("PN-1", start + Duration::from_secs(30)));
    }

    #[test]
    fn expired_members_are_evicted_on_read() {
        let mut set = ExpiringSet::<String>::new();
        let start = Instant::now();
        set.insert_at("PN-1".to_owned(), Duration::from_millis(10), start);
        set.insert_at("PN-2".to_owned(), Duration::from_secs(60), start);
        assert_eq!(set.len(), 2);

        assert!(!set.contains_at("PN-1", start + Duration::from_secs(1)));
        assert_eq!(set.len(), 1);
        assert!(set.contains_at("PN-2", start + Duration::from_secs(1)));
    }

    #[test]
    fn reinserting_refreshes_the_deadline() {
        let mut set = ExpiringSet::<String>::new();
        let start = Instant::now();
        set.insert_at("PN-1".to_owned(), Duration::from_secs(5), start);
        set.insert_at(
            "PN-1".to_owned(),
            Duration::from_secs(5),
            start + Duration::from_secs(4),
        );

        assert!(set.contains_at("PN-1", start + Duration::from_secs(8)));
    }
}
