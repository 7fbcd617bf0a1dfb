use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Match identifiers that have already triggered a broadcast.
///
/// Several followed players' poll tasks can observe the same team-mode match
/// within one interval; the first caller of `first_seen` wins and the rest
/// skip silently. Entries are pruned once older than `ttl`, which only needs
/// to cover the pollers' detection window.
pub struct DedupCache {
    ttl: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        DedupCache {
            ttl,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically record `match_id`; true when this is the first sighting.
    pub fn first_seen(&self, match_id: &str) -> bool {
        let mut seen = self.seen.lock().unwrap();
        let now = Instant::now();
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);
        if seen.contains_key(match_id) {
            false
        } else {
            seen.insert(match_id.to_string(), now);
            true
        }
    }

    pub fn has_seen(&self, match_id: &str) -> bool {
        self.seen.lock().unwrap().contains_key(match_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_wins() {
        let cache = DedupCache::new(Duration::from_secs(60));
        assert!(!cache.has_seen("M123"));
        assert!(cache.first_seen("M123"));
        assert!(!cache.first_seen("M123"));
        assert!(cache.has_seen("M123"));
        assert!(cache.first_seen("M124"));
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let cache = DedupCache::new(Duration::from_millis(20));
        assert!(cache.first_seen("M123"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.first_seen("M123"));
    }
}
