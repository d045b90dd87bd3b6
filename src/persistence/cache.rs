//! Time-bounded response cache

use std::collections::HashMap;

/// Five minutes
pub const DEFAULT_TTL_MS: f64 = 300_000.0;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at_ms: f64,
}

/// Key/value store whose entries expire after a TTL.
/// Callers pass the current time so the cache stays clock-agnostic.
#[derive(Debug, Clone)]
pub struct ResponseCache<V> {
    default_ttl_ms: f64,
    entries: HashMap<String, Entry<V>>,
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MS)
    }
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(default_ttl_ms: f64) -> Self {
        Self {
            default_ttl_ms,
            entries: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: V, now_ms: f64) {
        self.set_with_ttl(key, value, now_ms, self.default_ttl_ms);
    }

    pub fn set_with_ttl(&mut self, key: impl Into<String>, value: V, now_ms: f64, ttl_ms: f64) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at_ms: now_ms + ttl_ms,
            },
        );
    }

    /// Fresh value for `key`; an expired entry is dropped
    pub fn get(&mut self, key: &str, now_ms: f64) -> Option<V> {
        let expired = self.entries.get(key)?.expires_at_ms < now_ms;
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_after_ttl() {
        let mut cache = ResponseCache::new(1000.0);
        cache.set("levels", 7, 0.0);
        assert_eq!(cache.get("levels", 1000.0), Some(7));
        assert_eq!(cache.get("levels", 1000.5), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_custom_ttl_and_clear() {
        let mut cache = ResponseCache::default();
        cache.set_with_ttl("a", "x".to_string(), 0.0, 10.0);
        cache.set("b", "y".to_string(), 0.0);
        assert_eq!(cache.get("a", 20.0), None);
        assert_eq!(cache.get("b", 20.0).as_deref(), Some("y"));
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
