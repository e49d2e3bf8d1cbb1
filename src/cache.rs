use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// In-process cache for expensive list responses.
///
/// The handle lives in application state and write paths call `invalidate`
/// explicitly after a successful commit. Entries also expire on their own
/// after `ttl`.
#[derive(Clone)]
pub struct ListCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

struct CacheEntry {
    value: serde_json::Value,
    stored_at: Instant,
}

impl ListCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn set(&self, key: String, value: serde_json::Value) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                key,
                CacheEntry {
                    value,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    /// Drops every entry whose key starts with `prefix`. Product writes use
    /// this to clear all per-user product list entries at once.
    pub fn invalidate(&self, prefix: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|key, _| !key.starts_with(prefix));
        }
    }
}

pub fn product_list_key(user_id: uuid::Uuid) -> String {
    format!("product_list:{user_id}")
}

pub const PRODUCT_LIST_PREFIX: &str = "product_list:";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get_round_trips() {
        let cache = ListCache::new(Duration::from_secs(60));
        cache.set("product_list:abc".into(), json!([{"id": 1}]));
        assert_eq!(cache.get("product_list:abc"), Some(json!([{"id": 1}])));
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = ListCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("product_list:missing"), None);
    }

    #[test]
    fn invalidate_clears_matching_prefix_only() {
        let cache = ListCache::new(Duration::from_secs(60));
        cache.set("product_list:a".into(), json!(1));
        cache.set("product_list:b".into(), json!(2));
        cache.set("sales_summary".into(), json!(3));

        cache.invalidate(PRODUCT_LIST_PREFIX);

        assert_eq!(cache.get("product_list:a"), None);
        assert_eq!(cache.get("product_list:b"), None);
        assert_eq!(cache.get("sales_summary"), Some(json!(3)));
    }

    #[test]
    fn expired_entries_are_misses() {
        let cache = ListCache::new(Duration::from_millis(0));
        cache.set("product_list:a".into(), json!(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("product_list:a"), None);
    }
}
