//! Response Cache: a keyed TTL cache of non-streaming completions
//! (`CacheEntry` with `hit_count`/`last_accessed`, SHA-256 `cache_key`,
//! eviction by earliest expiry via `min_by_key(expires_at)`), caching full
//! JSON response bodies under a normalized key.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::payment::fetch::FetchResponse;

const CACHE_KEY_HEX_LEN: usize = 32;
const STRIPPED_TOP_LEVEL_FIELDS: &[&str] = &["stream", "user", "request_id", "x-request-id"];

struct CacheEntry {
    response: FetchResponse,
    model: Option<String>,
    cached_at: Instant,
    expires_at: Instant,
    last_accessed: Instant,
    hit_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub entries: usize,
    pub max_size: usize,
    pub total_hits: u64,
}

pub struct ResponseCache {
    enabled: bool,
    max_size: usize,
    max_item_size_bytes: usize,
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(enabled: bool, max_size: usize, max_item_size_bytes: usize, default_ttl: Duration) -> Self {
        Self { enabled, max_size, max_item_size_bytes, default_ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The cache key for a request body: first 32 hex chars of SHA-256 over
    /// a normalized JSON form.
    pub fn key_for(body: &[u8]) -> String {
        let normalized = normalize(body);
        let digest = Sha256::digest(&normalized);
        format!("{:x}", digest)[..CACHE_KEY_HEX_LEN].to_string()
    }

    /// `shouldCache(body, headers?)`: false if disabled, if the
    /// `cache-control` request header contains `no-cache`, or if the body
    /// carries `cache:false`/`no_cache:true` at its top level.
    pub fn should_cache(&self, body: &[u8], request_headers: Option<&HeaderMap>) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(headers) = request_headers {
            if headers
                .get("cache-control")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("no-cache"))
            {
                return false;
            }
        }
        if let Ok(Value::Object(obj)) = serde_json::from_slice::<Value>(body) {
            if obj.get("cache") == Some(&Value::Bool(false)) {
                return false;
            }
            if obj.get("no_cache") == Some(&Value::Bool(true)) {
                return false;
            }
        }
        true
    }

    /// `get(key)`: return the entry if present and unexpired;
    /// update hit/access bookkeeping.
    pub fn get(&self, key: &str) -> Option<FetchResponse> {
        let mut entries = self.entries.lock().expect("response cache mutex poisoned");
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.hit_count += 1;
                entry.last_accessed = now;
                Some(entry.response.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// `set(key, response, ttlSec?)`: refuse if disabled, if
    /// the body exceeds the max item size, or if the status is >= 400;
    /// evict as needed to stay under capacity.
    pub fn set(&self, key: &str, response: FetchResponse, model: Option<String>, ttl: Option<Duration>) {
        if !self.enabled || response.status >= 400 || response.body.len() > self.max_item_size_bytes {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("response cache mutex poisoned");
        self.evict_locked(&mut entries);
        entries.insert(
            key.to_string(),
            CacheEntry {
                response,
                model,
                cached_at: now,
                expires_at: now + ttl.unwrap_or(self.default_ttl),
                last_accessed: now,
                hit_count: 0,
            },
        );
    }

    /// `evict()`: drop already-expired entries first, then the
    /// earliest-expiring entries until under capacity.
    fn evict_locked(&self, entries: &mut HashMap<String, CacheEntry>) {
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        while entries.len() >= self.max_size {
            let oldest = entries.iter().min_by_key(|(_, e)| e.expires_at).map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                }
                None => break,
            }
        }
    }

    pub fn clear(&self) {
        self.entries.lock().expect("response cache mutex poisoned").clear();
    }

    pub fn get_stats(&self) -> CacheStats {
        let entries = self.entries.lock().expect("response cache mutex poisoned");
        CacheStats {
            enabled: self.enabled,
            entries: entries.len(),
            max_size: self.max_size,
            total_hits: entries.values().map(|e| e.hit_count).sum(),
        }
    }
}

/// Normalize a request body for cache-key hashing: strip the
/// non-semantic top-level fields, strip leading timestamps on message
/// `content` (same rule as [`crate::dedup`]), sort object keys, re-serialize.
fn normalize(body: &[u8]) -> Vec<u8> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(mut obj)) => {
            for field in STRIPPED_TOP_LEVEL_FIELDS {
                obj.remove(*field);
            }
            let stripped = crate::dedup::canonicalize(&serde_json::to_vec(&Value::Object(obj)).unwrap_or_default());
            stripped
        }
        Ok(other) => crate::dedup::canonicalize(&serde_json::to_vec(&other).unwrap_or_default()),
        Err(_) => body.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> FetchResponse {
        FetchResponse { status, headers: HeaderMap::new(), body: bytes::Bytes::from(body.to_string()) }
    }

    #[test]
    fn key_ignores_stream_and_user_fields() {
        let a = ResponseCache::key_for(br#"{"model":"m","stream":true,"messages":[]}"#);
        let b = ResponseCache::key_for(br#"{"model":"m","stream":false,"user":"u1","messages":[]}"#);
        assert_eq!(a, b);
    }

    #[test]
    fn should_cache_false_when_disabled() {
        let cache = ResponseCache::new(false, 10, 1024, Duration::from_secs(60));
        assert!(!cache.should_cache(b"{}", None));
    }

    #[test]
    fn should_cache_respects_no_cache_flag_in_body() {
        let cache = ResponseCache::new(true, 10, 1024, Duration::from_secs(60));
        assert!(!cache.should_cache(br#"{"no_cache":true}"#, None));
        assert!(!cache.should_cache(br#"{"cache":false}"#, None));
        assert!(cache.should_cache(br#"{"cache":true}"#, None));
    }

    #[test]
    fn set_refuses_error_responses() {
        let cache = ResponseCache::new(true, 10, 1024, Duration::from_secs(60));
        cache.set("k1", response(500, "err"), None, None);
        assert!(cache.get("k1").is_none());
    }

    #[test]
    fn set_refuses_oversized_body() {
        let cache = ResponseCache::new(true, 10, 4, Duration::from_secs(60));
        cache.set("k1", response(200, "way too big"), None, None);
        assert!(cache.get("k1").is_none());
    }

    #[test]
    fn get_returns_fresh_entry_and_counts_hits() {
        let cache = ResponseCache::new(true, 10, 1024, Duration::from_secs(60));
        cache.set("k1", response(200, "ok"), Some("m".into()), None);
        assert!(cache.get("k1").is_some());
        assert!(cache.get("k1").is_some());
        assert_eq!(cache.get_stats().total_hits, 2);
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = ResponseCache::new(true, 10, 1024, Duration::from_millis(1));
        cache.set("k1", response(200, "ok"), None, None);
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("k1").is_none());
    }

    #[test]
    fn eviction_drops_earliest_expiring_entry_when_over_capacity() {
        let cache = ResponseCache::new(true, 2, 1024, Duration::from_secs(60));
        cache.set("k1", response(200, "a"), None, Some(Duration::from_secs(1)));
        cache.set("k2", response(200, "b"), None, Some(Duration::from_secs(60)));
        cache.set("k3", response(200, "c"), None, Some(Duration::from_secs(60)));
        assert_eq!(cache.get_stats().entries, 2);
        assert!(cache.get("k1").is_none());
    }

    #[test]
    fn clear_empties_cache() {
        let cache = ResponseCache::new(true, 10, 1024, Duration::from_secs(60));
        cache.set("k1", response(200, "a"), None, None);
        cache.clear();
        assert_eq!(cache.get_stats().entries, 0);
    }
}
