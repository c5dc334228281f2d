//! Request Deduplicator: coalesces concurrently in-flight duplicate
//! requests onto a single origin call and serves a just-completed
//! duplicate from a 30-second cache. The registration map is a plain
//! `std::sync::Mutex` held only synchronously, never across an `.await`;
//! waiters subscribe to a `tokio::sync::broadcast` channel per key.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;

use crate::error::ProxyError;
use crate::payment::fetch::FetchResponse;

const DEDUP_KEY_HEX_LEN: usize = 16;
const MAX_ITEM_SIZE_BYTES: usize = 1024 * 1024;
const INFLIGHT_CHANNEL_CAPACITY: usize = 32;

/// What an in-flight waiter eventually receives: the origin's response, or
/// a stand-in error if the origin failed.
pub type InflightResult = Result<FetchResponse, String>;

struct CompletedEntry {
    response: FetchResponse,
    completed_at: Instant,
}

pub struct RequestDeduplicator {
    completed_ttl: Duration,
    completed: Mutex<HashMap<String, CompletedEntry>>,
    inflight: Mutex<HashMap<String, broadcast::Sender<InflightResult>>>,
}

impl RequestDeduplicator {
    pub fn new(completed_ttl: Duration) -> Self {
        Self {
            completed_ttl,
            completed: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// The dedup key for a request body: first 16 hex chars of SHA-256
    /// over its canonicalized form.
    pub fn key_for(body: &[u8]) -> String {
        let canonical = canonicalize(body);
        let digest = Sha256::digest(&canonical);
        format!("{:x}", digest)[..DEDUP_KEY_HEX_LEN].to_string()
    }

    /// `getCached(key)`: the most-recent completed response if
    /// still fresh; expired entries are pruned on read.
    pub fn get_cached(&self, key: &str) -> Option<FetchResponse> {
        let mut completed = self.completed.lock().expect("dedup completed mutex poisoned");
        match completed.get(key) {
            Some(entry) if entry.completed_at.elapsed() <= self.completed_ttl => {
                Some(entry.response.clone())
            }
            Some(_) => {
                completed.remove(key);
                None
            }
            None => None,
        }
    }

    /// `getInflight(key)`: subscribe to the origin's eventual
    /// result if one is currently in flight.
    pub fn get_inflight(&self, key: &str) -> Option<broadcast::Receiver<InflightResult>> {
        let inflight = self.inflight.lock().expect("dedup inflight mutex poisoned");
        inflight.get(key).map(|tx| tx.subscribe())
    }

    /// `markInflight(key)`: register this key as in flight.
    /// Returns `false` if another caller already registered it first — the
    /// caller should fall back to `get_inflight` in that case.
    pub fn mark_inflight(&self, key: &str) -> bool {
        let mut inflight = self.inflight.lock().expect("dedup inflight mutex poisoned");
        if inflight.contains_key(key) {
            return false;
        }
        let (tx, _rx) = broadcast::channel(INFLIGHT_CHANNEL_CAPACITY);
        inflight.insert(key.to_string(), tx);
        true
    }

    /// `complete(key, result)`: cache the response if it's
    /// under the max item size, wake every waiter, and drop the in-flight
    /// registration.
    pub fn complete(&self, key: &str, response: FetchResponse) {
        if response.body.len() <= MAX_ITEM_SIZE_BYTES {
            let mut completed = self.completed.lock().expect("dedup completed mutex poisoned");
            self.prune_locked(&mut completed);
            completed.insert(
                key.to_string(),
                CompletedEntry { response: response.clone(), completed_at: Instant::now() },
            );
        }
        if let Some(tx) = self.inflight.lock().expect("dedup inflight mutex poisoned").remove(key) {
            let _ = tx.send(Ok(response));
        }
    }

    /// `removeInflight(key)`: on origin error, wake waiters
    /// with a `dedup_origin_failed` 503 and drop the registration.
    pub fn remove_inflight(&self, key: &str) {
        if let Some(tx) = self.inflight.lock().expect("dedup inflight mutex poisoned").remove(key) {
            let body = ProxyError::DedupOriginFailed.to_json();
            let _ = tx.send(Err(body.to_string()));
        }
    }

    /// Graceful-shutdown hook: fail every still-pending resolver with a
    /// 503 so no waiter is left hanging once the listener closes.
    pub fn fail_all_inflight(&self) {
        let mut inflight = self.inflight.lock().expect("dedup inflight mutex poisoned");
        let body = ProxyError::Internal("server is shutting down".to_string()).to_json();
        for (_, tx) in inflight.drain() {
            let _ = tx.send(Err(body.to_string()));
        }
    }

    fn prune_locked(&self, completed: &mut HashMap<String, CompletedEntry>) {
        let ttl = self.completed_ttl;
        completed.retain(|_, entry| entry.completed_at.elapsed() <= ttl);
    }
}

/// Canonicalize a request body for dedup-key hashing: parse as
/// JSON when possible, strip a leading `[Www YYYY-MM-DD HH:MM TZ] ` marker
/// from every string found under a `content` key, recursively sort object
/// keys, and re-serialize. Falls back to the raw bytes if parsing fails.
pub fn canonicalize(body: &[u8]) -> Vec<u8> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => {
            let stripped = strip_content_timestamps(value);
            serde_json::to_vec(&sorted(&stripped)).unwrap_or_else(|_| body.to_vec())
        }
        Err(_) => body.to_vec(),
    }
}

fn strip_content_timestamps(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = if k == "content" {
                        strip_timestamp_strings(v)
                    } else {
                        strip_content_timestamps(v)
                    };
                    (k, v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_content_timestamps).collect()),
        other => other,
    }
}

fn strip_timestamp_strings(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_timestamp_prefix(&s).to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_timestamp_strings).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(k, v)| (k, strip_timestamp_strings(v))).collect(),
        ),
        other => other,
    }
}

/// Strip a leading `[Www YYYY-MM-DD HH:MM TZ] ` marker, e.g.
/// `[Mon 2026-07-28 09:14 UTC] hello` -> `hello`.
fn strip_timestamp_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'[') {
        return s;
    }
    match s.find("] ") {
        Some(end) => {
            let candidate = &s[1..end];
            if looks_like_timestamp(candidate) { &s[end + 2..] } else { s }
        }
        None => s,
    }
}

fn looks_like_timestamp(candidate: &str) -> bool {
    let parts: Vec<&str> = candidate.split(' ').collect();
    parts.len() == 3
        && parts[0].len() == 3
        && parts[1].len() == 10
        && parts[1].as_bytes().get(4) == Some(&b'-')
        && parts[1].as_bytes().get(7) == Some(&b'-')
        && parts[2].chars().all(|c| c.is_ascii_alphabetic())
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, Value)> =
                map.iter().map(|(k, v)| (k, sorted(v))).collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn response(body: &str) -> FetchResponse {
        FetchResponse { status: 200, headers: HeaderMap::new(), body: bytes::Bytes::from(body.to_string()) }
    }

    #[test]
    fn canonicalization_strips_leading_timestamp_under_content() {
        let body = br#"{"messages":[{"role":"user","content":"[Mon 2026-07-28 09:14 UTC] hi"}]}"#;
        let canonical = String::from_utf8(canonicalize(body)).unwrap();
        assert!(canonical.contains("\"hi\""));
        assert!(!canonical.contains("2026-07-28"));
    }

    #[test]
    fn canonicalization_sorts_object_keys() {
        let a = canonicalize(br#"{"b":1,"a":2}"#);
        let b = canonicalize(br#"{"a":2,"b":1}"#);
        assert_eq!(a, b);
    }

    #[test]
    fn canonicalization_falls_back_to_raw_bytes_on_invalid_json() {
        let raw = b"not json at all";
        assert_eq!(canonicalize(raw), raw.to_vec());
    }

    #[test]
    fn key_for_is_deterministic_and_16_hex_chars() {
        let body = br#"{"a":1}"#;
        let k1 = RequestDeduplicator::key_for(body);
        let k2 = RequestDeduplicator::key_for(body);
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 16);
    }

    #[test]
    fn fresh_completed_entry_is_served_and_expired_is_pruned() {
        let dedup = RequestDeduplicator::new(Duration::from_millis(5));
        dedup.complete("k1", response("hello"));
        assert!(dedup.get_cached("k1").is_some());
        std::thread::sleep(Duration::from_millis(20));
        assert!(dedup.get_cached("k1").is_none());
    }

    #[test]
    fn mark_inflight_rejects_second_registration() {
        let dedup = RequestDeduplicator::new(Duration::from_secs(30));
        assert!(dedup.mark_inflight("k1"));
        assert!(!dedup.mark_inflight("k1"));
    }

    #[tokio::test]
    async fn complete_wakes_inflight_waiters() {
        let dedup = RequestDeduplicator::new(Duration::from_secs(30));
        dedup.mark_inflight("k1");
        let mut rx = dedup.get_inflight("k1").unwrap();
        dedup.complete("k1", response("done"));
        let result = rx.recv().await.unwrap();
        assert!(result.is_ok());
        assert!(dedup.get_inflight("k1").is_none());
    }

    #[tokio::test]
    async fn remove_inflight_wakes_waiters_with_dedup_error() {
        let dedup = RequestDeduplicator::new(Duration::from_secs(30));
        dedup.mark_inflight("k1");
        let mut rx = dedup.get_inflight("k1").unwrap();
        dedup.remove_inflight("k1");
        let result = rx.recv().await.unwrap();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("dedup_origin_failed"));
    }

    #[tokio::test]
    async fn fail_all_inflight_wakes_every_pending_waiter() {
        let dedup = RequestDeduplicator::new(Duration::from_secs(30));
        dedup.mark_inflight("k1");
        dedup.mark_inflight("k2");
        let mut rx1 = dedup.get_inflight("k1").unwrap();
        let mut rx2 = dedup.get_inflight("k2").unwrap();
        dedup.fail_all_inflight();
        assert!(rx1.recv().await.unwrap().is_err());
        assert!(rx2.recv().await.unwrap().is_err());
        assert!(dedup.get_inflight("k1").is_none());
    }
}
