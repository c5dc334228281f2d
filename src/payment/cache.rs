//! Payment Cache: per-endpoint cache of accepted payment parameters with a
//! 1-hour TTL. The lock is a plain `std::sync::Mutex` held only
//! synchronously, never across an `.await`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::CachedPaymentParams;

pub struct PaymentCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedPaymentParams>>,
}

impl PaymentCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Return the cached parameters for `endpoint_path` if present and not
    /// older than the TTL; expired entries are evicted on read.
    pub fn get(&self, endpoint_path: &str) -> Option<CachedPaymentParams> {
        let mut entries = self.entries.lock().expect("payment cache mutex poisoned");
        match entries.get(endpoint_path) {
            Some(params) if params.cached_at.elapsed() <= self.ttl => {
                Some(clone_params(params))
            }
            Some(_) => {
                entries.remove(endpoint_path);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, endpoint_path: &str, params: CachedPaymentParams) {
        let mut entries = self.entries.lock().expect("payment cache mutex poisoned");
        entries.insert(endpoint_path.to_string(), params);
    }

    pub fn invalidate(&self, endpoint_path: &str) {
        let mut entries = self.entries.lock().expect("payment cache mutex poisoned");
        entries.remove(endpoint_path);
    }
}

fn clone_params(p: &CachedPaymentParams) -> CachedPaymentParams {
    CachedPaymentParams {
        pay_to: p.pay_to.clone(),
        asset: p.asset.clone(),
        scheme: p.scheme.clone(),
        network: p.network.clone(),
        domain_name: p.domain_name.clone(),
        domain_version: p.domain_version.clone(),
        max_timeout_seconds: p.max_timeout_seconds,
        resource: p.resource.clone(),
        cached_at: p.cached_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::ResourceDescriptor;

    fn sample() -> CachedPaymentParams {
        CachedPaymentParams {
            pay_to: "0xabc".into(),
            asset: "0xdef".into(),
            scheme: "exact".into(),
            network: "base".into(),
            domain_name: None,
            domain_version: None,
            max_timeout_seconds: Some(300),
            resource: Some(ResourceDescriptor {
                url: "https://example.com".into(),
                description: "".into(),
                mime_type: None,
            }),
            cached_at: Instant::now(),
        }
    }

    #[test]
    fn fresh_entry_is_returned() {
        let cache = PaymentCache::new(Duration::from_secs(3600));
        cache.set("/v1/chat/completions", sample());
        assert!(cache.get("/v1/chat/completions").is_some());
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = PaymentCache::new(Duration::from_millis(1));
        cache.set("/v1/chat/completions", sample());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("/v1/chat/completions").is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = PaymentCache::new(Duration::from_secs(3600));
        cache.set("/v1/chat/completions", sample());
        cache.invalidate("/v1/chat/completions");
        assert!(cache.get("/v1/chat/completions").is_none());
    }
}
