//! Session Store: pins a model to a session id for
//! response consistency across a conversation. Grounded on the same
//! TTL-keyed-map idiom as [`crate::routing::selector`]'s rate-limit
//! cooldowns and [`crate::payment::cache`]'s payment-parameter cache.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::routing::Tier;

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub model: String,
    pub tier: Tier,
    pub created_at: Instant,
    pub last_used_at: Instant,
    pub request_count: u64,
}

pub struct SessionStore {
    enabled: bool,
    header_name: String,
    timeout: Duration,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(enabled: bool, header_name: String, timeout: Duration) -> Self {
        Self { enabled, header_name, timeout, sessions: Mutex::new(HashMap::new()) }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// The pinned model+tier for `session_id`, if a live (non-idle-expired)
    /// entry exists. Does not itself advance `last_used_at` — callers that
    /// reuse a pin should follow up with [`touch_session`].
    pub fn get(&self, session_id: &str) -> Option<(String, Tier)> {
        let sessions = self.sessions.lock().expect("session store mutex poisoned");
        sessions
            .get(session_id)
            .filter(|entry| entry.last_used_at.elapsed() <= self.timeout)
            .map(|entry| (entry.model.clone(), entry.tier))
    }

    /// `setSession`: create or overwrite the pin for a session.
    pub fn set_session(&self, session_id: &str, model: String, tier: Tier) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        sessions.insert(
            session_id.to_string(),
            SessionEntry { model, tier, created_at: now, last_used_at: now, request_count: 1 },
        );
    }

    /// `touchSession`: advance `last_used_at` and bump the
    /// request counter for an existing session.
    pub fn touch_session(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_used_at = Instant::now();
            entry.request_count += 1;
        }
    }

    /// Periodic background sweep: evict sessions idle longer than the
    /// configured timeout.
    pub fn sweep_idle(&self) {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        sessions.retain(|_, entry| entry.last_used_at.elapsed() <= self.timeout);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The interval between background idle sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_returns_pinned_model() {
        let store = SessionStore::new(true, "x-session-id".into(), Duration::from_secs(1800));
        store.set_session("s1", "anthropic/claude-opus-4.6".into(), Tier::Complex);
        let (model, tier) = store.get("s1").unwrap();
        assert_eq!(model, "anthropic/claude-opus-4.6");
        assert_eq!(tier, Tier::Complex);
    }

    #[test]
    fn touch_advances_last_used_and_count() {
        let store = SessionStore::new(true, "x-session-id".into(), Duration::from_secs(1800));
        store.set_session("s1", "m".into(), Tier::Simple);
        store.touch_session("s1");
        let sessions = store.sessions.lock().unwrap();
        assert_eq!(sessions.get("s1").unwrap().request_count, 2);
    }

    #[test]
    fn idle_session_is_not_returned() {
        let store = SessionStore::new(true, "x-session-id".into(), Duration::from_millis(5));
        store.set_session("s1", "m".into(), Tier::Simple);
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.get("s1").is_none());
    }

    #[test]
    fn sweep_removes_idle_entries() {
        let store = SessionStore::new(true, "x-session-id".into(), Duration::from_millis(5));
        store.set_session("s1", "m".into(), Tier::Simple);
        std::thread::sleep(Duration::from_millis(20));
        store.sweep_idle();
        assert!(store.is_empty());
    }
}
