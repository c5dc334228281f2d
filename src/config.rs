//! Layered configuration: [`Config::default`] → an optional TOML file →
//! a short list of environment variables. Every field carries a
//! `#[serde(default = "...")]` so a partially-specified file still loads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::routing::Tier;

fn default_port() -> u16 {
    8402
}
fn default_upstream_base_url() -> String {
    "https://api.blockrun.ai".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,
    /// Wall-clock timeout for a single upstream attempt, in seconds.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    /// Socket-level read timeout, in seconds.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

fn default_attempt_timeout_secs() -> u64 {
    180
}
fn default_read_timeout_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream_base_url: default_upstream_base_url(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    #[serde(default)]
    pub profile: crate::routing::RoutingProfile,
    #[serde(default = "default_agentic_threshold")]
    pub agentic_threshold: f64,
    #[serde(default)]
    pub agentic_mode: bool,
    #[serde(default = "default_ambiguous_tier")]
    pub ambiguous_default_tier: Tier,
    #[serde(default = "default_large_request_threshold")]
    pub max_tokens_force_complex: u64,
    #[serde(default = "default_structured_min_tier")]
    pub structured_output_min_tier: Tier,
    #[serde(default = "default_max_fallback")]
    pub max_fallback_attempts: usize,
    #[serde(default = "default_free_model")]
    pub free_model: String,
    #[serde(default = "default_true")]
    pub session_pinning: bool,
    #[serde(default = "default_steepness")]
    pub sigmoid_steepness: f64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_boundaries")]
    pub tier_boundaries: [f64; 3],
}

fn default_agentic_threshold() -> f64 {
    0.5
}
fn default_ambiguous_tier() -> Tier {
    Tier::Medium
}
fn default_large_request_threshold() -> u64 {
    100_000
}
fn default_structured_min_tier() -> Tier {
    Tier::Medium
}
fn default_max_fallback() -> usize {
    5
}
fn default_free_model() -> String {
    "nvidia/gpt-oss-120b".to_string()
}
fn default_steepness() -> f64 {
    12.0
}
fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_boundaries() -> [f64; 3] {
    [0.0, 0.3, 0.5]
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            profile: crate::routing::RoutingProfile::default(),
            agentic_threshold: default_agentic_threshold(),
            agentic_mode: false,
            ambiguous_default_tier: default_ambiguous_tier(),
            max_tokens_force_complex: default_large_request_threshold(),
            structured_output_min_tier: default_structured_min_tier(),
            max_fallback_attempts: default_max_fallback(),
            free_model: default_free_model(),
            session_pinning: true,
            sigmoid_steepness: default_steepness(),
            confidence_threshold: default_confidence_threshold(),
            tier_boundaries: default_boundaries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    #[serde(default = "default_payment_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,
    #[serde(default = "default_valid_after_skew_secs")]
    pub valid_after_skew_secs: i64,
}

fn default_payment_cache_ttl_secs() -> u64 {
    3600
}
fn default_max_timeout_secs() -> u64 {
    300
}
fn default_valid_after_skew_secs() -> i64 {
    600
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_payment_cache_ttl_secs(),
            max_timeout_secs: default_max_timeout_secs(),
            valid_after_skew_secs: default_valid_after_skew_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    #[serde(default = "default_balance_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_low_threshold")]
    pub low_threshold_usd: f64,
    #[serde(default = "default_zero_threshold")]
    pub zero_threshold_usd: f64,
}

fn default_balance_ttl_secs() -> u64 {
    30
}
fn default_low_threshold() -> f64 {
    1.00
}
fn default_zero_threshold() -> f64 {
    0.0001
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_balance_ttl_secs(),
            low_threshold_usd: default_low_threshold(),
            zero_threshold_usd: default_zero_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    #[serde(default = "default_dedup_ttl_secs")]
    pub completed_ttl_secs: u64,
    #[serde(default = "default_max_item_size")]
    pub max_item_size_bytes: usize,
}

fn default_dedup_ttl_secs() -> u64 {
    30
}
fn default_max_item_size() -> usize {
    1024 * 1024
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            completed_ttl_secs: default_dedup_ttl_secs(),
            max_item_size_bytes: default_max_item_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,
    #[serde(default = "default_max_item_size")]
    pub max_item_size_bytes: usize,
}

fn default_cache_max_size() -> usize {
    200
}
fn default_cache_ttl_secs() -> u64 {
    600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: default_cache_max_size(),
            default_ttl_secs: default_cache_ttl_secs(),
            max_item_size_bytes: default_max_item_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_session_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_session_header")]
    pub header_name: String,
}

fn default_session_timeout_ms() -> u64 {
    30 * 60 * 1000
}
fn default_session_header() -> String {
    "x-session-id".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: default_session_timeout_ms(),
            header_name: default_session_header(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradedResponseConfig {
    #[serde(default = "default_max_repeat")]
    pub max_repeat: usize,
    #[serde(default = "default_unique_ratio")]
    pub unique_ratio: f64,
    #[serde(default = "default_min_lines")]
    pub min_lines: usize,
}

fn default_max_repeat() -> usize {
    3
}
fn default_unique_ratio() -> f64 {
    0.45
}
fn default_min_lines() -> usize {
    8
}

impl Default for DegradedResponseConfig {
    fn default() -> Self {
        Self {
            max_repeat: default_max_repeat(),
            unique_ratio: default_unique_ratio(),
            min_lines: default_min_lines(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    #[serde(default = "default_false")]
    pub enabled: bool,
    #[serde(default = "default_compression_threshold")]
    pub threshold_bytes: usize,
}

fn default_compression_threshold() -> usize {
    180 * 1024
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_bytes: default_compression_threshold(),
        }
    }
}

/// Top-level proxy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub routing: RoutingConfig,
    pub payment: PaymentConfig,
    pub balance: BalanceConfig,
    pub dedup: DedupConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
    pub degraded: DegradedResponseConfig,
    pub compression: CompressionConfig,
}

impl Config {
    /// Default on-disk path: `$TOLLGATE_CONFIG`, else `./tollgate.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var("TOLLGATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("tollgate.toml"))
    }

    /// `~/.tollgate/tollgate.toml`, consulted when neither `$TOLLGATE_CONFIG`
    /// nor `./tollgate.toml` exists.
    fn home_path() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".tollgate").join("tollgate.toml")
    }

    /// Load `Default` layered over the config file at [`Config::default_path`]
    /// (falling back to [`Config::home_path`]) and then over environment
    /// variables. Never fails just because no file is present.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        let mut cfg = if path.exists() {
            Self::load_from(&path)?
        } else {
            let home = Self::home_path();
            if home.exists() { Self::load_from(&home)? } else { Self::default() }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&text)?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("TOLLGATE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(url) = std::env::var("TOLLGATE_UPSTREAM_BASE_URL") {
            self.server.upstream_base_url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_documented_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 8402);
        assert_eq!(cfg.payment.cache_ttl_secs, 3600);
        assert_eq!(cfg.balance.cache_ttl_secs, 30);
        assert_eq!(cfg.dedup.completed_ttl_secs, 30);
        assert_eq!(cfg.cache.default_ttl_secs, 600);
        assert_eq!(cfg.session.timeout_ms, 30 * 60 * 1000);
        assert_eq!(cfg.routing.max_tokens_force_complex, 100_000);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tollgate.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.cache.max_size, 200);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = Config::default();
        let text = toml::to_string(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(cfg.server.port, back.server.port);
    }
}
