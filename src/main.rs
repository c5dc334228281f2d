//! Binary entry point. Deliberately thin: load configuration, build the
//! shared `AppState` (one instance of every component behind a single
//! `Arc`), install tracing, and hand off to `proxy::serve`.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tollgate::balance::{BalanceMonitor, JsonRpcErcClient};
use tollgate::cache::ResponseCache;
use tollgate::config::Config;
use tollgate::dedup::RequestDeduplicator;
use tollgate::payment::{LocalSigner, PaymentCache, PaymentFetch, Signer};
use tollgate::proxy::{self, AppState};
use tollgate::routing::Selector;
use tollgate::session::SessionStore;

/// Base USDC.
const DEFAULT_USDC_ADDRESS: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "tollgate failed to start");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .json()
        .init();

    let config = Config::load()?;

    let private_key = SecretString::from(
        std::env::var("TOLLGATE_PRIVATE_KEY")
            .map_err(|_| anyhow::anyhow!("TOLLGATE_PRIVATE_KEY must be set to the wallet's hex-encoded private key"))?,
    );
    let signer: Arc<dyn Signer> = Arc::new(LocalSigner::from_private_key(&private_key)?);
    let wallet_address = signer.address();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.attempt_timeout_secs))
        .build()?;

    let payment_cache = Arc::new(PaymentCache::new(Duration::from_secs(config.payment.cache_ttl_secs)));
    let payment_fetch = PaymentFetch::new(http.clone(), signer, payment_cache);

    let rpc_url = std::env::var("TOLLGATE_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());
    let usdc_address = std::env::var("TOLLGATE_USDC_ADDRESS").unwrap_or_else(|_| DEFAULT_USDC_ADDRESS.to_string());
    let erc_client = Box::new(JsonRpcErcClient::new(http.clone(), rpc_url));
    let balance = BalanceMonitor::new(
        erc_client,
        usdc_address,
        wallet_address.clone(),
        Duration::from_secs(config.balance.cache_ttl_secs),
    );

    let session_timeout = Duration::from_millis(config.session.timeout_ms);
    let sessions = SessionStore::new(config.session.enabled, config.session.header_name.clone(), session_timeout);

    let state = Arc::new(AppState {
        selector: Selector::new(),
        dedup: RequestDeduplicator::new(Duration::from_secs(config.dedup.completed_ttl_secs)),
        cache: ResponseCache::new(
            config.cache.enabled,
            config.cache.max_size,
            config.cache.max_item_size_bytes,
            Duration::from_secs(config.cache.default_ttl_secs),
        ),
        payment_fetch,
        balance,
        sessions,
        wallet_address,
        config,
    });

    // Session pins idle out on their own read path; the periodic sweep only
    // reclaims memory for sessions nobody ever looks up again. Holding a
    // Weak clone keeps this task from pinning the process alive past
    // shutdown.
    let sweep_state = Arc::downgrade(&state);
    let sweep_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tollgate::session::SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let Some(state) = sweep_state.upgrade() else { break };
            state.sessions.sweep_idle();
        }
    });

    let result = proxy::serve(state).await;
    sweep_handle.abort();
    result
}
