//! End-to-end tests driving the full proxy over a real TCP listener against
//! a `wiremock` stand-in for the upstream aggregator: fallback past a
//! billing error, and coalescing of concurrent identical requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::json;
use tollgate::balance::{BalanceMonitor, ErcClient, RpcError};
use tollgate::cache::ResponseCache;
use tollgate::config::Config;
use tollgate::dedup::RequestDeduplicator;
use tollgate::payment::{LocalSigner, PaymentCache, PaymentFetch, Signer};
use tollgate::proxy::{self, AppState};
use tollgate::routing::Selector;
use tollgate::session::SessionStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

/// Always reports a comfortably high balance so the balance gate never
/// downgrades a test request to the free model.
struct FlushClient;

#[async_trait]
impl ErcClient for FlushClient {
    async fn balance_of(&self, _token: &str, _wallet: &str) -> Result<u128, RpcError> {
        Ok(1_000_000_000)
    }
}

/// Boots a real listener on an ephemeral port wired against `upstream_uri`
/// and returns the base URL new requests should hit.
async fn spawn_proxy(upstream_uri: &str) -> String {
    let mut config = Config::default();
    config.server.upstream_base_url = upstream_uri.to_string();

    let signer: Arc<dyn Signer> =
        Arc::new(LocalSigner::from_private_key(&SecretString::from(TEST_KEY)).unwrap());
    let wallet_address = signer.address();
    let payment_cache = Arc::new(PaymentCache::new(Duration::from_secs(config.payment.cache_ttl_secs)));
    let payment_fetch = PaymentFetch::new(reqwest::Client::new(), signer, payment_cache);
    let balance = BalanceMonitor::new(
        Box::new(FlushClient),
        "0xusdc".to_string(),
        wallet_address.clone(),
        Duration::from_secs(config.balance.cache_ttl_secs),
    );
    let sessions = SessionStore::new(config.session.enabled, config.session.header_name.clone(), Duration::from_millis(config.session.timeout_ms));

    let state = Arc::new(AppState {
        selector: Selector::new(),
        dedup: RequestDeduplicator::new(Duration::from_secs(config.dedup.completed_ttl_secs)),
        cache: ResponseCache::new(config.cache.enabled, config.cache.max_size, config.cache.max_item_size_bytes, Duration::from_secs(config.cache.default_ttl_secs)),
        payment_fetch,
        balance,
        sessions,
        wallet_address,
        config,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = proxy::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{addr}")
}

/// A primary candidate returns a billing error; the next candidate in the
/// SIMPLE fallback chain succeeds — exactly two upstream calls, and the
/// response reflects the fallback model's answer.
#[tokio::test]
async fn fallback_advances_past_a_billing_error() {
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "API provider returned a billing error for this account"}
        })))
        .up_to_n_times(1)
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Paris is the capital of France."}}]
        })))
        .mount(&upstream)
        .await;

    let base = spawn_proxy(&upstream.uri()).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/v1/chat/completions"))
        .json(&json!({
            "model": "blockrun/auto",
            "messages": [{"role": "user", "content": "What is the capital of France?"}],
            "max_tokens": 40
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["choices"][0]["message"]["content"].as_str().unwrap().contains("Paris"));
    assert_eq!(upstream.received_requests().await.unwrap().len(), 2);
}

/// Two requests with identical (post-canonicalization) bodies arriving
/// concurrently are coalesced into a single upstream call.
#[tokio::test]
async fn concurrent_identical_requests_are_deduplicated() {
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"message": {"role": "assistant", "content": "4"}}]}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&upstream)
        .await;

    let base = spawn_proxy(&upstream.uri()).await;
    let client = reqwest::Client::new();
    let body = json!({
        "model": "blockrun/auto",
        "messages": [{"role": "user", "content": "What is 2+2?"}],
        "max_tokens": 10
    });

    let (first, second) = tokio::join!(
        client.post(format!("{base}/v1/chat/completions")).json(&body).send(),
        client.post(format!("{base}/v1/chat/completions")).json(&body).send(),
    );

    assert_eq!(first.unwrap().status(), 200);
    assert_eq!(second.unwrap().status(), 200);
    assert_eq!(upstream.received_requests().await.unwrap().len(), 1);
}
