//! Proxy Core: the HTTP surface and the orchestration that ties every
//! other component into the chat-completion lifecycle.

pub mod degraded;
pub mod normalize;
pub mod pipeline;
pub mod sse;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Json};
use axum::routing::{any, get, post};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::balance::BalanceMonitor;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::dedup::RequestDeduplicator;
use crate::payment::PaymentFetch;
use crate::routing::{self, Selector};
use crate::session::SessionStore;

/// Shared state behind every handler; one instance per process, built once
/// in `main` and handed to the router as `Arc<AppState>`.
pub struct AppState {
    pub config: Config,
    pub selector: Selector,
    pub payment_fetch: PaymentFetch,
    pub balance: BalanceMonitor,
    pub dedup: RequestDeduplicator,
    pub cache: ResponseCache,
    pub sessions: SessionStore,
    pub wallet_address: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cache", get(cache_stats))
        .route("/stats", get(stats))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/{*rest}", any(v1_catch_all))
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

#[derive(Deserialize, Default)]
struct HealthQuery {
    #[serde(default)]
    full: bool,
}

async fn health(State(state): State<Arc<AppState>>, Query(q): Query<HealthQuery>) -> impl IntoResponse {
    let mut body = json!({
        "status": "ok",
        "wallet": state.wallet_address,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    if q.full {
        match state.balance.check_balance().await {
            Ok(info) => {
                body["balance"] = json!({
                    "balanceUsd": info.balance_usd.to_string(),
                    "isLow": info.is_low,
                    "isEmpty": info.is_empty,
                });
            }
            Err(e) => {
                warn!(error = %e, "balance probe failed for /health?full=true");
                body["balanceError"] = json!(e.to_string());
            }
        }
        body["sessions"] = json!(state.sessions.len());
    }
    Json(body)
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.cache.get_stats())
}

#[derive(Deserialize, Default)]
struct StatsQuery {
    days: Option<u32>,
}

/// Usage-log aggregation lives outside this crate; this endpoint only
/// returns the shape the `stats` CLI subcommand expects.
async fn stats(Query(q): Query<StatsQuery>) -> impl IntoResponse {
    Json(json!({"days": q.days.unwrap_or(7), "requests": 0, "totalCostUsd": "0.00"}))
}

async fn list_models() -> impl IntoResponse {
    let data: Vec<_> = routing::catalog::MODEL_CATALOG
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "name": m.name,
                "inputPricePerMillion": m.input_price_per_million.to_string(),
                "outputPricePerMillion": m.output_price_per_million.to_string(),
                "contextWindow": m.context_window,
                "maxOutput": m.max_output,
                "reasoning": m.capabilities.reasoning,
                "vision": m.capabilities.vision,
                "agentic": m.capabilities.agentic,
            })
        })
        .collect();
    Json(json!({"object": "list", "data": data}))
}

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> axum::response::Response {
    pipeline::handle_chat_completion(&state, "/v1/chat/completions", &headers, &body).await
}

async fn v1_catch_all(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> axum::response::Response {
    let path = uri.path();
    if path.starts_with("/v1/x/") || path.starts_with("/v1/partner/") {
        pipeline::passthrough(&state, path, &body).await
    } else {
        pipeline::handle_chat_completion(&state, path, &headers, &body).await
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": {"type": "proxy_error", "message": "not found"}})))
}

/// Bind `127.0.0.1:port`, retrying on `EADDRINUSE`: probe the occupant's
/// `/health`, and if it's our own service, adopt it (log its wallet and
/// return without starting a second listener) rather than error.
async fn bind_with_retry(addr: SocketAddr) -> anyhow::Result<Option<TcpListener>> {
    const MAX_RETRIES: usize = 5;
    for attempt in 0..=MAX_RETRIES {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(Some(listener)),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                if let Some(existing) = probe_existing_service(addr).await {
                    info!(%addr, wallet = ?existing.get("wallet"), "an existing tollgate instance already owns this port, adopting it");
                    return Ok(None);
                }
                if attempt == MAX_RETRIES {
                    return Err(e.into());
                }
                warn!(%addr, attempt, "address in use, retrying in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
    unreachable!()
}

async fn probe_existing_service(addr: SocketAddr) -> Option<serde_json::Value> {
    let url = format!("http://{addr}/health");
    let client = reqwest::Client::builder().timeout(Duration::from_millis(500)).build().ok()?;
    let resp = client.get(&url).send().await.ok()?;
    let value: serde_json::Value = resp.json().await.ok()?;
    (value.get("status").and_then(|s| s.as_str()) == Some("ok")).then_some(value)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Bind and serve, or return immediately if an existing instance already
/// owns the configured port.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let port = state.config.server.port;
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();

    let Some(listener) = bind_with_retry(addr).await? else {
        return Ok(());
    };
    info!(%addr, wallet = %state.wallet_address, "tollgate proxy listening");

    let router = build_router(state.clone());
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
    state.dedup.fail_all_inflight();
    info!("tollgate proxy shut down");
    Ok(())
}
