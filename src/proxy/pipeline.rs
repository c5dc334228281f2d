//! The chat-completion lifecycle: model/profile
//! resolution, classification, the balance and dedup/cache gates, the
//! fallback loop, and streaming transcoding, all in one place since the
//! steps share request-scoped state end to end.

use std::sync::Arc;
use std::sync::LazyLock as Lazy;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, instrument, warn};

use crate::compress;
use crate::dedup::RequestDeduplicator;
use crate::error::ProxyError;
use crate::llm::ChatCompletionRequest;
use crate::payment::PaymentFetchError;
use crate::payment::fetch::FetchResponse;
use crate::routing::{self, RoutingDecision, RoutingMethod, RoutingProfile, Tier};

use super::AppState;
use super::{degraded, normalize, sse};

const CONTEXT_HEADER_USED: &str = "x-context-used-kb";
const CONTEXT_HEADER_LIMIT: &str = "x-context-limit-kb";
const MIN_ESTIMATED_COST_MICROS: u128 = 100;
const BALANCE_SAFETY_FACTOR: Decimal = dec!(1.5);
const DEFAULT_OUTPUT_TOKEN_ESTIMATE: u64 = 1024;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

static STRUCTURED_OUTPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)json|structured|schema").expect("static regex"));

struct Classification {
    tier: Tier,
    reasoning: String,
    confidence: f64,
    signals: Vec<String>,
    agentic: bool,
}

/// The entry point for `/v1/chat/completions` and any other `/v1/*` route
/// that isn't a `/v1/x/*` or `/v1/partner/*` passthrough.
#[instrument(skip(state, headers, raw_body), fields(path = %path, request_id = %uuid::Uuid::new_v4()))]
pub async fn handle_chat_completion(
    state: &Arc<AppState>,
    path: &str,
    headers: &HeaderMap,
    raw_body: &Bytes,
) -> Response {
    let mut request: ChatCompletionRequest = match serde_json::from_slice(raw_body) {
        Ok(r) => r,
        Err(e) => return ProxyError::BadRequest(format!("invalid JSON body: {e}")).into_response(),
    };
    if request.messages.is_empty() {
        return ProxyError::BadRequest("messages must not be empty".into()).into_response();
    }

    // Alias resolution vs. routing-profile-name detection. A profile name
    // is recognized before alias resolution would otherwise consume it
    // (e.g. "free" is also an alias target).
    let normalized = routing::catalog::normalize_model_name(&request.model);
    let profile = if routing::catalog::ROUTING_PROFILE_NAMES.contains(&normalized.as_str()) {
        normalized.parse::<RoutingProfile>().unwrap_or_default()
    } else {
        request.model = routing::resolve_alias(&request.model);
        RoutingProfile::default()
    };

    let want_stream = request.stream.unwrap_or(false);
    request.stream = Some(false); // upstream always sees a non-streaming call; we transcode below if needed

    // Free-profile shortcut.
    let free_shortcut = profile == RoutingProfile::Free;
    if free_shortcut {
        request.model = state.config.routing.free_model.clone();
    }

    // Session pin lookup.
    let session_id = if state.sessions.is_enabled() {
        headers.get(state.sessions.header_name()).and_then(|v| v.to_str().ok()).map(str::to_string)
    } else {
        None
    };
    let pinned = if !free_shortcut {
        session_id.as_deref().and_then(|sid| state.sessions.get(sid))
    } else {
        None
    };

    // Classification (skipped when pinned or on the free shortcut).
    let classification = if pinned.is_none() && !free_shortcut { Some(classify_request(state, &request)) } else { None };
    let tier = pinned.as_ref().map(|(_, tier)| *tier).or(classification.as_ref().map(|c| c.tier)).unwrap_or(Tier::Simple);
    let agentic = classification.as_ref().map(|c| c.agentic).unwrap_or(false);

    // Tier-table pick of the primary model, unless the session pin or the
    // free shortcut already decided it. Also assembles a routing-decision
    // record for observability when classification actually ran.
    let resolved_model = if let Some((model, _)) = &pinned {
        model.clone()
    } else if free_shortcut {
        request.model.clone()
    } else {
        let use_agentic_table = profile == RoutingProfile::Auto && agentic;
        let max_output_tokens = request.max_tokens.unwrap_or(DEFAULT_OUTPUT_TOKEN_ESTIMATE);
        let (model, cost) = state.selector.select_model(
            tier,
            profile,
            use_agentic_table,
            request.estimated_input_tokens(),
            max_output_tokens,
        );
        if let Some(c) = &classification {
            let decision = RoutingDecision {
                model_id: model.clone(),
                tier,
                confidence: c.confidence,
                method: RoutingMethod::Rules,
                agentic,
                profile,
                cost_estimate: cost,
                reasoning: c.reasoning.clone(),
                signals: c.signals.clone(),
                fallback_chain: state.selector.fallback_chain(tier, profile, use_agentic_table),
            };
            info!(
                model = %decision.model_id,
                tier = %decision.tier,
                confidence = decision.confidence,
                savings = decision.cost_estimate.savings_pct,
                signals = ?decision.signals,
                "routing decision"
            );
        }
        model
    };
    request.model = resolved_model.clone();

    if let Some(sid) = &session_id {
        if pinned.is_some() {
            state.sessions.touch_session(sid);
        } else if !free_shortcut {
            state.sessions.set_session(sid, resolved_model.clone(), tier);
        }
    }

    // Optional history compression.
    if state.config.compression.enabled {
        let (compressed, stats) = compress::compress_if_over_threshold(
            &request.messages,
            raw_body.len(),
            state.config.compression.threshold_bytes,
        );
        if stats.messages_after != stats.messages_before {
            info!(before = stats.messages_before, after = stats.messages_after, "compressed message history");
        }
        request.messages = compressed;
    }

    // Balance check, free-model downgrade on insufficient/empty funds.
    if !free_shortcut {
        if maybe_downgrade_for_balance(state, &mut request).await {
            info!(wallet = %state.wallet_address, "downgraded request to the free model on low balance");
        }
    }

    // Dedup against other in-flight or just-completed identical requests.
    let canonical_body = serde_json::to_vec(&request).unwrap_or_default();
    let dedup_key = RequestDeduplicator::key_for(&canonical_body);
    if let Some(cached) = state.dedup.get_cached(&dedup_key) {
        return fetch_response_into_axum(cached, want_stream, &request.model);
    }
    if !state.dedup.mark_inflight(&dedup_key) {
        if let Some(mut rx) = state.dedup.get_inflight(&dedup_key) {
            return match rx.recv().await {
                Ok(Ok(resp)) => fetch_response_into_axum(resp, want_stream, &request.model),
                Ok(Err(body)) => dedup_error_response(&body),
                Err(_) => ProxyError::DedupOriginFailed.into_response(),
            };
        }
    }

    // Response cache (non-streaming only).
    let cache_key = crate::cache::ResponseCache::key_for(&canonical_body);
    let cache_eligible = !want_stream && state.cache.should_cache(&canonical_body, Some(headers));
    if cache_eligible {
        if let Some(cached) = state.cache.get(&cache_key) {
            state.dedup.complete(&dedup_key, cached.clone());
            return fetch_response_into_axum(cached, want_stream, &request.model);
        }
    }

    // Build the fallback candidate chain.
    let est_total_tokens = request.estimated_input_tokens() + request.max_tokens.unwrap_or(DEFAULT_OUTPUT_TOKEN_ESTIMATE);
    let use_agentic_table = profile == RoutingProfile::Auto && agentic;
    let candidates = if free_shortcut {
        vec![request.model.clone()]
    } else {
        let filtered = state.selector.fallback_chain_filtered(tier, profile, use_agentic_table, est_total_tokens);
        state.selector.deprioritize_rate_limited(filtered, state.config.routing.max_fallback_attempts)
    };

    if want_stream {
        let context_window = state.selector.model(&request.model).map(|m| m.context_window).unwrap_or(128_000);
        run_streaming(
            state.clone(),
            path.to_string(),
            request,
            candidates,
            profile,
            dedup_key,
            cache_key,
            cache_eligible,
            context_window,
            est_total_tokens,
        )
        .await
    } else {
        run_buffered(state, path, request, candidates, profile, &dedup_key, &cache_key, cache_eligible).await
    }
}

/// Join a configured base URL with a request path, tolerating whichever
/// combination of trailing/leading slashes the operator's config uses.
/// Falls back to plain concatenation if the base isn't a valid URL (e.g. a
/// bare host used in a test harness).
fn join_url(base: &str, path: &str) -> String {
    match url::Url::parse(base) {
        Ok(base_url) => base_url.join(path.trim_start_matches('/')).map(|u| u.to_string()).unwrap_or_else(|_| format!("{base}{path}")),
        Err(_) => format!("{base}{path}"),
    }
}

/// Transparent passthrough for `/v1/x/*` and `/v1/partner/*`: a single
/// payment-fetch call, no classification, no dedup, no caching.
pub async fn passthrough(state: &Arc<AppState>, path: &str, body: &Bytes) -> Response {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let url = join_url(&state.config.server.upstream_base_url, path);
    match state.payment_fetch.fetch(&url, path, &value, None).await {
        Ok(response) => fetch_response_into_axum(response, false, ""),
        Err(e) => payment_fetch_error_to_proxy_error(e).into_response(),
    }
}

fn classify_request(state: &AppState, request: &ChatCompletionRequest) -> Classification {
    let prompt = request.classifier_prompt();
    let system_prompt = request.classifier_system_prompt();
    let result = routing::classify(&prompt, &system_prompt, &state.config.routing);
    let est_input_tokens = request.estimated_input_tokens();

    if est_input_tokens > state.config.routing.max_tokens_force_complex {
        return Classification {
            tier: Tier::Complex,
            reasoning: "Input exceeds the size limit for non-COMPLEX tiers".to_string(),
            confidence: 0.95,
            signals: result.signals,
            agentic: result.agentic_score >= state.config.routing.agentic_threshold,
        };
    }

    let mut tier = result.tier.unwrap_or(state.config.routing.ambiguous_default_tier);
    if STRUCTURED_OUTPUT_RE.is_match(&system_prompt) {
        tier = tier.max(state.config.routing.structured_output_min_tier);
    }

    let agentic = state.config.routing.agentic_mode || result.agentic_score >= state.config.routing.agentic_threshold;
    let reasoning = format!("classified as {tier} (confidence {:.2})", result.confidence);
    Classification { tier, reasoning, confidence: result.confidence, signals: result.signals, agentic }
}

async fn maybe_downgrade_for_balance(state: &AppState, request: &mut ChatCompletionRequest) -> bool {
    let Some(model) = state.selector.model(&request.model) else { return false };
    let input_tokens = request.estimated_input_tokens();
    let output_tokens = request.max_tokens.unwrap_or(DEFAULT_OUTPUT_TOKEN_ESTIMATE);
    let est_micros = attempt_cost_micros(model, input_tokens, output_tokens);

    let info = match state.balance.check_balance().await {
        Ok(info) => info,
        Err(e) => {
            warn!(error = %e, "balance RPC read failed; proceeding without a downgrade");
            return false;
        }
    };

    if info.is_empty {
        request.model = state.config.routing.free_model.clone();
        return true;
    }

    let balance_with_margin =
        (info.balance_usd * dec!(1_000_000) * BALANCE_SAFETY_FACTOR).to_u128().unwrap_or(0);
    if balance_with_margin < est_micros {
        request.model = state.config.routing.free_model.clone();
        return true;
    }
    false
}

/// `ceil(1.2 * (input + output) priced) µUSD`, floored at 100 µUSD so a
/// pre-authorization always covers a little headroom over the raw estimate.
fn attempt_cost_micros(model: &routing::ModelEntry, input_tokens: u64, output_tokens: u64) -> u128 {
    let price_in = model.input_price_per_million / dec!(1_000_000);
    let price_out = model.output_price_per_million / dec!(1_000_000);
    let usd = (Decimal::from(input_tokens) * price_in + Decimal::from(output_tokens) * price_out) * dec!(1.2);
    let micros = (usd * dec!(1_000_000)).ceil().to_u128().unwrap_or(0);
    micros.max(MIN_ESTIMATED_COST_MICROS)
}

fn cost_estimate_micros(cost: &routing::CostEstimate) -> u128 {
    (cost.total_cost * dec!(1_000_000)).ceil().to_u128().unwrap_or(0).max(MIN_ESTIMATED_COST_MICROS)
}

/// USDC has 6 decimals, so a µUSD figure is already denominated in the
/// asset's smallest unit.
fn amount_in_asset_units(cost: &routing::CostEstimate) -> String {
    cost_estimate_micros(cost).to_string()
}

async fn run_fallback_loop(
    state: &AppState,
    path: &str,
    base_request: &ChatCompletionRequest,
    candidates: &[String],
    profile: RoutingProfile,
) -> Result<(FetchResponse, String), ProxyError> {
    let mut attempted = Vec::with_capacity(candidates.len());

    for model_id in candidates {
        let Some(model) = state.selector.model(model_id) else { continue };
        attempted.push(model_id.clone());

        let mut attempt_request = base_request.clone();
        attempt_request.model = model_id.clone();
        attempt_request.messages = normalize::normalize_for_attempt(base_request.messages.clone(), model);

        let body = match serde_json::to_value(&attempt_request) {
            Ok(v) => v,
            Err(e) => {
                warn!(model = %model_id, error = %e, "failed to serialize attempt request, skipping candidate");
                continue;
            }
        };

        let max_output_tokens = attempt_request.max_tokens.unwrap_or(DEFAULT_OUTPUT_TOKEN_ESTIMATE);
        let cost = state.selector.estimate_cost_for(
            model_id,
            attempt_request.estimated_input_tokens(),
            max_output_tokens,
            profile,
        );
        let est_amount = amount_in_asset_units(&cost);
        let url = join_url(&state.config.server.upstream_base_url, path);

        let response = match state.payment_fetch.fetch(&url, path, &body, Some(&est_amount)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(model = %model_id, error = %e, "payment fetch failed for this candidate");
                continue;
            }
        };

        if response.status == 429 {
            state.selector.mark_rate_limited(model_id);
        }

        let is_degraded = response.status == 200
            && serde_json::from_slice::<Value>(&response.body)
                .map(|body| degraded::is_degraded(&body, &state.config.degraded))
                .unwrap_or(false);

        if response.status == 200 && !is_degraded {
            return Ok((response, model_id.clone()));
        }

        let effective_status = if is_degraded { 503 } else { response.status };
        if degraded::is_provider_error(effective_status, &response.body) {
            continue;
        }

        return Err(error_body_to_proxy_error(response.status, &response.body, &state.wallet_address));
    }

    Err(ProxyError::AllProvidersUnavailable { attempted })
}

async fn run_buffered(
    state: &Arc<AppState>,
    path: &str,
    request: ChatCompletionRequest,
    candidates: Vec<String>,
    profile: RoutingProfile,
    dedup_key: &str,
    cache_key: &str,
    cache_eligible: bool,
) -> Response {
    match run_fallback_loop(state, path, &request, &candidates, profile).await {
        Ok((response, model_id)) => {
            state.dedup.complete(dedup_key, response.clone());
            if cache_eligible {
                state.cache.set(cache_key, response.clone(), Some(model_id.clone()), None);
            }
            let max_output_tokens = request.max_tokens.unwrap_or(DEFAULT_OUTPUT_TOKEN_ESTIMATE);
            let cost = state.selector.estimate_cost_for(&model_id, request.estimated_input_tokens(), max_output_tokens, profile);
            state.balance.deduct_estimated(cost_estimate_micros(&cost));
            info!(model = %model_id, status = response.status, "chat completion attempt succeeded");
            fetch_response_into_axum(response, false, &model_id)
        }
        Err(err) => {
            state.dedup.remove_inflight(dedup_key);
            err.into_response()
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_streaming(
    state: Arc<AppState>,
    path: String,
    request: ChatCompletionRequest,
    candidates: Vec<String>,
    profile: RoutingProfile,
    dedup_key: String,
    cache_key: String,
    cache_eligible: bool,
    context_window: u64,
    est_used_tokens: u64,
) -> Response {
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(16);
    let (cancel_tx, mut cancel_rx) = watch::channel(false);

    let heartbeat_tx = tx.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        ticker.tick().await; // first tick fires immediately
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if heartbeat_tx.send(Ok(Bytes::from_static(sse::HEARTBEAT_LINE.as_bytes()))).await.is_err() {
                        break;
                    }
                }
                _ = cancel_rx.changed() => break,
            }
        }
    });

    let _ = tx.send(Ok(Bytes::from_static(sse::HEARTBEAT_LINE.as_bytes()))).await;

    tokio::spawn(async move {
        let outcome = run_fallback_loop(&state, &path, &request, &candidates, profile).await;
        let _ = cancel_tx.send(true);

        match outcome {
            Ok((response, model_id)) => {
                state.dedup.complete(&dedup_key, response.clone());
                if cache_eligible {
                    state.cache.set(&cache_key, response.clone(), Some(model_id.clone()), None);
                }
                let max_output_tokens = request.max_tokens.unwrap_or(DEFAULT_OUTPUT_TOKEN_ESTIMATE);
                let cost = state.selector.estimate_cost_for(&model_id, request.estimated_input_tokens(), max_output_tokens, profile);
                state.balance.deduct_estimated(cost_estimate_micros(&cost));

                match serde_json::from_slice::<Value>(&response.body) {
                    Ok(completion) => {
                        for line in sse::chunks_for_completion(&completion, &model_id) {
                            if tx.send(Ok(Bytes::from(line))).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(_) => {
                        let _ = tx.send(Ok(Bytes::copy_from_slice(&response.body))).await;
                    }
                }
            }
            Err(err) => {
                state.dedup.remove_inflight(&dedup_key);
                let chunk = format!("data: {}\n\n", err.to_json());
                let _ = tx.send(Ok(Bytes::from(chunk))).await;
            }
        }
        let _ = tx.send(Ok(Bytes::from_static(sse::DONE_LINE.as_bytes()))).await;
    });

    let body = axum::body::Body::from_stream(ReceiverStream::new(rx));
    let used_kb = (est_used_tokens * 4) / 1024;
    let limit_kb = (context_window * 4) / 1024;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header(CONTEXT_HEADER_USED, used_kb.to_string())
        .header(CONTEXT_HEADER_LIMIT, limit_kb.to_string())
        .body(body)
        .unwrap_or_else(|_| ProxyError::Internal("failed to build streaming response".into()).into_response())
}

fn fetch_response_into_axum(response: FetchResponse, want_stream: bool, model_id: &str) -> Response {
    if want_stream {
        if let Ok(completion) = serde_json::from_slice::<Value>(&response.body) {
            let mut payload = sse::chunks_for_completion(&completion, model_id).join("");
            payload.push_str(sse::DONE_LINE);
            return Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(axum::body::Body::from(payload))
                .unwrap_or_else(|_| ProxyError::Internal("failed to build streaming response".into()).into_response());
        }
    }

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);
    match response.headers.get(header::CONTENT_TYPE) {
        Some(ct) => builder = builder.header(header::CONTENT_TYPE, ct.clone()),
        None => builder = builder.header(header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
    }
    builder
        .body(axum::body::Body::from(response.body))
        .unwrap_or_else(|_| ProxyError::Internal("failed to build response".into()).into_response())
}

fn dedup_error_response(body: &str) -> Response {
    let value: Value = serde_json::from_str(body).unwrap_or_else(|_| json!({"error": {"type": "dedup_origin_failed"}}));
    (StatusCode::SERVICE_UNAVAILABLE, Json(value)).into_response()
}

fn payment_fetch_error_to_proxy_error(e: PaymentFetchError) -> ProxyError {
    match e {
        PaymentFetchError::Signing(err) => ProxyError::InvalidPayload { message: err.to_string() },
        other => ProxyError::ProviderError { status: 502, message: other.to_string() },
    }
}

/// Transform a raw upstream error body into the stable taxonomy the client
/// sees: insufficient-funds, invalid-signature,
/// and settlement failures each get their own `ProxyError` variant.
fn error_body_to_proxy_error(status: u16, body: &[u8], wallet: &str) -> ProxyError {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .map(|e| e.get("message").map(|m| m.to_string()).unwrap_or_else(|| e.to_string()))
        .unwrap_or_else(|| String::from_utf8_lossy(body).to_string());
    let lower = message.to_lowercase();

    if lower.contains("verification failed") || lower.contains("insufficient") {
        return ProxyError::InsufficientFunds {
            current_balance_usd: extract_amount(&message, "current").unwrap_or_else(|| "0".to_string()),
            required_usd: extract_amount(&message, "required").unwrap_or_else(|| "0".to_string()),
            wallet: wallet.to_string(),
            help: "add funds to the configured wallet to continue".to_string(),
        };
    }
    if lower.contains("signature") && lower.contains("invalid") {
        return ProxyError::InvalidPayload { message };
    }
    if lower.contains("settlement") {
        let out_of_gas = lower.contains("gas");
        return ProxyError::SettlementFailed { message, out_of_gas };
    }
    ProxyError::ProviderError { status, message }
}

fn extract_amount(message: &str, key: &str) -> Option<String> {
    let pattern = format!(r#"(?i){key}["']?\s*[:=]\s*"?\$?([0-9.]+)"#);
    Regex::new(&pattern).ok()?.captures(message)?.get(1).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_output_regex_matches_expected_words() {
        assert!(STRUCTURED_OUTPUT_RE.is_match("Respond with valid JSON"));
        assert!(STRUCTURED_OUTPUT_RE.is_match("Follow this schema"));
        assert!(!STRUCTURED_OUTPUT_RE.is_match("Tell me a joke"));
    }

    #[test]
    fn attempt_cost_micros_respects_floor() {
        let model = routing::ModelEntry {
            id: "test/model".to_string(),
            name: "Test".to_string(),
            input_price_per_million: dec!(0.01),
            output_price_per_million: dec!(0.01),
            context_window: 32_000,
            max_output: 4096,
            capabilities: routing::ModelCapabilities { reasoning: false, vision: false, agentic: false },
        };
        assert_eq!(attempt_cost_micros(&model, 1, 1), MIN_ESTIMATED_COST_MICROS);
    }

    #[test]
    fn extract_amount_reads_key_value_pairs() {
        let message = r#"Verification failed: current=1.23 required=5.00"#;
        assert_eq!(extract_amount(message, "current").as_deref(), Some("1.23"));
        assert_eq!(extract_amount(message, "required").as_deref(), Some("5.00"));
    }

    #[test]
    fn error_mapping_recognizes_insufficient_funds() {
        let body = br#"{"error":{"message":"Verification failed: current=0.10 required=1.00"}}"#;
        let err = error_body_to_proxy_error(402, body, "0xabc");
        assert_eq!(err.type_id(), "insufficient_funds");
    }

    #[test]
    fn error_mapping_recognizes_settlement_failure() {
        let body = br#"{"error":{"message":"settlement failed: out of gas"}}"#;
        let err = error_body_to_proxy_error(500, body, "0xabc");
        assert_eq!(err.type_id(), "settlement_failed");
    }

    #[test]
    fn join_url_handles_bare_and_trailing_slash_bases() {
        assert_eq!(join_url("https://api.blockrun.ai", "/v1/chat/completions"), "https://api.blockrun.ai/v1/chat/completions");
        assert_eq!(join_url("https://api.blockrun.ai/", "/v1/chat/completions"), "https://api.blockrun.ai/v1/chat/completions");
    }

    #[test]
    fn join_url_falls_back_to_concatenation_for_invalid_base() {
        assert_eq!(join_url("not-a-url", "/v1/chat/completions"), "not-a-url/v1/chat/completions");
    }
}
