//! Error taxonomy surfaced to the client, with stable `type` identifiers
//!. Internal component errors (payment signing, RPC, cache I/O)
//! are defined alongside their components and converted into a
//! [`ProxyError`] at the Proxy Core boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Top-level error surfaced from the chat-completion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("balance ${current_balance_usd} is below the required ${required_usd}")]
    InsufficientFunds {
        current_balance_usd: String,
        required_usd: String,
        wallet: String,
        help: String,
    },

    #[error("on-chain settlement failed: {message}")]
    SettlementFailed { message: String, out_of_gas: bool },

    #[error("payment signature rejected by verifier: {message}")]
    InvalidPayload { message: String },

    #[error("server-enforced spend limit exceeded")]
    BudgetExceeded,

    #[error("upstream rate-limited this model")]
    RateLimited { model: String },

    #[error("upstream provider error (status {status})")]
    ProviderError { status: u16, message: String },

    #[error("all candidate models were unavailable")]
    AllProvidersUnavailable { attempted: Vec<String> },

    #[error("the original request this one was coalesced with failed")]
    DedupOriginFailed,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("malformed request body: {0}")]
    BadRequest(String),
}

impl ProxyError {
    /// The stable `type` identifier from the error taxonomy.
    pub fn type_id(&self) -> &'static str {
        match self {
            ProxyError::InsufficientFunds { .. } => "insufficient_funds",
            ProxyError::SettlementFailed { .. } => "settlement_failed",
            ProxyError::InvalidPayload { .. } => "invalid_payload",
            ProxyError::BudgetExceeded => "budget_exceeded",
            ProxyError::RateLimited { .. } => "rate_limited",
            ProxyError::ProviderError { .. } => "provider_error",
            ProxyError::AllProvidersUnavailable { .. } => "all_providers_unavailable",
            ProxyError::DedupOriginFailed => "dedup_origin_failed",
            ProxyError::Internal(_) => "proxy_error",
            ProxyError::BadRequest(_) => "proxy_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ProxyError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            ProxyError::SettlementFailed { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            ProxyError::BudgetExceeded => StatusCode::FORBIDDEN,
            ProxyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::ProviderError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::AllProvidersUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::DedupOriginFailed => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Body shape used both for direct JSON error responses and for the
    /// SSE `data:` error chunk emitted once stream headers are already sent.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = json!({
            "type": self.type_id(),
            "message": self.to_string(),
        });
        let obj = body.as_object_mut().expect("object literal");
        match self {
            ProxyError::InsufficientFunds {
                current_balance_usd,
                required_usd,
                wallet,
                help,
            } => {
                obj.insert("current_balance_usd".into(), json!(current_balance_usd));
                obj.insert("required_usd".into(), json!(required_usd));
                obj.insert("wallet".into(), json!(wallet));
                obj.insert("help".into(), json!(help));
            }
            ProxyError::SettlementFailed { out_of_gas, .. } if *out_of_gas => {
                obj.insert("hint".into(), json!("out of gas"));
            }
            ProxyError::ProviderError { status, .. } => {
                obj.insert("status".into(), json!(status));
            }
            ProxyError::AllProvidersUnavailable { attempted } => {
                obj.insert("attempted".into(), json!(attempted));
            }
            ProxyError::RateLimited { model } => {
                obj.insert("model".into(), json!(model));
            }
            _ => {}
        }
        json!({ "error": body })
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.to_json())).into_response()
    }
}
