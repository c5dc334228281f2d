//! Payment-bearing Fetch: wraps an HTTP client to satisfy a server that
//! speaks HTTP 402 Payment Required, with a pre-authorized fast path for
//! endpoints with a warm [`PaymentCache`] entry.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE_NO_PAD as BASE64_URL};
use bytes::Bytes;
use rand::RngCore;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::{
    CachedPaymentParams, OuterPaymentPayload, PaymentCache, PaymentOption, PaymentPayload,
    PaymentRequiredBody, ResourceDescriptor, TransferAuthorization, chain_id_for_network,
};
use super::signer::{Eip712Domain, Signer, SignerError};

const HEADER_X_PAYMENT_REQUIRED: &str = "x-payment-required";
const HEADER_PAYMENT_SIGNATURE: &str = "payment-signature";
const HEADER_X_PAYMENT: &str = "x-payment";
const DEFAULT_MAX_TIMEOUT_SECS: u64 = 300;
const VALID_AFTER_SKEW_SECS: i64 = 600;

#[derive(Debug, thiserror::Error)]
pub enum PaymentFetchError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("402 response missing x-payment-required header")]
    MissingPaymentHeader,
    #[error("x-payment-required header is not valid base64url JSON: {0}")]
    MalformedPaymentHeader(String),
    #[error("x-payment-required has an empty accepts list")]
    MissingAccepts,
    #[error("payment option has neither amount nor maxAmountRequired")]
    MissingAmount,
    #[error("invalid payTo or asset address: {0}")]
    InvalidAddress(String),
    #[error("signing the payment authorization failed: {0}")]
    Signing(#[from] SignerError),
}

/// A raw HTTP response from the upstream aggregator, status/headers/body
/// preserved so the Proxy Core can apply degraded-response detection and
/// error mapping on top.
#[derive(Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct PaymentFetch {
    client: reqwest::Client,
    signer: Arc<dyn Signer>,
    cache: Arc<PaymentCache>,
}

impl PaymentFetch {
    pub fn new(client: reqwest::Client, signer: Arc<dyn Signer>, cache: Arc<PaymentCache>) -> Self {
        Self { client, signer, cache }
    }

    /// Fetch `url` (whose cache key is `endpoint_path`), attaching a
    /// payment authorization if and when the upstream demands one.
    /// `estimated_amount_micros` enables the pre-auth fast path when a
    /// cache entry already exists for this endpoint.
    pub async fn fetch(
        &self,
        url: &str,
        endpoint_path: &str,
        body: &serde_json::Value,
        estimated_amount: Option<&str>,
    ) -> Result<FetchResponse, PaymentFetchError> {
        if let (Some(cached), Some(amount)) = (self.cache.get(endpoint_path), estimated_amount) {
            return self.fetch_pre_authorized(url, endpoint_path, body, &cached, amount).await;
        }
        self.fetch_normal(url, endpoint_path, body).await
    }

    /// Pre-auth fast path: sign using the cached parameters on
    /// the very first request, skipping the 402 round trip.
    async fn fetch_pre_authorized(
        &self,
        url: &str,
        endpoint_path: &str,
        body: &serde_json::Value,
        cached: &CachedPaymentParams,
        amount: &str,
    ) -> Result<FetchResponse, PaymentFetchError> {
        let option = PaymentOption {
            scheme: cached.scheme.clone(),
            network: cached.network.clone(),
            asset: cached.asset.clone(),
            pay_to: cached.pay_to.clone(),
            amount: Some(amount.to_string()),
            max_amount_required: None,
            max_timeout_seconds: cached.max_timeout_seconds,
            extra: None,
        };
        let resource = cached.resource.clone().unwrap_or_else(|| default_resource(url));
        let headers = self.sign_and_build_headers(&option, &resource).await?;

        let response = self.send(url, body, Some(headers)).await?;
        if response.status != 402 {
            return Ok(response);
        }

        match extract_payment_required(&response.headers) {
            Ok(_) => self.continue_from_402(url, endpoint_path, body, response).await,
            Err(PaymentFetchError::MissingPaymentHeader) => {
                self.cache.invalidate(endpoint_path);
                self.fetch_normal(url, endpoint_path, body).await
            }
            Err(e) => Err(e),
        }
    }

    /// Normal path: send a clean request; on 402, parse the
    /// header, cache the derived parameters, sign, and retry exactly once.
    async fn fetch_normal(
        &self,
        url: &str,
        endpoint_path: &str,
        body: &serde_json::Value,
    ) -> Result<FetchResponse, PaymentFetchError> {
        let response = self.send(url, body, None).await?;
        if response.status != 402 {
            return Ok(response);
        }
        self.continue_from_402(url, endpoint_path, body, response).await
    }

    async fn continue_from_402(
        &self,
        url: &str,
        endpoint_path: &str,
        body: &serde_json::Value,
        response: FetchResponse,
    ) -> Result<FetchResponse, PaymentFetchError> {
        let required = extract_payment_required(&response.headers)?;
        let option = required.accepts.first().ok_or(PaymentFetchError::MissingAccepts)?.clone();
        let amount = option
            .effective_amount()
            .ok_or(PaymentFetchError::MissingAmount)?
            .to_string();

        self.cache.set(
            endpoint_path,
            CachedPaymentParams {
                pay_to: option.pay_to.clone(),
                asset: option.asset.clone(),
                scheme: option.scheme.clone(),
                network: option.network.clone(),
                domain_name: option.extra.as_ref().and_then(|e| e.name.clone()),
                domain_version: option.extra.as_ref().and_then(|e| e.version.clone()),
                max_timeout_seconds: option.max_timeout_seconds,
                resource: required.resource.clone(),
                cached_at: std::time::Instant::now(),
            },
        );

        let mut priced = option.clone();
        priced.amount = Some(amount);
        let resource = required.resource.clone().unwrap_or_else(|| default_resource(url));
        let headers = self.sign_and_build_headers(&priced, &resource).await?;
        self.send(url, body, Some(headers)).await.map_err(Into::into)
    }

    async fn sign_and_build_headers(
        &self,
        option: &PaymentOption,
        resource: &ResourceDescriptor,
    ) -> Result<HeaderMap, PaymentFetchError> {
        let pay_to = strip_caip_suffix(&option.pay_to);
        let asset = strip_caip_suffix(&option.asset);
        if !is_hex40(pay_to) {
            return Err(PaymentFetchError::InvalidAddress(option.pay_to.clone()));
        }
        if !is_hex40(asset) {
            return Err(PaymentFetchError::InvalidAddress(option.asset.clone()));
        }

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
        let max_timeout = option.max_timeout_seconds.unwrap_or(DEFAULT_MAX_TIMEOUT_SECS) as i64;
        let valid_after = now - VALID_AFTER_SKEW_SECS;
        let valid_before = now + max_timeout;

        let auth = TransferAuthorization {
            from: self.signer.address(),
            to: pay_to.to_string(),
            value: option.effective_amount().ok_or(PaymentFetchError::MissingAmount)?.to_string(),
            valid_after: valid_after.to_string(),
            valid_before: valid_before.to_string(),
            nonce: format!("0x{}", hex_encode(&random_nonce())),
        };

        let domain = Eip712Domain {
            name: option.extra.as_ref().and_then(|e| e.name.clone()).unwrap_or_else(|| "USD Coin".to_string()),
            version: option.extra.as_ref().and_then(|e| e.version.clone()).unwrap_or_else(|| "2".to_string()),
            chain_id: chain_id_for_network(&option.network),
            verifying_contract: asset.to_string(),
        };

        let signature = self.signer.sign_transfer_authorization(&domain, &auth).await?;

        let outer = OuterPaymentPayload {
            x402_version: 2,
            resource: resource.clone(),
            accepted: option.clone(),
            payload: PaymentPayload { signature, authorization: auth },
            extensions: serde_json::Map::new(),
        };
        let encoded = BASE64_STANDARD.encode(serde_json::to_vec(&outer).expect("outer payload always serializes"));

        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&encoded).expect("base64 is valid header value");
        headers.insert(HeaderName::from_static(HEADER_PAYMENT_SIGNATURE), value.clone());
        headers.insert(HeaderName::from_static(HEADER_X_PAYMENT), value);
        Ok(headers)
    }

    async fn send(
        &self,
        url: &str,
        body: &serde_json::Value,
        extra_headers: Option<HeaderMap>,
    ) -> Result<FetchResponse, reqwest::Error> {
        let mut req = self.client.post(url).json(body);
        if let Some(headers) = extra_headers {
            req = req.headers(headers);
        }
        let response = req.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(FetchResponse { status, headers, body })
    }
}

fn extract_payment_required(headers: &HeaderMap) -> Result<PaymentRequiredBody, PaymentFetchError> {
    let raw = headers
        .get(HEADER_X_PAYMENT_REQUIRED)
        .ok_or(PaymentFetchError::MissingPaymentHeader)?
        .to_str()
        .map_err(|e| PaymentFetchError::MalformedPaymentHeader(e.to_string()))?;
    let decoded = BASE64_URL
        .decode(raw.trim_end_matches('='))
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(raw))
        .map_err(|e| PaymentFetchError::MalformedPaymentHeader(e.to_string()))?;
    let body: PaymentRequiredBody = serde_json::from_slice(&decoded)
        .map_err(|e| PaymentFetchError::MalformedPaymentHeader(e.to_string()))?;
    if body.accepts.is_empty() {
        return Err(PaymentFetchError::MissingAccepts);
    }
    Ok(body)
}

fn default_resource(url: &str) -> ResourceDescriptor {
    ResourceDescriptor {
        url: url.to_string(),
        description: String::new(),
        mime_type: Some("application/json".to_string()),
    }
}

/// Accept a payTo/asset either as a bare `0x`-prefixed 40-hex address or as
/// a CAIP suffix (`eip155:8453:0xabc...`) — strip to the trailing segment.
fn strip_caip_suffix(value: &str) -> &str {
    value.rsplit(':').next().unwrap_or(value)
}

fn is_hex40(addr: &str) -> bool {
    let hex = addr.strip_prefix("0x").unwrap_or(addr);
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

fn random_nonce() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
