//! Payment-bearing Fetch Layer: the HTTP-402 / EIP-712 handshake, its
//! per-endpoint pre-auth cache, and the `Signer` abstraction that keeps
//! the core crypto-agnostic.

pub mod cache;
pub mod fetch;
pub mod signer;

use serde::{Deserialize, Serialize};

pub use cache::PaymentCache;
pub use fetch::{PaymentFetch, PaymentFetchError};
pub use signer::{LocalSigner, Signer, SignerError};

/// One accepted payment option in a 402 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOption {
    pub scheme: String,
    pub network: String,
    pub asset: String,
    #[serde(rename = "payTo")]
    pub pay_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(rename = "maxAmountRequired", default, skip_serializing_if = "Option::is_none")]
    pub max_amount_required: Option<String>,
    #[serde(rename = "maxTimeoutSeconds", default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<PaymentExtra>,
}

impl PaymentOption {
    /// `amount`, falling back to `maxAmountRequired`.
    pub fn effective_amount(&self) -> Option<&str> {
        self.amount.as_deref().or(self.max_amount_required.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// `x-payment-required` header body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequiredBody {
    pub accepts: Vec<PaymentOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The EIP-712 `TransferWithAuthorization` authorization struct, wire
/// shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAuthorization {
    pub from: String,
    pub to: String,
    pub value: String,
    #[serde(rename = "validAfter")]
    pub valid_after: String,
    #[serde(rename = "validBefore")]
    pub valid_before: String,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub signature: String,
    pub authorization: TransferAuthorization,
}

/// The outer payload sent back in the `payment-signature` / `x-payment`
/// retry headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuterPaymentPayload {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub resource: ResourceDescriptor,
    pub accepted: PaymentOption,
    pub payload: PaymentPayload,
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

/// Cached payment parameters for one endpoint path.
#[derive(Debug, Clone)]
pub struct CachedPaymentParams {
    pub pay_to: String,
    pub asset: String,
    pub scheme: String,
    pub network: String,
    pub domain_name: Option<String>,
    pub domain_version: Option<String>,
    pub max_timeout_seconds: Option<u64>,
    pub resource: Option<ResourceDescriptor>,
    pub cached_at: std::time::Instant,
}

/// Parse a CAIP-style `eip155:<chainId>` network identifier, falling back
/// to the well-known bare aliases, else the Base mainnet default.
pub fn chain_id_for_network(network: &str) -> u64 {
    if let Some(rest) = network.strip_prefix("eip155:") {
        if let Ok(id) = rest.parse() {
            return id;
        }
    }
    match network {
        "base" => 8453,
        "base-sepolia" => 84532,
        _ => 8453,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_parses_caip_network() {
        assert_eq!(chain_id_for_network("eip155:84532"), 84532);
    }

    #[test]
    fn chain_id_falls_back_for_bare_aliases() {
        assert_eq!(chain_id_for_network("base"), 8453);
        assert_eq!(chain_id_for_network("base-sepolia"), 84532);
        assert_eq!(chain_id_for_network("unknown-network"), 8453);
    }

    #[test]
    fn effective_amount_falls_back_to_max_amount_required() {
        let opt = PaymentOption {
            scheme: "exact".into(),
            network: "base".into(),
            asset: "0x0".into(),
            pay_to: "0x1".into(),
            amount: None,
            max_amount_required: Some("1000".into()),
            max_timeout_seconds: None,
            extra: None,
        };
        assert_eq!(opt.effective_amount(), Some("1000"));
    }
}
