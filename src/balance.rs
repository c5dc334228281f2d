//! Balance Monitor: a 30-second-cached on-chain ERC-20 balance reader with
//! sufficiency checks and optimistic debits.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

const LOW_BALANCE_USD: Decimal = dec!(1.00);
const ZERO_BALANCE_USD: Decimal = dec!(0.0001);
const USDC_DECIMALS: u32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("RPC transport error: {0}")]
    Transport(String),
    #[error("RPC returned an error response: {0}")]
    Response(String),
    #[error("malformed eth_call result: {0}")]
    Malformed(String),
}

/// An ERC-20 `balanceOf` reader. A thin trait so the balance monitor never
/// depends on a concrete RPC transport, the same crypto-agnostic seam the
/// `Signer` trait gives the payment layer.
#[async_trait]
pub trait ErcClient: Send + Sync {
    async fn balance_of(&self, token: &str, wallet: &str) -> Result<u128, RpcError>;
}

/// `eth_call` against a `balanceOf(address)` selector over a JSON-RPC HTTP
/// endpoint — deliberately not the full `alloy` provider stack, since a
/// single read-only call doesn't need it.
pub struct JsonRpcErcClient {
    client: reqwest::Client,
    rpc_url: String,
}

impl JsonRpcErcClient {
    pub fn new(client: reqwest::Client, rpc_url: String) -> Self {
        Self { client, rpc_url }
    }
}

#[async_trait]
impl ErcClient for JsonRpcErcClient {
    async fn balance_of(&self, token: &str, wallet: &str) -> Result<u128, RpcError> {
        let selector = "70a08231"; // balanceOf(address)
        let padded_wallet = format!("{:0>64}", wallet.trim_start_matches("0x"));
        let data = format!("0x{selector}{padded_wallet}");

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": token, "data": data }, "latest"],
        });

        let response: serde_json::Value = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        if let Some(err) = response.get("error") {
            return Err(RpcError::Response(err.to_string()));
        }
        let hex = response
            .get("result")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RpcError::Malformed("missing result field".to_string()))?;
        u128::from_str_radix(hex.trim_start_matches("0x"), 16)
            .map_err(|e| RpcError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceInfo {
    pub balance: u128,
    pub balance_usd: Decimal,
    pub is_low: bool,
    pub is_empty: bool,
    pub wallet_address: String,
}

struct CachedBalance {
    balance: u128,
    cached_at: Instant,
}

pub struct BalanceMonitor {
    client: Box<dyn ErcClient>,
    token: String,
    wallet: String,
    ttl: Duration,
    cached: Mutex<Option<CachedBalance>>,
}

impl BalanceMonitor {
    pub fn new(client: Box<dyn ErcClient>, token: String, wallet: String, ttl: Duration) -> Self {
        Self { client, token, wallet, ttl, cached: Mutex::new(None) }
    }

    /// `checkBalance()`: cached read with a 30s TTL, else a
    /// fresh `balanceOf` call.
    pub async fn check_balance(&self) -> Result<BalanceInfo, RpcError> {
        if let Some(balance) = self.fresh_cached() {
            return Ok(self.describe(balance));
        }
        let balance = self.client.balance_of(&self.token, &self.wallet).await?;
        *self.cached.lock().expect("balance cache mutex poisoned") =
            Some(CachedBalance { balance, cached_at: Instant::now() });
        Ok(self.describe(balance))
    }

    fn fresh_cached(&self) -> Option<u128> {
        let guard = self.cached.lock().expect("balance cache mutex poisoned");
        guard.as_ref().and_then(|c| (c.cached_at.elapsed() <= self.ttl).then_some(c.balance))
    }

    fn describe(&self, balance: u128) -> BalanceInfo {
        let balance_usd = micros_to_usd(balance);
        BalanceInfo {
            balance,
            balance_usd,
            is_low: balance_usd < LOW_BALANCE_USD,
            is_empty: balance_usd < ZERO_BALANCE_USD,
            wallet_address: self.wallet.clone(),
        }
    }

    /// `checkSufficient(estMicros)`: true iff the last-known
    /// cached balance (fresh or stale) covers the estimate. Does not
    /// trigger an RPC read — callers call `check_balance` first when they
    /// need a guaranteed-fresh figure.
    pub fn check_sufficient(&self, est_micros: u128) -> bool {
        let guard = self.cached.lock().expect("balance cache mutex poisoned");
        guard.as_ref().map(|c| c.balance >= est_micros).unwrap_or(false)
    }

    /// `deductEstimated(amount)`: optimistic subtract on a
    /// successful payment, so the next sufficiency check without an
    /// intervening RPC read reflects the spend.
    pub fn deduct_estimated(&self, amount: u128) {
        let mut guard = self.cached.lock().expect("balance cache mutex poisoned");
        if let Some(cached) = guard.as_mut() {
            cached.balance = cached.balance.saturating_sub(amount);
        }
    }

    /// `invalidate()`: force the next `check_balance` to hit
    /// the RPC, used after a payment failure.
    pub fn invalidate(&self) {
        *self.cached.lock().expect("balance cache mutex poisoned") = None;
    }
}

fn micros_to_usd(balance: u128) -> Decimal {
    Decimal::from(balance) / Decimal::from(10u64.pow(USDC_DECIMALS))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClient {
        balance: u128,
    }

    #[async_trait]
    impl ErcClient for FixedClient {
        async fn balance_of(&self, _token: &str, _wallet: &str) -> Result<u128, RpcError> {
            Ok(self.balance)
        }
    }

    fn monitor(balance: u128, ttl: Duration) -> BalanceMonitor {
        BalanceMonitor::new(Box::new(FixedClient { balance }), "0xusdc".into(), "0xwallet".into(), ttl)
    }

    #[tokio::test]
    async fn low_and_empty_thresholds() {
        let m = monitor(500_000, Duration::from_secs(30)); // $0.50
        let info = m.check_balance().await.unwrap();
        assert!(info.is_low);
        assert!(!info.is_empty);

        let m2 = monitor(50, Duration::from_secs(30)); // $0.00005
        let info2 = m2.check_balance().await.unwrap();
        assert!(info2.is_empty);
    }

    #[tokio::test]
    async fn sufficient_check_uses_cached_value() {
        let m = monitor(2_000_000, Duration::from_secs(30));
        assert!(!m.check_sufficient(1));
        m.check_balance().await.unwrap();
        assert!(m.check_sufficient(1_000_000));
        assert!(!m.check_sufficient(5_000_000));
    }

    #[tokio::test]
    async fn deduct_estimated_reduces_cached_balance() {
        let m = monitor(2_000_000, Duration::from_secs(30));
        m.check_balance().await.unwrap();
        m.deduct_estimated(500_000);
        assert!(m.check_sufficient(1_500_000));
        assert!(!m.check_sufficient(1_500_001));
    }

    #[tokio::test]
    async fn invalidate_forces_next_read() {
        let m = monitor(1_000_000, Duration::from_millis(50));
        m.check_balance().await.unwrap();
        m.invalidate();
        assert!(!m.check_sufficient(1));
    }
}
