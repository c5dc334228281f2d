//! A crypto-agnostic `Signer` abstraction and its EIP-712
//! `TransferWithAuthorization` implementation, built on
//! `alloy::signers::local::PrivateKeySigner` to derive addresses and sign
//! messages. The domain separator and struct hash are hand-computed with
//! `alloy::primitives::keccak256` rather than `sol!`/dyn-abi, since
//! neither is in the crate's `alloy` feature set.

use std::str::FromStr;

use alloy::primitives::{Address, B256, U256, keccak256};
use alloy::signers::Signer as _;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::TransferAuthorization;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("invalid private key format")]
    InvalidPrivateKey,
    #[error("invalid address format: {0}")]
    InvalidAddress(String),
    #[error("invalid authorization field {field}: {value}")]
    InvalidField { field: &'static str, value: String },
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// The EIP-712 domain for `TransferWithAuthorization`.
#[derive(Debug, Clone)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: String,
}

/// Crypto-agnostic signing interface so the core never touches raw key
/// material directly; it only ever asks the signer to produce bytes.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The wallet address this signer signs on behalf of, `0x`-prefixed.
    fn address(&self) -> String;

    /// Sign a `TransferWithAuthorization` typed-data payload, returning a
    /// `0x`-prefixed hex signature.
    async fn sign_transfer_authorization(
        &self,
        domain: &Eip712Domain,
        auth: &TransferAuthorization,
    ) -> Result<String, SignerError>;
}

/// A [`Signer`] backed by an in-memory `alloy` local signer.
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    /// Build a signer from a hex-encoded private key (with or without the
    /// `0x` prefix), handed in as a [`SecretString`] so it never appears
    /// in a `Debug` output or a log line.
    pub fn from_private_key(key: &SecretString) -> Result<Self, SignerError> {
        let hex = key.expose_secret();
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex_decode(hex).ok_or(SignerError::InvalidPrivateKey)?;
        let inner = PrivateKeySigner::from_bytes(&B256::from_slice(&bytes))
            .map_err(|_| SignerError::InvalidPrivateKey)?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> String {
        format!("{:#x}", self.inner.address())
    }

    async fn sign_transfer_authorization(
        &self,
        domain: &Eip712Domain,
        auth: &TransferAuthorization,
    ) -> Result<String, SignerError> {
        let digest = transfer_authorization_digest(domain, auth)?;
        let signature = self
            .inner
            .sign_hash(&digest)
            .await
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
        Ok(format!("0x{}", hex_encode(&signature.as_bytes())))
    }
}

const TRANSFER_WITH_AUTHORIZATION_TYPE: &[u8] =
    b"TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)";
const EIP712_DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

fn pad_address(addr: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_slice());
    word
}

fn parse_address(field: &'static str, raw: &str) -> Result<Address, SignerError> {
    Address::from_str(raw).map_err(|_| SignerError::InvalidField { field, value: raw.to_string() })
}

fn parse_u256(field: &'static str, raw: &str) -> Result<U256, SignerError> {
    U256::from_str(raw).map_err(|_| SignerError::InvalidField { field, value: raw.to_string() })
}

fn parse_nonce(raw: &str) -> Result<B256, SignerError> {
    B256::from_str(raw).map_err(|_| SignerError::InvalidField { field: "nonce", value: raw.to_string() })
}

/// Compute the EIP-712 signing digest for a `TransferWithAuthorization`
/// payload: `keccak256(0x1901 || domainSeparator || structHash)`.
pub fn transfer_authorization_digest(
    domain: &Eip712Domain,
    auth: &TransferAuthorization,
) -> Result<B256, SignerError> {
    let from = parse_address("from", &auth.from)?;
    let to = parse_address("to", &auth.to)?;
    let value = parse_u256("value", &auth.value)?;
    let valid_after = parse_u256("validAfter", &auth.valid_after)?;
    let valid_before = parse_u256("validBefore", &auth.valid_before)?;
    let nonce = parse_nonce(&auth.nonce)?;
    let verifying_contract = parse_address("asset", &domain.verifying_contract)?;

    let type_hash = keccak256(TRANSFER_WITH_AUTHORIZATION_TYPE);
    let mut struct_buf = Vec::with_capacity(32 * 7);
    struct_buf.extend_from_slice(type_hash.as_slice());
    struct_buf.extend_from_slice(&pad_address(from));
    struct_buf.extend_from_slice(&pad_address(to));
    struct_buf.extend_from_slice(&value.to_be_bytes::<32>());
    struct_buf.extend_from_slice(&valid_after.to_be_bytes::<32>());
    struct_buf.extend_from_slice(&valid_before.to_be_bytes::<32>());
    struct_buf.extend_from_slice(nonce.as_slice());
    let struct_hash = keccak256(&struct_buf);

    let domain_type_hash = keccak256(EIP712_DOMAIN_TYPE);
    let name_hash = keccak256(domain.name.as_bytes());
    let version_hash = keccak256(domain.version.as_bytes());
    let mut domain_buf = Vec::with_capacity(32 * 5);
    domain_buf.extend_from_slice(domain_type_hash.as_slice());
    domain_buf.extend_from_slice(name_hash.as_slice());
    domain_buf.extend_from_slice(version_hash.as_slice());
    domain_buf.extend_from_slice(&U256::from(domain.chain_id).to_be_bytes::<32>());
    domain_buf.extend_from_slice(&pad_address(verifying_contract));
    let domain_separator = keccak256(&domain_buf);

    let mut digest_buf = Vec::with_capacity(2 + 32 + 32);
    digest_buf.extend_from_slice(&[0x19, 0x01]);
    digest_buf.extend_from_slice(domain_separator.as_slice());
    digest_buf.extend_from_slice(struct_hash.as_slice());
    Ok(keccak256(&digest_buf))
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn random_signer() -> (LocalSigner, String) {
        let pk = PrivateKeySigner::random();
        let hex = format!("0x{}", hex_encode(pk.credential().to_bytes().as_ref()));
        let secret = SecretString::from(hex);
        let signer = LocalSigner::from_private_key(&secret).unwrap();
        (signer, secret.expose_secret().to_string())
    }

    #[test]
    fn address_derivation_round_trips() {
        let (signer, _) = random_signer();
        assert!(signer.address().starts_with("0x"));
        assert_eq!(signer.address().len(), 42);
    }

    #[tokio::test]
    async fn signs_transfer_authorization() {
        let (signer, _) = random_signer();
        let domain = Eip712Domain {
            name: "USD Coin".into(),
            version: "2".into(),
            chain_id: 8453,
            verifying_contract: "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913".into(),
        };
        let auth = TransferAuthorization {
            from: signer.address(),
            to: "0x000000000000000000000000000000000000aa".into(),
            value: "1000000".into(),
            valid_after: "0".into(),
            valid_before: "2000000000".into(),
            nonce: format!("0x{}", "11".repeat(32)),
        };
        let sig = signer.sign_transfer_authorization(&domain, &auth).await.unwrap();
        assert!(sig.starts_with("0x"));
        assert!(sig.len() > 2);
    }

    #[test]
    fn digest_is_deterministic() {
        let domain = Eip712Domain {
            name: "USD Coin".into(),
            version: "2".into(),
            chain_id: 8453,
            verifying_contract: "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913".into(),
        };
        let auth = TransferAuthorization {
            from: "0x0000000000000000000000000000000000bbbb".into(),
            to: "0x0000000000000000000000000000000000aaaa".into(),
            value: "1".into(),
            valid_after: "0".into(),
            valid_before: "1".into(),
            nonce: format!("0x{}", "22".repeat(32)),
        };
        let a = transfer_authorization_digest(&domain, &auth).unwrap();
        let b = transfer_authorization_digest(&domain, &auth).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_malformed_address() {
        let domain = Eip712Domain {
            name: "USD Coin".into(),
            version: "2".into(),
            chain_id: 8453,
            verifying_contract: "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913".into(),
        };
        let auth = TransferAuthorization {
            from: "not-an-address".into(),
            to: "0x0000000000000000000000000000000000aaaa".into(),
            value: "1".into(),
            valid_after: "0".into(),
            valid_before: "1".into(),
            nonce: format!("0x{}", "22".repeat(32)),
        };
        assert!(transfer_authorization_digest(&domain, &auth).is_err());
    }
}
