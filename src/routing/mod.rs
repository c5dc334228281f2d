//! Request Classifier & Router: a 15-dimension weighted scorer with
//! sigmoid confidence calibration maps a prompt to a complexity [`Tier`],
//! and the [`selector`] maps tier + profile to a concrete model with a
//! context-filtered fallback chain.

pub mod catalog;
pub mod classifier;
pub mod keywords;
pub mod selector;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use catalog::{ModelCapabilities, ModelEntry, TierConfig, resolve_alias};
pub use classifier::{ClassificationResult, classify};
pub use selector::Selector;

/// The four complexity tiers a request can be classified into, in the
/// total order `Simple < Medium < Complex < Reasoning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Simple,
    Medium,
    Complex,
    Reasoning,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Simple => write!(f, "SIMPLE"),
            Tier::Medium => write!(f, "MEDIUM"),
            Tier::Complex => write!(f, "COMPLEX"),
            Tier::Reasoning => write!(f, "REASONING"),
        }
    }
}

/// A named mapping from tier to (primary, fallback\[\]) models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingProfile {
    #[default]
    Auto,
    Eco,
    Premium,
    Free,
}

impl std::str::FromStr for RoutingProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "eco" | "economy" | "cheap" => Ok(Self::Eco),
            "premium" | "quality" | "best" => Ok(Self::Premium),
            "free" => Ok(Self::Free),
            _ => Err(format!(
                "invalid routing profile '{s}', expected: auto, eco, premium, free"
            )),
        }
    }
}

/// The method that produced a routing decision. The core only implements
/// `rules`; `llm` is reserved for a future LLM-judged classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMethod {
    Rules,
    Llm,
}

/// Estimated costs for a routing decision, in USD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimate {
    pub input_cost: Decimal,
    pub output_cost: Decimal,
    pub total_cost: Decimal,
    pub baseline_cost: Decimal,
    /// `max(0, (baseline - cost) / baseline)`, or 0 under `premium` or when
    /// `baseline == 0`.
    pub savings_pct: f64,
}

/// The result of routing a request to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub model_id: String,
    pub tier: Tier,
    pub confidence: f64,
    pub method: RoutingMethod,
    pub agentic: bool,
    pub profile: RoutingProfile,
    pub cost_estimate: CostEstimate,
    pub reasoning: String,
    pub signals: Vec<String>,
    pub fallback_chain: Vec<String>,
}
