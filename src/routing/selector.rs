//! Model Selector: tier + profile → concrete model,
//! with a cost estimate and a context-window-filtered fallback chain. Also
//! owns the rate-limit cooldown map used to de-prioritize a model for 60s
//! after a 429.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::catalog::{self, ModelEntry, TierConfig};
use super::{CostEstimate, RoutingProfile, Tier};

const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct CooldownEntry {
    until: Instant,
}

/// Stateful model registry + fallback-chain builder. Stateless w.r.t.
/// sessions (that's [`crate::session::SessionStore`]); the only mutable
/// state here is the rate-limit cooldown map.
pub struct Selector {
    catalog: HashMap<String, ModelEntry>,
    auto_tiers: HashMap<Tier, TierConfig>,
    eco_tiers: HashMap<Tier, TierConfig>,
    premium_tiers: HashMap<Tier, TierConfig>,
    agentic_tiers: HashMap<Tier, TierConfig>,
    cooldowns: Mutex<HashMap<String, CooldownEntry>>,
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector {
    pub fn new() -> Self {
        Self {
            catalog: catalog::catalog_map(),
            auto_tiers: catalog::default_auto_tiers(),
            eco_tiers: catalog::default_eco_tiers(),
            premium_tiers: catalog::default_premium_tiers(),
            agentic_tiers: catalog::default_agentic_tiers(),
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    pub fn model(&self, id: &str) -> Option<&ModelEntry> {
        self.catalog.get(id)
    }

    fn tier_table(&self, profile: RoutingProfile, agentic: bool) -> &HashMap<Tier, TierConfig> {
        match profile {
            RoutingProfile::Auto if agentic => &self.agentic_tiers,
            RoutingProfile::Auto => &self.auto_tiers,
            RoutingProfile::Eco => &self.eco_tiers,
            RoutingProfile::Premium => &self.premium_tiers,
            RoutingProfile::Free => &self.auto_tiers, // unused: free bypasses the selector
        }
    }

    /// `getFallbackChain(tier, tierTable)`: `[primary, ...fallbacks]`
    /// in declared order, unfiltered.
    pub fn fallback_chain(&self, tier: Tier, profile: RoutingProfile, agentic: bool) -> Vec<String> {
        self.tier_table(profile, agentic)
            .get(&tier)
            .map(|tc| tc.chain().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    /// `getFallbackChainFiltered`: keep only models whose
    /// context window is >= 1.1x the estimated total tokens. If filtering
    /// empties the list, fall back to the unfiltered chain (degrade safely).
    pub fn fallback_chain_filtered(
        &self,
        tier: Tier,
        profile: RoutingProfile,
        agentic: bool,
        est_total_tokens: u64,
    ) -> Vec<String> {
        let chain = self.fallback_chain(tier, profile, agentic);
        let required = (est_total_tokens as f64 * 1.1) as u64;
        let filtered: Vec<String> = chain
            .iter()
            .filter(|id| {
                self.catalog
                    .get(id.as_str())
                    .map(|m| m.context_window >= required)
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        if filtered.is_empty() { chain } else { filtered }
    }

    /// Re-order a candidate chain so any model currently on a rate-limit
    /// cooldown is moved to the tail, then cap at `max_attempts`.
    pub fn deprioritize_rate_limited(&self, chain: Vec<String>, max_attempts: usize) -> Vec<String> {
        let now = Instant::now();
        let cooldowns = self.cooldowns.lock().expect("cooldowns mutex poisoned");
        let (mut ready, mut cooling): (Vec<String>, Vec<String>) =
            chain.into_iter().partition(|id| {
                cooldowns
                    .get(id.as_str())
                    .map(|cd| cd.until <= now)
                    .unwrap_or(true)
            });
        ready.append(&mut cooling);
        ready.truncate(max_attempts);
        ready
    }

    /// Mark a model rate-limited for 60s.
    pub fn mark_rate_limited(&self, model_id: &str) {
        let mut cooldowns = self.cooldowns.lock().expect("cooldowns mutex poisoned");
        cooldowns.insert(
            model_id.to_string(),
            CooldownEntry { until: Instant::now() + RATE_LIMIT_COOLDOWN },
        );
    }

    /// `selectModel`: primary model for the tier,
    /// plus its cost estimate relative to the fixed premium reference model.
    pub fn select_model(
        &self,
        tier: Tier,
        profile: RoutingProfile,
        agentic: bool,
        est_input_tokens: u64,
        max_output_tokens: u64,
    ) -> (String, CostEstimate) {
        let table = self.tier_table(profile, agentic);
        let primary = table
            .get(&tier)
            .map(|tc| tc.primary.clone())
            .unwrap_or_else(|| "nvidia/gpt-oss-120b".to_string());
        let cost = self
            .model(&primary)
            .map(|m| self.estimate_cost(m, est_input_tokens, max_output_tokens, profile))
            .unwrap_or_else(zero_cost);
        (primary, cost)
    }

    /// Cost estimate for a specific model id (used by the fallback loop
    /// once a concrete candidate has been picked).
    pub fn estimate_cost_for(
        &self,
        model_id: &str,
        est_input_tokens: u64,
        max_output_tokens: u64,
        profile: RoutingProfile,
    ) -> CostEstimate {
        self.model(model_id)
            .map(|m| self.estimate_cost(m, est_input_tokens, max_output_tokens, profile))
            .unwrap_or_else(zero_cost)
    }

    fn estimate_cost(&self, model: &ModelEntry, input_tokens: u64, max_output_tokens: u64, profile: RoutingProfile) -> CostEstimate {
        let max_output = model.max_output.min(max_output_tokens);
        let input_cost = Decimal::from(input_tokens) * model.input_price_per_million / dec!(1_000_000);
        let output_cost = Decimal::from(max_output) * model.output_price_per_million / dec!(1_000_000);
        let total = input_cost + output_cost;

        let reference = catalog::premium_reference_model();
        let baseline_input = Decimal::from(input_tokens) * reference.input_price_per_million / dec!(1_000_000);
        let baseline_output = Decimal::from(max_output) * reference.output_price_per_million / dec!(1_000_000);
        let baseline = baseline_input + baseline_output;

        // Savings are defined as 0 when baseline == 0, and always 0 under
        // the premium profile.
        let savings_pct = if profile == RoutingProfile::Premium || baseline <= Decimal::ZERO {
            0.0
        } else {
            let ratio = (baseline - total) / baseline;
            ratio.try_into().unwrap_or(0.0f64).max(0.0)
        };

        CostEstimate {
            input_cost,
            output_cost,
            total_cost: total,
            baseline_cost: baseline,
            savings_pct,
        }
    }
}

fn zero_cost() -> CostEstimate {
    CostEstimate {
        input_cost: Decimal::ZERO,
        output_cost: Decimal::ZERO,
        total_cost: Decimal::ZERO,
        baseline_cost: Decimal::ZERO,
        savings_pct: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_model_matches_tier_table_primary() {
        let s = Selector::new();
        for profile in [RoutingProfile::Auto, RoutingProfile::Eco, RoutingProfile::Premium] {
            for tier in [Tier::Simple, Tier::Medium, Tier::Complex, Tier::Reasoning] {
                let (model, _) = s.select_model(tier, profile, false, 1000, 4096);
                let expected = s.tier_table(profile, false).get(&tier).unwrap().primary.clone();
                assert_eq!(model, expected);
            }
        }
    }

    #[test]
    fn filtered_chain_falls_back_to_unfiltered_when_empty() {
        let s = Selector::new();
        let chain = s.fallback_chain_filtered(Tier::Reasoning, RoutingProfile::Premium, false, 50_000_000);
        assert!(!chain.is_empty());
    }

    #[test]
    fn filtered_chain_respects_context_window() {
        let s = Selector::new();
        let chain = s.fallback_chain_filtered(Tier::Simple, RoutingProfile::Auto, false, 1000);
        for id in &chain {
            let m = s.model(id).unwrap();
            assert!(m.context_window as f64 >= 1000.0 * 1.1);
        }
    }

    #[test]
    fn rate_limited_model_is_deprioritized_not_dropped() {
        let s = Selector::new();
        let chain = s.fallback_chain(Tier::Simple, RoutingProfile::Auto, false);
        let first = chain[0].clone();
        s.mark_rate_limited(&first);
        let reordered = s.deprioritize_rate_limited(chain.clone(), 5);
        assert_eq!(reordered.last().unwrap(), &first);
        assert_eq!(reordered.len(), chain.len().min(5));
    }

    #[test]
    fn premium_profile_never_reports_savings() {
        let s = Selector::new();
        let (_, cost) = s.select_model(Tier::Reasoning, RoutingProfile::Premium, false, 5000, 4096);
        assert_eq!(cost.savings_pct, 0.0);
    }

    #[test]
    fn savings_are_bounded_zero_to_one() {
        let s = Selector::new();
        let (_, cost) = s.select_model(Tier::Simple, RoutingProfile::Auto, false, 1000, 4096);
        assert!(cost.savings_pct >= 0.0 && cost.savings_pct <= 1.0);
    }
}
