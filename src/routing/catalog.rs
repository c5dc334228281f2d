//! Model registry: catalog of priced models, per-profile tier tables, and
//! the brand-prefix/alias resolver.

use std::collections::HashMap;
use std::sync::LazyLock as Lazy;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::Tier;

/// Model capability flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelCapabilities {
    pub reasoning: bool,
    pub vision: bool,
    pub agentic: bool,
}

/// A model in the catalog with pricing and capabilities.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
    pub input_price_per_million: Decimal,
    pub output_price_per_million: Decimal,
    pub context_window: u64,
    pub max_output: u64,
    pub capabilities: ModelCapabilities,
}

/// Tier configuration: primary model + ordered fallback chain.
#[derive(Debug, Clone)]
pub struct TierConfig {
    pub primary: String,
    pub fallbacks: Vec<String>,
}

impl TierConfig {
    pub fn chain(&self) -> Vec<&str> {
        let mut c = vec![self.primary.as_str()];
        c.extend(self.fallbacks.iter().map(String::as_str));
        c
    }
}

fn me(
    id: &str,
    name: &str,
    input: Decimal,
    output: Decimal,
    ctx: u64,
    max_out: u64,
    reasoning: bool,
    vision: bool,
    agentic: bool,
) -> ModelEntry {
    ModelEntry {
        id: id.to_string(),
        name: name.to_string(),
        input_price_per_million: input,
        output_price_per_million: output,
        context_window: ctx,
        max_output: max_out,
        capabilities: ModelCapabilities {
            reasoning,
            vision,
            agentic,
        },
    }
}

pub static MODEL_CATALOG: Lazy<Vec<ModelEntry>> = Lazy::new(|| {
    vec![
        me("openai/gpt-5.3-codex", "GPT-5.3 Codex", dec!(2.5), dec!(12.0), 128_000, 32_000, true, false, true),
        me("openai/gpt-5.2", "GPT-5.2", dec!(1.75), dec!(14.0), 400_000, 128_000, true, true, true),
        me("openai/gpt-5-mini", "GPT-5 Mini", dec!(0.25), dec!(2.0), 200_000, 65_000, false, false, false),
        me("openai/gpt-5-nano", "GPT-5 Nano", dec!(0.05), dec!(0.4), 128_000, 32_000, false, false, false),
        me("anthropic/claude-opus-4.6", "Claude Opus 4.6", dec!(5.0), dec!(25.0), 1_000_000, 128_000, true, true, true),
        me("anthropic/claude-sonnet-4", "Claude Sonnet 4", dec!(3.0), dec!(15.0), 200_000, 64_000, true, false, true),
        me("anthropic/claude-haiku-4.5", "Claude Haiku 4.5", dec!(1.0), dec!(5.0), 200_000, 8_000, false, false, true),
        me("google/gemini-3-pro-preview", "Gemini 3 Pro", dec!(2.0), dec!(12.0), 1_050_000, 65_000, true, true, false),
        me("google/gemini-2.5-pro", "Gemini 2.5 Pro", dec!(1.25), dec!(10.0), 1_050_000, 65_000, true, true, false),
        me("google/gemini-2.5-flash", "Gemini 2.5 Flash", dec!(0.15), dec!(0.6), 1_000_000, 65_000, false, false, false),
        me("deepseek/deepseek-chat", "DeepSeek V3.2", dec!(0.28), dec!(0.42), 128_000, 8_000, false, false, false),
        me("deepseek/deepseek-reasoner", "DeepSeek Reasoner", dec!(0.28), dec!(0.42), 128_000, 8_000, true, false, false),
        me("moonshot/kimi-k2.5", "Kimi K2.5", dec!(0.5), dec!(2.4), 262_000, 8_000, true, true, true),
        me("xai/grok-4-1-fast-reasoning", "Grok 4.1 Fast Reasoning", dec!(0.2), dec!(0.5), 131_000, 16_000, true, false, false),
        me("xai/grok-code-fast-1", "Grok Code Fast", dec!(0.2), dec!(1.5), 131_000, 16_000, false, false, true),
        me("xai/grok-4-0709", "Grok 4", dec!(0.2), dec!(1.5), 131_000, 16_000, true, false, false),
        me("nvidia/gpt-oss-120b", "NVIDIA GPT-OSS 120B", dec!(0.0), dec!(0.0), 128_000, 16_000, false, false, false),
        me("ollama/qwen3-coder:30b", "Qwen 3 Coder 30B", dec!(0.0), dec!(0.0), 128_000, 32_000, false, false, true),
        me("ollama/deepseek-r1:70b", "DeepSeek R1 70B", dec!(0.0), dec!(0.0), 128_000, 32_000, true, false, false),
        me("ollama/qwen2.5-coder:32b", "Qwen 2.5 Coder 32B", dec!(0.0), dec!(0.0), 128_000, 32_000, false, false, true),
        me("ollama/gemma3:27b", "Gemma 3 27B", dec!(0.0), dec!(0.0), 128_000, 16_000, false, false, false),
    ]
});

/// Short-name and legacy-id alias map, resolved before brand-prefix
/// stripping. Resolution is idempotent: `resolve(resolve(x)) == resolve(x)`.
pub static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("gpt-5", "openai/gpt-5.2"),
        ("gpt-5-codex", "openai/gpt-5.3-codex"),
        ("opus", "anthropic/claude-opus-4.6"),
        ("sonnet", "anthropic/claude-sonnet-4"),
        ("haiku", "anthropic/claude-haiku-4.5"),
        ("gemini", "google/gemini-2.5-pro"),
        ("gemini-flash", "google/gemini-2.5-flash"),
        ("deepseek", "deepseek/deepseek-chat"),
        ("grok", "xai/grok-4-0709"),
        ("kimi", "moonshot/kimi-k2.5"),
        ("free", "nvidia/gpt-oss-120b"),
    ])
});

const BRAND_PREFIX: &str = "blockrun/";

/// Routing-profile names, recognized specially by the proxy before model
/// alias resolution.
pub const ROUTING_PROFILE_NAMES: &[&str] = &["free", "eco", "auto", "premium"];

/// Lowercase/trim and strip a known brand prefix, without touching the
/// alias map. Used by the Proxy Core to recognize a routing-profile name
/// (`"free"` etc.) before alias resolution would otherwise consume it —
/// `"free"` is both a profile name and an alias target.
pub fn normalize_model_name(raw: &str) -> String {
    let normalized = raw.trim().to_lowercase();
    normalized.strip_prefix(BRAND_PREFIX).unwrap_or(&normalized).to_string()
}

/// Lowercase/trim, strip a known brand prefix if present, then resolve
/// through the alias map. Idempotent: running it again on the output is a
/// no-op, since the output is always either an unaliased catalog id or an
/// unknown string that isn't in [`ALIASES`] either.
pub fn resolve_alias(raw: &str) -> String {
    let stripped = normalize_model_name(raw);
    match ALIASES.get(stripped.as_str()) {
        Some(canonical) => canonical.to_string(),
        None => stripped,
    }
}

pub fn catalog_map() -> HashMap<String, ModelEntry> {
    MODEL_CATALOG.iter().map(|m| (m.id.clone(), m.clone())).collect()
}

fn tc(primary: &str, fallbacks: &[&str]) -> TierConfig {
    TierConfig {
        primary: primary.to_string(),
        fallbacks: fallbacks.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn default_auto_tiers() -> HashMap<Tier, TierConfig> {
    HashMap::from([
        (Tier::Simple, tc("ollama/qwen3-coder:30b", &["google/gemini-2.5-flash", "deepseek/deepseek-chat", "nvidia/gpt-oss-120b"])),
        (Tier::Medium, tc("ollama/qwen3-coder:30b", &["xai/grok-code-fast-1", "google/gemini-2.5-flash", "deepseek/deepseek-chat"])),
        (Tier::Complex, tc("ollama/deepseek-r1:70b", &["anthropic/claude-opus-4.6", "google/gemini-3-pro-preview", "openai/gpt-5.3-codex"])),
        (Tier::Reasoning, tc("ollama/deepseek-r1:70b", &["anthropic/claude-opus-4.6", "deepseek/deepseek-reasoner", "xai/grok-4-1-fast-reasoning"])),
    ])
}

pub fn default_eco_tiers() -> HashMap<Tier, TierConfig> {
    HashMap::from([
        (Tier::Simple, tc("ollama/qwen3-coder:30b", &["nvidia/gpt-oss-120b", "deepseek/deepseek-chat"])),
        (Tier::Medium, tc("ollama/qwen3-coder:30b", &["deepseek/deepseek-chat", "google/gemini-2.5-flash"])),
        (Tier::Complex, tc("ollama/deepseek-r1:70b", &["deepseek/deepseek-chat", "google/gemini-2.5-flash"])),
        (Tier::Reasoning, tc("ollama/deepseek-r1:70b", &["deepseek/deepseek-reasoner", "xai/grok-4-1-fast-reasoning"])),
    ])
}

pub fn default_premium_tiers() -> HashMap<Tier, TierConfig> {
    HashMap::from([
        (Tier::Simple, tc("anthropic/claude-haiku-4.5", &["ollama/qwen3-coder:30b", "google/gemini-2.5-flash"])),
        (Tier::Medium, tc("openai/gpt-5.3-codex", &["anthropic/claude-sonnet-4", "google/gemini-2.5-pro"])),
        (Tier::Complex, tc("anthropic/claude-opus-4.6", &["openai/gpt-5.3-codex", "anthropic/claude-sonnet-4", "google/gemini-3-pro-preview"])),
        (Tier::Reasoning, tc("anthropic/claude-opus-4.6", &["anthropic/claude-sonnet-4", "openai/gpt-5.2", "xai/grok-4-1-fast-reasoning"])),
    ])
}

pub fn default_agentic_tiers() -> HashMap<Tier, TierConfig> {
    HashMap::from([
        (Tier::Simple, tc("ollama/qwen3-coder:30b", &["anthropic/claude-haiku-4.5", "openai/gpt-5-nano"])),
        (Tier::Medium, tc("ollama/qwen3-coder:30b", &["xai/grok-code-fast-1", "anthropic/claude-haiku-4.5"])),
        (Tier::Complex, tc("anthropic/claude-opus-4.6", &["openai/gpt-5.3-codex", "anthropic/claude-sonnet-4", "google/gemini-3-pro-preview"])),
        (Tier::Reasoning, tc("anthropic/claude-opus-4.6", &["anthropic/claude-sonnet-4", "xai/grok-4-1-fast-reasoning", "deepseek/deepseek-reasoner"])),
    ])
}

/// The fixed premium reference model used for the baseline-cost
/// calculation: the `premium` profile's `REASONING.primary`.
pub fn premium_reference_model() -> &'static ModelEntry {
    static REF: Lazy<ModelEntry> =
        Lazy::new(|| MODEL_CATALOG.iter().find(|m| m.id == "anthropic/claude-opus-4.6").cloned().unwrap());
    &REF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_resolution_is_idempotent() {
        for raw in ["blockrun/opus", "OPUS", "  Gemini  ", "openai/gpt-5.2"] {
            let once = resolve_alias(raw);
            let twice = resolve_alias(&once);
            assert_eq!(once, twice, "resolving '{raw}' twice should be a fixed point");
        }
    }

    #[test]
    fn brand_prefix_is_stripped() {
        assert_eq!(resolve_alias("blockrun/auto"), "auto");
    }

    #[test]
    fn unknown_model_passes_through_lowercased() {
        assert_eq!(resolve_alias("Some/Unknown-Model"), "some/unknown-model");
    }

    #[test]
    fn no_retired_models_in_catalog() {
        let map = catalog_map();
        assert!(!map.contains_key("openai/gpt-4o"));
        assert!(map.contains_key("openai/gpt-5.3-codex"));
    }
}
