//! 15-dimension weighted classification with sigmoid confidence
//! calibration. Pure function, <1ms, no external calls.

use std::sync::LazyLock as Lazy;

use regex::Regex;

use super::Tier;
use super::keywords::*;
use crate::config::RoutingConfig;

static MULTI_STEP_RE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)first.*then").unwrap(),
        Regex::new(r"(?i)step \d").unwrap(),
        Regex::new(r"\d\.\s").unwrap(),
    ]
});

fn count_matches(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| text.contains(*kw)).count()
}

fn dimension_score(count: usize, low: usize, high: usize, low_val: f64, high_val: f64) -> f64 {
    if count >= high {
        high_val
    } else if count >= low {
        low_val
    } else {
        0.0
    }
}

pub fn sigmoid(x: f64, steepness: f64) -> f64 {
    1.0 / (1.0 + (-steepness * x).exp())
}

/// Result of the 15-dimension classification.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// `None` when confidence fell below the threshold ("ambiguous").
    pub tier: Option<Tier>,
    pub confidence: f64,
    pub weighted_score: f64,
    pub agentic_score: f64,
    pub signals: Vec<String>,
}

/// Classify a request using the 15-dimension weighted scoring system
///. Total and deterministic: empty prompts score 0.
pub fn classify(prompt: &str, system_prompt: &str, config: &RoutingConfig) -> ClassificationResult {
    let full = format!("{system_prompt} {prompt}").to_lowercase();
    let user = prompt.to_lowercase();

    let mut signals = Vec::new();
    let mut weighted_score = 0.0;

    // 1. tokenCount (weight 0.08)
    let token_est = (full.len() + 3) / 4;
    let tc_score = if token_est < 50 {
        -1.0
    } else if token_est > 500 {
        1.0
    } else {
        0.0
    };
    weighted_score += tc_score * 0.08;
    if tc_score != 0.0 {
        signals.push(format!("tokens:{token_est}"));
    }

    // 2. codePresence (weight 0.15)
    let code_count = count_matches(&full, CODE_KEYWORDS);
    weighted_score += dimension_score(code_count, 1, 2, 0.5, 1.0) * 0.15;
    if code_count > 0 {
        signals.push(format!("code:{code_count}"));
    }

    // 3. reasoningMarkers — user text only (weight 0.18)
    let reasoning_count = count_matches(&user, REASONING_KEYWORDS);
    weighted_score += dimension_score(reasoning_count, 1, 2, 0.7, 1.0) * 0.18;
    if reasoning_count > 0 {
        signals.push(format!("reasoning:{reasoning_count}"));
    }

    // 4. technicalTerms (weight 0.10)
    let tech_count = count_matches(&full, TECHNICAL_KEYWORDS);
    weighted_score += dimension_score(tech_count, 2, 4, 0.5, 1.0) * 0.10;
    if tech_count > 0 {
        signals.push(format!("technical:{tech_count}"));
    }

    // 5. creativeMarkers (weight 0.05)
    let creative_count = count_matches(&full, CREATIVE_KEYWORDS);
    weighted_score += dimension_score(creative_count, 1, 2, 0.5, 0.7) * 0.05;

    // 6. simpleIndicators (weight 0.02) — pulls score down
    let simple_count = count_matches(&full, SIMPLE_KEYWORDS);
    weighted_score += (if simple_count > 0 { -1.0 } else { 0.0 }) * 0.02;

    // 7. multiStepPatterns (weight 0.12)
    let multi_count = MULTI_STEP_RE.iter().filter(|re| re.is_match(&full)).count();
    weighted_score += (if multi_count > 0 { 0.5 } else { 0.0 }) * 0.12;
    if multi_count > 0 {
        signals.push(format!("multistep:{multi_count}"));
    }

    // 8. questionComplexity (weight 0.05)
    let q_count = full.matches('?').count();
    weighted_score += (if q_count >= 4 { 0.5 } else { 0.0 }) * 0.05;

    // 9. imperativeVerbs (weight 0.03)
    let imp_count = count_matches(&full, IMPERATIVE_KEYWORDS);
    weighted_score += dimension_score(imp_count, 1, 2, 0.3, 0.5) * 0.03;

    // 10. constraintCount (weight 0.04)
    let con_count = count_matches(&full, CONSTRAINT_KEYWORDS);
    weighted_score += dimension_score(con_count, 1, 3, 0.3, 0.7) * 0.04;

    // 11. outputFormat (weight 0.03)
    let fmt_count = count_matches(&full, OUTPUT_FORMAT_KEYWORDS);
    weighted_score += dimension_score(fmt_count, 1, 2, 0.4, 0.7) * 0.03;

    // 12. referenceComplexity (weight 0.02)
    let ref_count = count_matches(&full, REFERENCE_KEYWORDS);
    weighted_score += dimension_score(ref_count, 1, 2, 0.3, 0.5) * 0.02;

    // 13. negationComplexity (weight 0.01)
    let neg_count = count_matches(&full, NEGATION_KEYWORDS);
    weighted_score += dimension_score(neg_count, 2, 3, 0.3, 0.5) * 0.01;

    // 14. domainSpecificity (weight 0.02)
    let dom_count = count_matches(&full, DOMAIN_KEYWORDS);
    weighted_score += dimension_score(dom_count, 1, 2, 0.5, 0.8) * 0.02;

    // 15. agenticTask (weight 0.04)
    let ag_count = count_matches(&full, AGENTIC_KEYWORDS);
    let ag_score = if ag_count >= 4 {
        1.0
    } else if ag_count >= 3 {
        0.6
    } else if ag_count >= 1 {
        0.2
    } else {
        0.0
    };
    weighted_score += ag_score * 0.04;
    let agentic_score = (ag_count as f64 / AGENTIC_KEYWORDS.len() as f64).min(1.0);
    if ag_count > 0 {
        signals.push(format!("agentic:{ag_count}"));
    }

    // Direct REASONING override: >=2 reasoning markers in user text.
    if reasoning_count >= 2 {
        let confidence = sigmoid(weighted_score.max(0.3), config.sigmoid_steepness).max(0.85);
        signals.push("reasoning-override".to_string());
        return ClassificationResult {
            tier: Some(Tier::Reasoning),
            confidence,
            weighted_score,
            agentic_score,
            signals,
        };
    }

    let [b1, b2, b3] = config.tier_boundaries;
    let tier = if weighted_score < b1 {
        Tier::Simple
    } else if weighted_score < b2 {
        Tier::Medium
    } else if weighted_score < b3 {
        Tier::Complex
    } else {
        Tier::Reasoning
    };

    let min_distance = [b1, b2, b3]
        .iter()
        .map(|b| (weighted_score - b).abs())
        .fold(f64::MAX, f64::min);
    let confidence = sigmoid(min_distance, config.sigmoid_steepness);
    let tier_opt = if confidence < config.confidence_threshold {
        None
    } else {
        Some(tier)
    };

    ClassificationResult {
        tier: tier_opt,
        confidence,
        weighted_score,
        agentic_score,
        signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RoutingConfig {
        RoutingConfig::default()
    }

    #[test]
    fn simple_greeting_scores_below_zero() {
        let r = classify("hello", "", &cfg());
        assert!(r.weighted_score < 0.0, "got {}", r.weighted_score);
    }

    #[test]
    fn code_request_scores_above_zero() {
        let r = classify("implement a function that sorts an array using async await", "", &cfg());
        assert!(r.weighted_score > 0.0, "got {}", r.weighted_score);
    }

    #[test]
    fn reasoning_override_forces_reasoning_with_high_confidence() {
        let r = classify("prove the theorem step by step and derive the proof logically", "", &cfg());
        assert_eq!(r.tier, Some(Tier::Reasoning));
        assert!(r.confidence >= 0.85);
    }

    #[test]
    fn agentic_detection_is_positive_for_agentic_prompt() {
        let r = classify("read the file, fix the bug, deploy it, make sure it works, verify", "", &cfg());
        assert!(r.agentic_score > 0.0);
    }

    #[test]
    fn classification_is_deterministic() {
        let a = classify("explain how kubernetes works", "", &cfg());
        let b = classify("explain how kubernetes works", "", &cfg());
        assert_eq!(a.tier, b.tier);
        assert_eq!(a.weighted_score, b.weighted_score);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn empty_prompt_is_simple_with_no_panic() {
        let r = classify("", "", &cfg());
        assert_eq!(r.weighted_score, 0.0);
    }

    #[test]
    fn multilingual_reasoning_keywords_trigger_override() {
        let r = classify("证明 这个定理 逐步推导 并给出证明", "", &cfg());
        assert_eq!(r.tier, Some(Tier::Reasoning));
    }
}
