//! Degraded-response detection: a 200 response whose
//! body is indistinguishable from a provider error, or a known
//! repetition-loop failure, is downgraded to a retryable "provider error"
//! so the fallback loop advances past it.

use serde_json::Value;
use std::sync::LazyLock as Lazy;

use regex::Regex;

use crate::config::DegradedResponseConfig;

const OVERLOAD_PLACEHOLDER: &str = "AI service is temporarily overloaded";

/// Known repetition-loop failure signatures observed from misbehaving
/// upstream models.
const REPETITION_SIGNATURES: &[&str] = &["the boxed is the response", "the response is the text"];

/// Patterns (case-insensitive) that mark a response body as a provider-side
/// error rather than a genuine answer.
pub static PROVIDER_ERROR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        "billing",
        "insufficient.*balance",
        "credits",
        "quota",
        "rate.?limit",
        "model.*unavailable",
        "service.*unavailable",
        "capacity",
        "overloaded",
        "temporarily.*unavailable",
        "request too large",
        "payload too large",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("static provider-error pattern is valid"))
    .collect()
});

/// HTTP statuses that are always treated as a provider error in the
/// fallback loop.
pub const PROVIDER_ERROR_STATUSES: &[u16] =
    &[400, 401, 402, 403, 413, 429, 500, 502, 503, 504];

pub fn matches_provider_error_pattern(text: &str) -> bool {
    PROVIDER_ERROR_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Is `status` + `body` a provider error for fallback-loop purposes? Either
/// a status in [`PROVIDER_ERROR_STATUSES`], or (for a non-error body) text
/// matching one of [`PROVIDER_ERROR_PATTERNS`].
pub fn is_provider_error(status: u16, body: &[u8]) -> bool {
    if PROVIDER_ERROR_STATUSES.contains(&status) {
        return true;
    }
    matches_provider_error_pattern(&String::from_utf8_lossy(body))
}

/// Does a nominally-successful (200) response body look degraded?
/// Checked against the overload placeholder, known repetition-loop
/// signatures, line-repetition statistics, and an embedded error object.
pub fn is_degraded(body: &Value, config: &DegradedResponseConfig) -> bool {
    let text = extract_assistant_text(body);
    if text.contains(OVERLOAD_PLACEHOLDER) {
        return true;
    }

    let signature_hits = REPETITION_SIGNATURES.iter().filter(|sig| text.to_lowercase().contains(*sig)).count();
    if signature_hits >= 2 {
        return true;
    }

    if is_repetitive_text(&text, config) {
        return true;
    }

    if let Some(error) = body.get("error") {
        let error_text = error.to_string();
        if matches_provider_error_pattern(&error_text) {
            return true;
        }
    }

    false
}

fn extract_assistant_text(body: &Value) -> String {
    body.get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// `max-repeat >= 3 AND unique-ratio <= threshold` over trimmed, non-empty
/// lines, with at least `min_lines` such lines. Thresholds are named
/// constants, overridable via config.
fn is_repetitive_text(text: &str, config: &DegradedResponseConfig) -> bool {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.len() < config.min_lines {
        return false;
    }

    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for line in &lines {
        *counts.entry(line).or_insert(0) += 1;
    }
    let max_repeat = counts.values().copied().max().unwrap_or(0);
    let unique_ratio = counts.len() as f64 / lines.len() as f64;

    max_repeat >= config.max_repeat && unique_ratio <= config.unique_ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg() -> DegradedResponseConfig {
        DegradedResponseConfig { max_repeat: 3, unique_ratio: 0.45, min_lines: 8 }
    }

    #[test]
    fn overload_placeholder_is_degraded() {
        let body = json!({"choices":[{"message":{"content": "AI service is temporarily overloaded, try later"}}]});
        assert!(is_degraded(&body, &cfg()));
    }

    #[test]
    fn normal_answer_is_not_degraded() {
        let body = json!({"choices":[{"message":{"content": "Paris is the capital of France."}}]});
        assert!(!is_degraded(&body, &cfg()));
    }

    #[test]
    fn two_repetition_signatures_trigger_degraded() {
        let body = json!({"choices":[{"message":{"content":
            "the boxed is the response to this.\nthe response is the text you asked for."
        }}]});
        assert!(is_degraded(&body, &cfg()));
    }

    #[test]
    fn repetitive_lines_trigger_degraded() {
        let repeated = (0..10).map(|_| "loop line").collect::<Vec<_>>().join("\n");
        let body = json!({"choices":[{"message":{"content": repeated}}]});
        assert!(is_degraded(&body, &cfg()));
    }

    #[test]
    fn embedded_error_object_matching_pattern_is_degraded() {
        let body = json!({"error": {"message": "quota exceeded for this account"}});
        assert!(is_degraded(&body, &cfg()));
    }

    #[test]
    fn provider_error_status_is_detected() {
        assert!(is_provider_error(429, b"{}"));
        assert!(is_provider_error(200, b"billing issue detected"));
        assert!(!is_provider_error(200, b"all good"));
    }
}
