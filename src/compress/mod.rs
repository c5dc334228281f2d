//! Context compression: optional, off by default, applied only once the
//! per-attempt body exceeds a size threshold. Exact-hash message dedup
//! (not shingle/Jaccard near-duplicate detection) plus CJK-aware token
//! estimation for deciding when compression is warranted.

use std::collections::HashSet;

use serde_json::Value;

use crate::llm::{ChatMessage, Role};

#[derive(Debug, Clone, Copy, Default)]
pub struct CompressionStats {
    pub messages_before: usize,
    pub messages_after: usize,
    pub bytes_before: usize,
    pub bytes_after: usize,
}

/// Apply the compression pipeline if `body_len` exceeds `threshold_bytes`;
/// otherwise return the messages unchanged.
pub fn compress_if_over_threshold(
    messages: &[ChatMessage],
    body_len: usize,
    threshold_bytes: usize,
) -> (Vec<ChatMessage>, CompressionStats) {
    let bytes_before = body_len;
    if body_len <= threshold_bytes {
        return (
            messages.to_vec(),
            CompressionStats { messages_before: messages.len(), messages_after: messages.len(), bytes_before, bytes_after: bytes_before },
        );
    }

    let deduped = dedup_exact(messages);
    let compacted: Vec<ChatMessage> = deduped.into_iter().map(normalize_and_compact).collect();
    let bytes_after = compacted.iter().map(|m| m.content_text().len()).sum();
    let messages_after = compacted.len();

    (
        compacted,
        CompressionStats { messages_before: messages.len(), messages_after, bytes_before, bytes_after },
    )
}

/// Remove exact-content duplicate messages, keeping the first occurrence.
/// Messages of different roles are never considered duplicates of one
/// another; `system` messages are never deduplicated.
fn dedup_exact(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut seen: HashSet<(String, u64)> = HashSet::new();
    let mut kept = Vec::with_capacity(messages.len());
    for message in messages {
        if message.role == Role::System {
            kept.push(message.clone());
            continue;
        }
        let role_key = format!("{:?}", message.role);
        let content_hash = hash_str(&message.content_text());
        if seen.insert((role_key, content_hash)) {
            kept.push(message.clone());
        }
    }
    kept
}

/// Whitespace-normalize a message's text content, and if a tool message's
/// content looks like JSON, compact it (drop insignificant whitespace).
fn normalize_and_compact(mut message: ChatMessage) -> ChatMessage {
    let text = message.content_text();
    if text.is_empty() {
        return message;
    }

    let normalized = normalize_whitespace(&text);
    let final_text = if message.role == Role::Tool {
        compact_json(&normalized).unwrap_or(normalized)
    } else {
        normalized
    };

    message.content = Some(Value::String(final_text));
    message
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Re-serialize `text` without insignificant whitespace if it parses as
/// JSON; `None` if it doesn't look like JSON at all.
fn compact_json(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    serde_json::to_string(&value).ok()
}

/// FNV-1a string hash, stable across runs and process restarts.
fn hash_str(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// CJK-aware token estimate for a single piece of text (ASCII ~4
/// chars/token, CJK ~1.5 chars/token).
pub fn estimate_tokens(text: &str) -> usize {
    let mut ascii_chars = 0usize;
    let mut cjk_chars = 0usize;
    for ch in text.chars() {
        if is_cjk(ch) {
            cjk_chars += 1;
        } else {
            ascii_chars += 1;
        }
    }
    let ascii_tokens = ascii_chars / 4;
    let cjk_tokens = (cjk_chars as f64 / 1.5).ceil() as usize;
    ascii_tokens + cjk_tokens + 4
}

fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{4e00}'..='\u{9fff}' |
        '\u{3400}'..='\u{4dbf}' |
        '\u{3000}'..='\u{303f}' |
        '\u{ff00}'..='\u{ffef}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage {
            role,
            content: Some(Value::String(content.to_string())),
            name: None,
            tool_call_id: None,
            tool_calls: None,
            reasoning_content: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn below_threshold_is_unchanged() {
        let messages = vec![msg(Role::User, "hi")];
        let (out, stats) = compress_if_over_threshold(&messages, 100, 1000);
        assert_eq!(out.len(), 1);
        assert_eq!(stats.messages_before, stats.messages_after);
    }

    #[test]
    fn exact_duplicate_user_messages_are_deduped() {
        let messages = vec![msg(Role::User, "please help"), msg(Role::Assistant, "ok"), msg(Role::User, "please help")];
        let (out, _) = compress_if_over_threshold(&messages, 1_000_000, 10);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn system_messages_are_never_deduped() {
        let messages = vec![msg(Role::System, "be terse"), msg(Role::System, "be terse")];
        let (out, _) = compress_if_over_threshold(&messages, 1_000_000, 10);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn different_roles_same_content_both_kept() {
        let messages = vec![msg(Role::User, "same text"), msg(Role::Assistant, "same text")];
        let (out, _) = compress_if_over_threshold(&messages, 1_000_000, 10);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn whitespace_is_normalized() {
        let messages = vec![msg(Role::User, "hello   \n\n  world")];
        let (out, _) = compress_if_over_threshold(&messages, 1_000_000, 10);
        assert_eq!(out[0].content_text(), "hello world");
    }

    #[test]
    fn tool_message_json_content_is_compacted() {
        let raw = json!({"a": 1, "b": [1,2,3]}).to_string();
        let pretty = format!("  {}  \n", serde_json::to_string_pretty(&json!({"a":1,"b":[1,2,3]})).unwrap());
        let messages = vec![msg(Role::Tool, &pretty)];
        let (out, _) = compress_if_over_threshold(&messages, 1_000_000, 10);
        assert_eq!(out[0].content_text(), raw);
    }

    #[test]
    fn cjk_text_estimates_fewer_chars_per_token() {
        let ascii = estimate_tokens("aaaaaaaaaaaaaaaa");
        let cjk = estimate_tokens("中中中中中中中中中中中中中中中中");
        assert!(cjk > ascii);
    }
}
