//! OpenAI-compatible chat-completion wire types shared by the classifier,
//! the per-attempt normalizer, and the SSE transcoder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A chat message role. Unknown roles round-trip via `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    /// Google's name for the assistant turn in its own wire format.
    Model,
    #[serde(other)]
    Other,
}

/// A single chat message. `content` is left as a [`Value`] since providers
/// accept both a plain string and a structured content-part array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Any provider-specific fields we don't model explicitly.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ChatMessage {
    /// Best-effort plain-text rendering of `content`, used by the
    /// classifier and by dedup/cache canonicalization.
    pub fn content_text(&self) -> String {
        match &self.content {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        }
    }
}

/// A parsed `/v1/chat/completions`-shaped request body. Fields not modeled
/// here are preserved in `extra` and forwarded upstream untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_thinking: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ChatCompletionRequest {
    /// Prompt text used for classification: the last `user` message.
    pub fn classifier_prompt(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content_text())
            .unwrap_or_default()
    }

    /// System-prompt text used for classification: the first `system` message.
    pub fn classifier_system_prompt(&self) -> String {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content_text())
            .unwrap_or_default()
    }

    /// `ceil(byte_length / 4)` over the combined system+user text, used
    /// whenever no provider-reported token count is available.
    pub fn estimated_input_tokens(&self) -> u64 {
        let total_bytes: usize = self
            .messages
            .iter()
            .map(|m| m.content_text().len())
            .sum();
        ((total_bytes + 3) / 4) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_last_user_message_as_prompt() {
        let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": "auto",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "ok"},
                {"role": "user", "content": "second"},
            ],
        }))
        .unwrap();
        assert_eq!(req.classifier_prompt(), "second");
        assert_eq!(req.classifier_system_prompt(), "be terse");
    }

    #[test]
    fn unknown_fields_round_trip_via_extra() {
        let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": "auto",
            "messages": [],
            "some_future_field": 42,
        }))
        .unwrap();
        assert_eq!(req.extra.get("some_future_field").unwrap(), 42);
    }
}
