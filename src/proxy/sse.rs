//! SSE transcoding: when the client asked for
//! `stream:true` but the upstream is always called non-streaming,
//! synthesize SSE chunks from the buffered completion JSON. Also owns the
//! heartbeat comment and `[DONE]` terminator.

use std::sync::LazyLock as Lazy;

use regex::Regex;
use serde_json::{Value, json};

pub const HEARTBEAT_LINE: &str = ": heartbeat\n\n";
pub const DONE_LINE: &str = "data: [DONE]\n\n";

static THINK_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>|<reasoning>.*?</reasoning>").expect("static regex"));

/// Strip `<think>...</think>` / `<reasoning>...</reasoning>` reasoning-token
/// tags from assistant content before it reaches the client.
pub fn strip_reasoning_tags(text: &str) -> String {
    THINK_TAG_RE.replace_all(text, "").to_string()
}

fn sse_line(chunk: &Value) -> String {
    format!("data: {}\n\n", chunk)
}

/// Synthesize the ordered SSE chunk sequence for one buffered completion:
/// `{delta:{role}}` -> `{delta:{content}}` -> optional `{delta:{tool_calls}}`
/// -> `{finish_reason}`, each chunk JSON-encoded as its own `data:` line.
/// Does not include the heartbeat or the terminating `[DONE]` line.
pub fn chunks_for_completion(completion: &Value, model: &str) -> Vec<String> {
    let choice = completion.get("choices").and_then(Value::as_array).and_then(|c| c.first());
    let message = choice.and_then(|c| c.get("message"));
    let content = message
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(strip_reasoning_tags)
        .unwrap_or_default();
    let tool_calls = message.and_then(|m| m.get("tool_calls")).cloned();
    let finish_reason = choice
        .and_then(|c| c.get("finish_reason"))
        .and_then(Value::as_str)
        .unwrap_or("stop")
        .to_string();

    let mut lines = Vec::with_capacity(4);
    lines.push(sse_line(&chunk_envelope(model, json!({"delta": {"role": "assistant"}, "finish_reason": Value::Null}))));
    if !content.is_empty() {
        lines.push(sse_line(&chunk_envelope(model, json!({"delta": {"content": content}, "finish_reason": Value::Null}))));
    }
    if let Some(tool_calls) = tool_calls {
        lines.push(sse_line(&chunk_envelope(model, json!({"delta": {"tool_calls": tool_calls}, "finish_reason": Value::Null}))));
    }
    lines.push(sse_line(&chunk_envelope(model, json!({"delta": {}, "finish_reason": finish_reason}))));
    lines
}

fn chunk_envelope(model: &str, choice_fields: Value) -> Value {
    json!({
        "object": "chat.completion.chunk",
        "model": model,
        "choices": [choice_fields],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_think_tags() {
        let text = "<think>internal musing</think>The answer is 4.";
        assert_eq!(strip_reasoning_tags(text), "The answer is 4.");
    }

    #[test]
    fn chunk_sequence_ends_with_finish_reason() {
        let completion = json!({
            "choices": [{"message": {"content": "hi there"}, "finish_reason": "stop"}]
        });
        let lines = chunks_for_completion(&completion, "m");
        assert!(lines.first().unwrap().contains("\"role\":\"assistant\""));
        assert!(lines.iter().any(|l| l.contains("hi there")));
        assert!(lines.last().unwrap().contains("\"finish_reason\":\"stop\""));
    }

    #[test]
    fn tool_calls_are_included_when_present() {
        let completion = json!({
            "choices": [{"message": {"content": null, "tool_calls": [{"id": "t1"}]}, "finish_reason": "tool_calls"}]
        });
        let lines = chunks_for_completion(&completion, "m");
        assert!(lines.iter().any(|l| l.contains("tool_calls")));
    }
}
