//! Per-attempt model normalization: applied fresh for
//! every candidate in the fallback loop, since different upstream models
//! tolerate different message shapes.

use serde_json::Value;

use crate::llm::{ChatMessage, Role};
use crate::routing::ModelEntry;

const MAX_MESSAGES: usize = 200;
const GOOGLE_CONTINUATION_PLACEHOLDER: &str = "(continuing conversation)";

/// Truncate to the last `max_messages` messages, always keeping every
/// `system` message regardless of position.
pub fn truncate_messages(messages: Vec<ChatMessage>, max_messages: usize) -> Vec<ChatMessage> {
    if messages.len() <= max_messages {
        return messages;
    }
    let (system, rest): (Vec<ChatMessage>, Vec<ChatMessage>) =
        messages.into_iter().partition(|m| m.role == Role::System);
    let keep_from_rest = max_messages.saturating_sub(system.len());
    let tail: Vec<ChatMessage> = rest.into_iter().rev().take(keep_from_rest).rev().collect();
    let mut out = system;
    out.extend(tail);
    out
}

/// Replace any character outside `[A-Za-z0-9_-]` in a tool-call id with `_`.
pub fn sanitize_tool_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn sanitize_tool_ids_in_messages(messages: &mut [ChatMessage]) {
    for message in messages.iter_mut() {
        if let Some(id) = &message.tool_call_id {
            message.tool_call_id = Some(sanitize_tool_id(id));
        }
        if let Some(Value::Array(calls)) = &mut message.tool_calls {
            for call in calls.iter_mut() {
                if let Some(id) = call.get("id").and_then(Value::as_str) {
                    let sanitized = sanitize_tool_id(id);
                    if let Some(obj) = call.as_object_mut() {
                        obj.insert("id".to_string(), Value::String(sanitized));
                    }
                }
            }
        }
    }
}

/// If the first non-`system` message has role `assistant` (Google models
/// also accept `model`), insert a placeholder `user` message before it —
/// Google's API rejects a conversation that doesn't open with a user turn.
fn insert_google_leading_user_message(messages: &mut Vec<ChatMessage>) {
    let first_non_system = messages.iter().position(|m| m.role != Role::System);
    let Some(idx) = first_non_system else { return };
    if matches!(messages[idx].role, Role::Assistant | Role::Model) {
        messages.insert(
            idx,
            ChatMessage {
                role: Role::User,
                content: Some(Value::String(GOOGLE_CONTINUATION_PLACEHOLDER.to_string())),
                name: None,
                tool_call_id: None,
                tool_calls: None,
                reasoning_content: None,
                extra: Default::default(),
            },
        );
    }
}

/// Add an empty `reasoning_content` to assistant messages carrying tool
/// calls, when the target model is a reasoning model that expects the field.
fn add_reasoning_content_for_tool_calls(messages: &mut [ChatMessage]) {
    for message in messages.iter_mut() {
        if message.role == Role::Assistant && message.tool_calls.is_some() && message.reasoning_content.is_none() {
            message.reasoning_content = Some(String::new());
        }
    }
}

/// Apply the full per-attempt normalization pipeline for `target_model`.
pub fn normalize_for_attempt(mut messages: Vec<ChatMessage>, target_model: &ModelEntry) -> Vec<ChatMessage> {
    messages = truncate_messages(messages, MAX_MESSAGES);
    sanitize_tool_ids_in_messages(&mut messages);
    if target_model.id.starts_with("google/") {
        insert_google_leading_user_message(&mut messages);
    }
    if target_model.capabilities.reasoning {
        add_reasoning_content_for_tool_calls(&mut messages);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn truncate_keeps_all_system_messages() {
        let mut messages = vec![msg(Role::System, "sys")];
        for i in 0..250 {
            messages.push(msg(Role::User, &format!("m{i}")));
        }
        let out = truncate_messages(messages, 200);
        assert_eq!(out.iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(out.len(), 200);
    }

    #[test]
    fn truncate_keeps_last_messages_in_order() {
        let messages = vec![msg(Role::User, "a"), msg(Role::User, "b"), msg(Role::User, "c")];
        let out = truncate_messages(messages, 2);
        assert_eq!(out[0].content_text(), "b");
        assert_eq!(out[1].content_text(), "c");
    }

    #[test]
    fn sanitize_tool_id_replaces_invalid_chars() {
        assert_eq!(sanitize_tool_id("call:123/abc"), "call_123_abc");
        assert_eq!(sanitize_tool_id("call-123_abc"), "call-123_abc");
    }

    #[test]
    fn google_insertion_only_when_leading_assistant() {
        let mut messages = vec![msg(Role::Assistant, "hi")];
        insert_google_leading_user_message(&mut messages);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content_text(), GOOGLE_CONTINUATION_PLACEHOLDER);

        let mut already_user = vec![msg(Role::User, "hi")];
        insert_google_leading_user_message(&mut already_user);
        assert_eq!(already_user.len(), 1);
    }

    #[test]
    fn google_insertion_also_triggers_on_model_role() {
        let mut messages = vec![msg(Role::Model, "hi")];
        insert_google_leading_user_message(&mut messages);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
    }
}
