use super::*;
use crate::notify::DEFAULT_HEADER_TEMPLATE;
use chrono::DateTime;
use serde_json::{Value, json};

// ===================================================================
// Test helpers
// ===================================================================

fn entry(value: Value) -> TranscriptEntry {
    match value {
        Value::Object(map) => TranscriptEntry::new(map),
        other => panic!("expected object, got {other}"),
    }
}

/// Assistant entry with the given content blocks.
fn asst_entry(content: Value) -> TranscriptEntry {
    entry(json!({
        "type": "assistant",
        "sessionId": "s",
        "message": {
            "role": "assistant",
            "model": "claude-sonnet-4-20250514",
            "content": content,
            "usage": { "input_tokens": 12, "output_tokens": 34 }
        }
    }))
}

fn message_ctx(template: &str) -> MessageContext<'_> {
    MessageContext {
        header_template: template,
        max_length: 4096,
        project_dir: Some("/work/app"),
        session_id: Some("abc"),
        now: DateTime::parse_from_rfc3339("2025-01-01T00:00:00+00:00").unwrap(),
    }
}

// ===================================================================
// decide_output
// ===================================================================

#[test]
fn no_entry_means_nothing_to_persist() {
    assert_eq!(decide_output(None), OutputDecision::NoAssistantMessage);
}

#[test]
fn tool_only_reply_has_no_text() {
    let e = asst_entry(json!([{"type": "tool_use", "id": "t", "name": "Bash", "input": {}}]));
    assert_eq!(decide_output(Some(&e)), OutputDecision::NoText);
}

#[test]
fn empty_text_block_has_no_text() {
    let e = asst_entry(json!([{"type": "text", "text": ""}]));
    assert_eq!(decide_output(Some(&e)), OutputDecision::NoText);
}

#[test]
fn text_reply_is_persisted_with_metadata() {
    let e = asst_entry(json!([{"type": "text", "text": "All done."}]));
    match decide_output(Some(&e)) {
        OutputDecision::Persist { output, meta } => {
            assert_eq!(output, "All done.");
            assert_eq!(meta.model.as_deref(), Some("claude-sonnet-4-20250514"));
            assert_eq!(meta.input_tokens, Some(12));
            assert_eq!(meta.output_tokens, Some(34));
        }
        other => panic!("expected Persist, got {other:?}"),
    }
}

// ===================================================================
// decide_notification
// ===================================================================

#[test]
fn notification_mirrors_output_decision() {
    let ctx = message_ctx(DEFAULT_HEADER_TEMPLATE);
    assert_eq!(
        decide_notification(None, &ctx).unwrap(),
        NotifyDecision::NoAssistantMessage
    );
    let e = asst_entry(json!([]));
    assert_eq!(decide_notification(Some(&e), &ctx).unwrap(), NotifyDecision::NoText);
}

#[test]
fn notification_carries_formatted_text() {
    let e = asst_entry(json!([
        {"type": "text", "text": "Line one"},
        {"type": "text", "text": "Line two"}
    ]));
    match decide_notification(Some(&e), &message_ctx(DEFAULT_HEADER_TEMPLATE)).unwrap() {
        NotifyDecision::Send(msg) => {
            assert!(msg.starts_with("🤖 *Claude Code*\n"));
            assert!(msg.contains("📁 `/work/app`"));
            assert!(msg.ends_with("```\nLine one\nLine two\n```"));
        }
        other => panic!("expected Send, got {other:?}"),
    }
}

#[test]
fn bad_template_is_a_decision_error() {
    let e = asst_entry(json!([{"type": "text", "text": "hi"}]));
    let err = decide_notification(Some(&e), &message_ctx("{{ unclosed")).unwrap_err();
    assert!(err.to_string().starts_with("template render error:"));
}

#[test]
fn bad_template_is_not_reached_without_text() {
    assert_eq!(
        decide_notification(None, &message_ctx("{{ unclosed")).unwrap(),
        NotifyDecision::NoAssistantMessage
    );
}
