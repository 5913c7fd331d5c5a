use super::*;
use serde_json::json;

// Helper to build the common fields every hook input needs.
fn common_fields() -> serde_json::Value {
    json!({
        "session_id": "sess-1",
        "transcript_path": "/tmp/transcript.jsonl",
        "cwd": "/home/user/project",
        "permission_mode": "default"
    })
}

fn merge(base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    let mut map = base.as_object().unwrap().clone();
    map.extend(extra.as_object().unwrap().clone());
    serde_json::Value::Object(map)
}

// =================================================================
// Deserialization
// =================================================================

#[test]
fn deserialize_user_prompt_submit() {
    let input = merge(
        common_fields(),
        json!({
            "hook_event_name": "UserPromptSubmit",
            "prompt": "Write a factorial function"
        }),
    );
    let parsed = parse_hook_input(&input.to_string(), &[HookEvent::UserPromptSubmit]).unwrap();
    match parsed {
        HookInput::UserPromptSubmit(e) => {
            assert_eq!(e.prompt, "Write a factorial function");
            assert_eq!(e.common.session_id(), Some("sess-1"));
            assert_eq!(e.common.cwd.as_deref(), Some("/home/user/project"));
        }
        other => panic!("expected UserPromptSubmit, got {other:?}"),
    }
}

#[test]
fn deserialize_stop_with_unknown_fields() {
    let input = merge(
        common_fields(),
        json!({
            "hook_event_name": "Stop",
            "stop_hook_active": true,
            "something_new": {"nested": 1}
        }),
    );
    let parsed = parse_hook_input(&input.to_string(), &[HookEvent::Stop]).unwrap();
    match parsed {
        HookInput::Stop(e) => assert_eq!(e.stop_hook_active, Some(true)),
        other => panic!("expected Stop, got {other:?}"),
    }
}

#[test]
fn session_id_and_cwd_are_optional() {
    let input = json!({
        "hook_event_name": "Stop",
        "transcript_path": "/tmp/t.jsonl"
    });
    let parsed = parse_hook_input(&input.to_string(), &[HookEvent::Stop]).unwrap();
    assert!(parsed.common().session_id().is_none());
    assert!(parsed.common().cwd.is_none());
}

#[test]
fn empty_session_id_reads_as_absent() {
    let input = json!({
        "hook_event_name": "Stop",
        "transcript_path": "/tmp/t.jsonl",
        "session_id": ""
    });
    let parsed = parse_hook_input(&input.to_string(), &[HookEvent::Stop]).unwrap();
    assert!(parsed.common().session_id().is_none());
}

#[test]
fn notification_accepted_alongside_stop() {
    let input = merge(
        common_fields(),
        json!({
            "hook_event_name": "Notification",
            "message": "Claude needs your permission",
        }),
    );
    let accepted = [HookEvent::Stop, HookEvent::Notification];
    let parsed = parse_hook_input(&input.to_string(), &accepted).unwrap();
    assert_eq!(parsed.event(), HookEvent::Notification);
}

// =================================================================
// Validation failures
// =================================================================

#[test]
fn rejects_invalid_json() {
    let err = parse_hook_input("not json", &[HookEvent::Stop]).unwrap_err();
    assert!(matches!(err, InputError::InvalidJson(_)));
}

#[test]
fn rejects_empty_input() {
    let err = parse_hook_input("", &[HookEvent::Stop]).unwrap_err();
    assert!(matches!(err, InputError::InvalidJson(_)));
}

#[test]
fn rejects_missing_transcript_path() {
    let input = json!({ "hook_event_name": "Stop", "session_id": "s" });
    let err = parse_hook_input(&input.to_string(), &[HookEvent::Stop]).unwrap_err();
    assert!(matches!(err, InputError::InvalidJson(_)));
}

#[test]
fn rejects_missing_event_name() {
    let input = json!({ "transcript_path": "/tmp/t.jsonl" });
    let err = parse_hook_input(&input.to_string(), &[HookEvent::Stop]).unwrap_err();
    assert!(matches!(err, InputError::InvalidJson(_)));
}

#[test]
fn rejects_unknown_event() {
    let input = merge(common_fields(), json!({ "hook_event_name": "BogusEvent" }));
    let err = parse_hook_input(&input.to_string(), &[HookEvent::Stop]).unwrap_err();
    assert!(matches!(err, InputError::InvalidJson(_)));
}

#[test]
fn rejects_event_for_other_subcommand() {
    let input = merge(
        common_fields(),
        json!({ "hook_event_name": "UserPromptSubmit", "prompt": "hi" }),
    );
    let err = parse_hook_input(&input.to_string(), &[HookEvent::Stop]).unwrap_err();
    match err {
        InputError::UnexpectedEvent { got, expected } => {
            assert_eq!(got, "UserPromptSubmit");
            assert_eq!(expected, vec!["Stop"]);
        }
        other => panic!("expected UnexpectedEvent, got {other:?}"),
    }
}

#[test]
fn rejects_blank_prompt() {
    let input = merge(
        common_fields(),
        json!({ "hook_event_name": "UserPromptSubmit", "prompt": "   " }),
    );
    let err = parse_hook_input(&input.to_string(), &[HookEvent::UserPromptSubmit]).unwrap_err();
    assert!(matches!(err, InputError::EmptyPrompt));
    assert_eq!(err.to_string(), "no user prompt found in hook input");
}

// =================================================================
// Path expansion
// =================================================================

#[test]
fn expand_home_replaces_tilde_prefix() {
    let home = dirs_next::home_dir().expect("test environment has a home dir");
    assert_eq!(
        expand_home("~/.claude/projects/x.jsonl"),
        home.join(".claude/projects/x.jsonl")
    );
    assert_eq!(expand_home("~"), home);
}

#[test]
fn expand_home_leaves_other_paths_alone() {
    assert_eq!(expand_home("/tmp/t.jsonl"), PathBuf::from("/tmp/t.jsonl"));
    assert_eq!(expand_home("relative/~/x"), PathBuf::from("relative/~/x"));
}
