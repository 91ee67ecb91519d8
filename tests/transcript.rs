//! Transcript parsing against realistic Claude Code `stream-json` output

use agent_sessions::{ResumeToken, SessionError, parse_transcript};

const TOOL_USING_TURN: &str = r#"
{"type":"system","subtype":"init","cwd":"/work/repo","session_id":"5f1c2b9e-7a51-4b5e-9d1f-0c6a1e2f3b4d","tools":["Bash","Read","Edit"],"model":"claude-sonnet-4-5","permissionMode":"bypassPermissions","apiKeySource":"none"}
{"type":"assistant","message":{"id":"msg_01","type":"message","role":"assistant","model":"claude-sonnet-4-5","content":[{"type":"thinking","thinking":"Look at the manifest first.","signature":"abc"}],"stop_reason":null,"usage":{"input_tokens":12,"output_tokens":30}},"parent_tool_use_id":null,"session_id":"5f1c2b9e-7a51-4b5e-9d1f-0c6a1e2f3b4d"}
{"type":"assistant","message":{"id":"msg_02","type":"message","role":"assistant","model":"claude-sonnet-4-5","content":[{"type":"tool_use","id":"toolu_01","name":"Read","input":{"file_path":"/work/repo/Cargo.toml"}}],"stop_reason":"tool_use"},"parent_tool_use_id":null,"session_id":"5f1c2b9e-7a51-4b5e-9d1f-0c6a1e2f3b4d"}
{"type":"user","message":{"role":"user","content":[{"tool_use_id":"toolu_01","type":"tool_result","content":"[package]\nname = \"demo\""}]},"parent_tool_use_id":null,"session_id":"5f1c2b9e-7a51-4b5e-9d1f-0c6a1e2f3b4d"}
{"type":"assistant","message":{"id":"msg_03","type":"message","role":"assistant","model":"claude-sonnet-4-5","content":[{"type":"text","text":"The crate is called `demo`."}],"stop_reason":"end_turn"},"parent_tool_use_id":null,"session_id":"5f1c2b9e-7a51-4b5e-9d1f-0c6a1e2f3b4d"}
{"type":"result","subtype":"success","is_error":false,"duration_ms":5321,"duration_api_ms":4980,"num_turns":3,"result":"The crate is called `demo`.","session_id":"5f1c2b9e-7a51-4b5e-9d1f-0c6a1e2f3b4d","total_cost_usd":0.0123,"usage":{"input_tokens":40,"output_tokens":80}}
"#;

#[test]
fn test_tool_using_turn() {
    let parsed = parse_transcript(TOOL_USING_TURN.lines()).unwrap();

    assert_eq!(parsed.response, "The crate is called `demo`.");
    assert_eq!(
        parsed.resume_token,
        Some(ResumeToken::new("5f1c2b9e-7a51-4b5e-9d1f-0c6a1e2f3b4d"))
    );
    assert_eq!(parsed.num_turns, Some(3));
    assert_eq!(parsed.total_cost_usd, Some(0.0123));

    let raw: Vec<serde_json::Value> = serde_json::from_str(&parsed.raw_transcript).unwrap();
    assert_eq!(raw.len(), 6);
    assert_eq!(raw[2]["message"]["content"][0]["name"], "Read");
}

#[test]
fn test_stray_output_is_ignored() {
    let lines = [
        "Warning: running as root",
        r#"{"type":"system","subtype":"init","session_id":"s-1"}"#,
        "",
        r#"{"type":"stream_event","event":{"type":"content_block_delta"}}"#,
        r#"{"type":"result","subtype":"success","is_error":false,"num_turns":1,"result":"done","session_id":"s-1"}"#,
    ];

    let parsed = parse_transcript(lines).unwrap();
    assert_eq!(parsed.response, "done");
    assert_eq!(parsed.resume_token, Some(ResumeToken::new("s-1")));

    // Unmodelled entries are kept for diagnostics
    let raw: Vec<serde_json::Value> = serde_json::from_str(&parsed.raw_transcript).unwrap();
    assert_eq!(raw.len(), 3);
}

#[test]
fn test_max_turns_error_keeps_transcript() {
    let lines = [
        r#"{"type":"system","subtype":"init","session_id":"s-2"}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Working on it"}]},"session_id":"s-2"}"#,
        r#"{"type":"result","subtype":"error_max_turns","is_error":true,"num_turns":10,"session_id":"s-2"}"#,
    ];

    match parse_transcript(lines) {
        Err(SessionError::BackendInvocation {
            message,
            raw_transcript: Some(raw),
            ..
        }) => {
            assert!(message.contains("error_max_turns"));
            assert!(raw.contains("Working on it"));
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}
