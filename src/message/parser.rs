//! Transcript parser for Claude Code `stream-json` output

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, SessionError};
use crate::types::identifiers::ResumeToken;
use crate::types::messages::TranscriptEntry;

/// What the session manager needs out of one backend transcript
#[derive(Debug, Clone)]
pub struct ParsedTranscript {
    /// Final response text
    pub response: String,
    /// All parsed entries as a pretty-printed JSON array
    pub raw_transcript: String,
    /// Session id reported by the backend
    pub resume_token: Option<ResumeToken>,
    /// Turn count from the result entry
    pub num_turns: Option<u32>,
    /// Cost from the result entry
    pub total_cost_usd: Option<f64>,
}

/// Parse a JSON value into a typed transcript entry
///
/// Returns `None` for entry types this crate does not model (stream events,
/// future additions) or for entries whose shape does not match.
#[must_use]
pub fn parse_entry(data: &Value) -> Option<TranscriptEntry> {
    TranscriptEntry::deserialize(data).ok()
}

/// Parse a line-delimited transcript.
///
/// Lines that are blank or not JSON are skipped. The response is taken from
/// the last `result` entry, falling back to the last assistant entry with a
/// text block. The resume token comes from the `system/init` entry, else from
/// the first entry carrying a `session_id`.
///
/// # Errors
/// - `BackendInvocation` if the result entry reports an execution error
/// - `OutputParse` if no response can be located
pub fn parse_transcript<I, S>(lines: I) -> Result<ParsedTranscript>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut entries = Vec::new();
    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => entries.push(value),
            Err(e) => log::debug!("Skipping non-JSON transcript line: {e}"),
        }
    }

    if entries.is_empty() {
        return Err(SessionError::output_parse(
            "backend produced no transcript entries",
            None,
        ));
    }

    let raw_transcript = serde_json::to_string_pretty(&entries)?;
    let typed: Vec<TranscriptEntry> = entries.iter().filter_map(parse_entry).collect();

    let resume_token = typed
        .iter()
        .find(|entry| entry.is_init())
        .and_then(TranscriptEntry::session_id)
        .cloned()
        .or_else(|| {
            entries
                .iter()
                .find_map(|value| value.get("session_id").and_then(Value::as_str))
                .map(ResumeToken::from)
        });

    let mut num_turns = None;
    let mut total_cost_usd = None;
    let mut response = None;

    if let Some(TranscriptEntry::Result {
        subtype,
        is_error,
        num_turns: turns,
        total_cost_usd: cost,
        result,
        ..
    }) = typed
        .iter()
        .rev()
        .find(|entry| matches!(entry, TranscriptEntry::Result { .. }))
    {
        if *is_error || subtype.starts_with("error") {
            let detail = result
                .as_deref()
                .filter(|text| !text.trim().is_empty())
                .map(|text| format!("backend reported {subtype}: {text}"))
                .unwrap_or_else(|| format!("backend reported {subtype}"));
            return Err(SessionError::backend(detail, None, None).with_transcript(raw_transcript));
        }
        num_turns = Some(*turns);
        total_cost_usd = *cost;
        response = result.clone().filter(|text| !text.trim().is_empty());
    }

    let response = response.or_else(|| {
        typed.iter().rev().find_map(|entry| match entry {
            TranscriptEntry::Assistant { message, .. } => {
                message.first_text().map(str::to_string)
            }
            _ => None,
        })
    });

    let Some(response) = response else {
        return Err(SessionError::output_parse(
            "transcript contained no result or assistant text",
            Some(raw_transcript),
        ));
    };

    Ok(ParsedTranscript {
        response,
        raw_transcript,
        resume_token,
        num_turns,
        total_cost_usd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lines(values: &[Value]) -> Vec<String> {
        values.iter().map(Value::to_string).collect()
    }

    #[test]
    fn prefers_result_entry_and_init_session() {
        let transcript = lines(&[
            json!({"type": "system", "subtype": "init", "session_id": "sess-init"}),
            json!({"type": "assistant", "session_id": "sess-init", "message": {
                "model": "claude", "content": [{"type": "text", "text": "draft"}]
            }}),
            json!({"type": "result", "subtype": "success", "is_error": false,
                   "num_turns": 2, "total_cost_usd": 0.01, "result": "final answer",
                   "session_id": "sess-init"}),
        ]);

        let parsed = parse_transcript(&transcript).unwrap();
        assert_eq!(parsed.response, "final answer");
        assert_eq!(parsed.resume_token, Some(ResumeToken::new("sess-init")));
        assert_eq!(parsed.num_turns, Some(2));
        assert!(parsed.raw_transcript.contains("final answer"));
    }

    #[test]
    fn falls_back_to_last_assistant_text() {
        let transcript = lines(&[
            json!({"type": "assistant", "message": {
                "content": [{"type": "text", "text": "first"}]
            }}),
            json!({"type": "assistant", "message": {
                "content": [
                    {"type": "tool_use", "id": "t1", "name": "Read", "input": {}},
                    {"type": "text", "text": "second"}
                ]
            }}),
        ]);

        let parsed = parse_transcript(&transcript).unwrap();
        assert_eq!(parsed.response, "second");
        assert_eq!(parsed.resume_token, None);
    }

    #[test]
    fn session_id_from_any_entry_when_no_init() {
        let transcript = lines(&[
            json!({"type": "stream_event", "session_id": "sess-stream", "event": {}}),
            json!({"type": "result", "subtype": "success", "result": "ok"}),
        ]);

        let parsed = parse_transcript(&transcript).unwrap();
        assert_eq!(parsed.resume_token, Some(ResumeToken::new("sess-stream")));
    }

    #[test]
    fn skips_garbage_lines() {
        let mut transcript = vec!["not json".to_string(), String::new()];
        transcript.extend(lines(&[json!({"type": "result", "subtype": "success", "result": "ok"})]));

        let parsed = parse_transcript(&transcript).unwrap();
        assert_eq!(parsed.response, "ok");
    }

    #[test]
    fn missing_response_is_a_parse_failure() {
        let transcript = lines(&[json!({"type": "system", "subtype": "init", "session_id": "s"})]);

        let err = parse_transcript(&transcript).unwrap_err();
        assert!(matches!(err, SessionError::OutputParse { .. }));
        assert!(err.raw_transcript().is_some());
    }

    #[test]
    fn empty_output_is_a_parse_failure() {
        let err = parse_transcript(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, SessionError::OutputParse { .. }));
    }

    #[test]
    fn error_result_is_a_backend_failure() {
        let transcript = lines(&[json!({
            "type": "result", "subtype": "error_during_execution", "is_error": true
        })]);

        let err = parse_transcript(&transcript).unwrap_err();
        assert!(matches!(err, SessionError::BackendInvocation { .. }));
        assert!(err.to_string().contains("error_during_execution"));
    }
}
