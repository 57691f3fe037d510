use chrono::{DateTime, Utc};

use super::error::TailError;
use super::types::{ContentBlock, ContentValue, LogEntry, MessageContent, MessageRecord, Role, TypedBlock};

/// Parse one JSONL line from a session transcript.
///
/// Returns `Ok(None)` for well-formed lines that are not user or assistant text
/// (session headers, tool results, tool-call-only turns). Returns
/// `TailError::MalformedRecord` for lines that cannot be decoded at all.
pub fn parse_line(
    line: &str,
    agent_id: &str,
    session_id: &str,
) -> Result<Option<MessageRecord>, TailError> {
    let entry: LogEntry =
        serde_json::from_str(line).map_err(|e| TailError::malformed(e.to_string()))?;

    if entry.entry_type != "message" {
        return Ok(None);
    }

    let Some(raw_message) = entry.message else {
        return Ok(None);
    };
    let message: MessageContent = serde_json::from_value(raw_message)
        .map_err(|e| TailError::malformed(format!("message body: {e}")))?;

    let is_user = match message.role.as_deref() {
        Some("user") => true,
        Some("assistant") => false,
        _ => return Ok(None),
    };

    let text = extract_text(message.content.as_ref());
    if text.is_empty() {
        return Ok(None);
    }

    let timestamp = parse_timestamp(entry.timestamp.as_ref())?;

    let role = if is_user {
        Role::User
    } else {
        Role::Assistant {
            cost: extract_cost(message.usage.as_ref()),
            model: message.model,
        }
    };

    Ok(Some(MessageRecord {
        session_id: session_id.to_string(),
        agent_id: agent_id.to_string(),
        timestamp,
        role,
        provider: message.provider,
        stop_reason: message.stop_reason,
        text,
    }))
}

fn extract_text(content: Option<&ContentValue>) -> String {
    match content {
        Some(ContentValue::Text(text)) => text.trim().to_string(),
        Some(ContentValue::Blocks(blocks)) => {
            let mut text_parts = Vec::new();
            for block in blocks {
                match block {
                    ContentBlock::Bare(text) => text_parts.push(text.as_str()),
                    ContentBlock::Typed(TypedBlock::Text { text }) => {
                        text_parts.push(text.as_str())
                    }
                    _ => {}
                }
            }
            text_parts.join("\n").trim().to_string()
        }
        Some(ContentValue::Other(_)) | None => String::new(),
    }
}

fn extract_cost(usage: Option<&serde_json::Value>) -> Option<f64> {
    usage?.get("cost")?.get("total")?.as_f64()
}

fn parse_timestamp(raw: Option<&serde_json::Value>) -> Result<DateTime<Utc>, TailError> {
    let raw = raw
        .and_then(|v| v.as_str())
        .ok_or_else(|| TailError::malformed("missing timestamp"))?;

    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| TailError::malformed(format!("bad timestamp {raw:?}: {e}")))
}

/// Session id is the transcript file name up to its first dot, so
/// `abc.jsonl` and `abc.deleted.2026-01-02.jsonl` both belong to `abc`.
pub fn extract_session_id(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_line(ts: &str, text: &str) -> String {
        serde_json::json!({
            "type": "message",
            "timestamp": ts,
            "message": {"role": "user", "content": [{"type": "text", "text": text}]}
        })
        .to_string()
    }

    #[test]
    fn parses_user_message() {
        let line = user_line("2026-02-03T10:00:00.000Z", "hello there");
        let record = parse_line(&line, "main", "abc").unwrap().unwrap();

        assert_eq!(record.agent_id, "main");
        assert_eq!(record.session_id, "abc");
        assert_eq!(record.role, Role::User);
        assert_eq!(record.text, "hello there");
        assert_eq!(record.timestamp.to_rfc3339(), "2026-02-03T10:00:00+00:00");
    }

    #[test]
    fn parses_assistant_with_model_and_cost() {
        let line = serde_json::json!({
            "type": "message",
            "timestamp": "2026-02-03T10:00:01Z",
            "message": {
                "role": "assistant",
                "model": "claude-opus-4-5",
                "provider": "anthropic",
                "stopReason": "stop",
                "usage": {"input": 10, "cost": {"input": 0.001, "total": 0.0123}},
                "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "text", "text": "first"},
                    {"type": "toolCall", "id": "t1", "name": "exec", "arguments": {}},
                    {"type": "text", "text": "second"}
                ]
            }
        })
        .to_string();

        let record = parse_line(&line, "penny", "s1").unwrap().unwrap();
        assert_eq!(record.role.model(), Some("claude-opus-4-5"));
        assert_eq!(record.role.cost(), Some(0.0123));
        assert_eq!(record.provider.as_deref(), Some("anthropic"));
        assert_eq!(record.stop_reason.as_deref(), Some("stop"));
        assert_eq!(record.text, "first\nsecond");
    }

    #[test]
    fn user_records_never_carry_model_or_cost() {
        let line = serde_json::json!({
            "type": "message",
            "timestamp": "2026-02-03T10:00:01Z",
            "message": {
                "role": "user",
                "model": "weird",
                "usage": {"cost": {"total": 1.0}},
                "content": "plain string content"
            }
        })
        .to_string();

        let record = parse_line(&line, "main", "s1").unwrap().unwrap();
        assert_eq!(record.role, Role::User);
        assert_eq!(record.role.model(), None);
        assert_eq!(record.role.cost(), None);
        assert_eq!(record.text, "plain string content");
    }

    #[test]
    fn bare_string_blocks_are_joined() {
        let line = serde_json::json!({
            "type": "message",
            "timestamp": "2026-02-03T10:00:01Z",
            "message": {"role": "user", "content": ["a", {"type": "text", "text": "b"}, {"no": "type"}]}
        })
        .to_string();

        let record = parse_line(&line, "main", "s1").unwrap().unwrap();
        assert_eq!(record.text, "a\nb");
    }

    #[test]
    fn skips_non_message_entries() {
        let line = r#"{"type":"session","id":"abc","cwd":"/tmp","message":"not an object"}"#;
        assert!(parse_line(line, "main", "abc").unwrap().is_none());
    }

    #[test]
    fn skips_tool_results_and_empty_text() {
        let tool_result = serde_json::json!({
            "type": "message",
            "timestamp": "2026-02-03T10:00:01Z",
            "message": {"role": "toolResult", "content": [{"type": "text", "text": "ok"}]}
        })
        .to_string();
        assert!(parse_line(&tool_result, "main", "s").unwrap().is_none());

        let tool_call_only = serde_json::json!({
            "type": "message",
            "timestamp": "2026-02-03T10:00:01Z",
            "message": {"role": "assistant", "content": [{"type": "toolCall", "id": "x"}]}
        })
        .to_string();
        assert!(parse_line(&tool_call_only, "main", "s").unwrap().is_none());

        let whitespace = user_line("2026-02-03T10:00:01Z", "   \n ");
        assert!(parse_line(&whitespace, "main", "s").unwrap().is_none());
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_line("{not json", "main", "s").unwrap_err();
        assert!(matches!(err, TailError::MalformedRecord { .. }));
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let line = user_line("yesterday-ish", "hi");
        let err = parse_line(&line, "main", "s").unwrap_err();
        assert!(matches!(err, TailError::MalformedRecord { .. }));

        let missing = serde_json::json!({
            "type": "message",
            "message": {"role": "user", "content": "hi"}
        })
        .to_string();
        assert!(parse_line(&missing, "main", "s").is_err());
    }

    #[test]
    fn offset_timestamps_normalize_to_utc() {
        let line = user_line("2026-02-03T12:00:00+02:00", "hi");
        let record = parse_line(&line, "main", "s").unwrap().unwrap();
        assert_eq!(record.timestamp.to_rfc3339(), "2026-02-03T10:00:00+00:00");
    }

    #[test]
    fn session_id_from_file_name() {
        assert_eq!(extract_session_id("abc-123.jsonl"), "abc-123");
        assert_eq!(extract_session_id("abc-123.deleted.2026-01-01.jsonl"), "abc-123");
    }
}
