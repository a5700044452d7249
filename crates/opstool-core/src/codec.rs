//! JSON envelope codec for the task and result queues.
//!
//! Queue elements are UTF-8 JSON documents: one [`Task`] per element on the
//! input side, one [`TaskResult`] per element on the output side.

use crate::{CodecError, DecodeError, Task, TaskResult, MAX_LOGGED_PAYLOAD};
use serde_json::Value;

/// Decode a task popped from the input queue.
///
/// When the payload is not a valid task, the returned error still carries the
/// `id` field if the payload was a JSON object with a readable id.
pub fn decode_task(bytes: &[u8]) -> Result<Task, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|e| DecodeError {
        task_id: None,
        reason: format!("payload is not valid UTF-8: {}", e),
        raw: truncate(&String::from_utf8_lossy(bytes)),
    })?;

    serde_json::from_str::<Task>(text).map_err(|e| DecodeError {
        task_id: recover_id(text),
        reason: e.to_string(),
        raw: truncate(text),
    })
}

pub fn encode_task(task: &Task) -> Result<String, CodecError> {
    serde_json::to_string(task).map_err(CodecError::from)
}

pub fn encode_result(result: &TaskResult) -> Result<String, CodecError> {
    serde_json::to_string(result).map_err(CodecError::from)
}

pub fn decode_result(bytes: &[u8]) -> Result<TaskResult, CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
    serde_json::from_str(text).map_err(CodecError::from)
}

fn recover_id(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    match value.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_LOGGED_PAYLOAD {
        return text.to_string();
    }
    let mut end = MAX_LOGGED_PAYLOAD;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResultStatus, UNKNOWN_TASK_ID};
    use proptest::prelude::*;

    #[test]
    fn test_decode_valid_task() {
        let task = decode_task(br#"{"id":"t1","type":"monitor","args":{"action":"health_check"}}"#).unwrap();
        assert_eq!(task.id, "t1");
        assert_eq!(task.action(), "health_check");
    }

    #[test]
    fn test_decode_recovers_id_from_bad_fields() {
        let err = decode_task(br#"{"id":"t9","type":"cicd","args":["not","a","map"]}"#).unwrap_err();
        assert_eq!(err.task_id.as_deref(), Some("t9"));
        assert!(err.raw.contains("not"));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_task(b"{not json").unwrap_err();
        assert_eq!(err.task_id, None);
        assert_eq!(err.raw, "{not json");

        let err = decode_task(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err.task_id, None);
        assert!(err.reason.contains("UTF-8"));
    }

    #[test]
    fn test_missing_id_uses_sentinel() {
        let task = decode_task(br#"{"type":"alert_response","alert":{"severity":"critical"}}"#).unwrap();
        assert_eq!(task.id, UNKNOWN_TASK_ID);
    }

    #[test]
    fn test_raw_payload_is_truncated() {
        let big = format!(r#"{{"id": 1, "pad": "{}""#, "é".repeat(2000));
        let err = decode_task(big.as_bytes()).unwrap_err();
        assert!(err.raw.len() <= MAX_LOGGED_PAYLOAD + 3);
        assert!(err.raw.ends_with("..."));
    }

    #[test]
    fn test_result_wire_shape() {
        let result = TaskResult::error("t2", "Unknown task type: bogus");
        let encoded = encode_result(&result).unwrap();
        let decoded = decode_result(encoded.as_bytes()).unwrap();

        assert_eq!(decoded.task_id, "t2");
        assert_eq!(decoded.status, ResultStatus::Error);
        assert!(encoded.contains(r#""status":"error""#));
    }

    proptest! {
        #[test]
        fn prop_type_tag_survives_decoding(id in "[a-zA-Z0-9-]{1,24}", tag in "[a-z_]{0,16}") {
            let payload = serde_json::json!({"id": id, "type": tag}).to_string();
            let task = decode_task(payload.as_bytes()).unwrap();
            prop_assert_eq!(task.id, id);
            prop_assert_eq!(task.task_type, tag);
        }

        #[test]
        fn prop_id_recovered_when_body_is_invalid(id in "[a-zA-Z0-9-]{1,24}") {
            let payload = serde_json::json!({"id": id, "type": "cicd", "args": 42}).to_string();
            let err = decode_task(payload.as_bytes()).unwrap_err();
            prop_assert_eq!(err.task_id, Some(id));
        }
    }
}
