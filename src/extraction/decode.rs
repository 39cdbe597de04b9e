//! Response decoding: model text in, validated task records out.
//!
//! Pure functions only, so the parser can be exercised without any
//! generation service behind it.

use serde_json::Value;

use crate::extraction::task::{SchemaError, TaskRecord, validate};

/// The model's text could not be turned into a list of candidate tasks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedResponse {
    #[error("response is empty")]
    Empty,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("unexpected top-level JSON shape: {0}")]
    UnexpectedShape(&'static str),
}

/// Result of decoding one response: accepted records plus rejected candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedTasks {
    pub tasks: Vec<TaskRecord>,
    /// Candidate index and reason for every dropped object.
    pub rejected: Vec<(usize, SchemaError)>,
}

impl DecodedTasks {
    pub fn candidates(&self) -> usize {
        self.tasks.len() + self.rejected.len()
    }
}

/// Decode a generation-service response into task records.
///
/// Accepts a bare JSON array or an object with a `tasks` array. Invalid
/// candidates are collected in [`DecodedTasks::rejected`] and never abort the
/// rest.
pub fn decode_response(raw: &str) -> Result<DecodedTasks, MalformedResponse> {
    let value = parse_json_value(raw)?;
    let candidates = candidate_list(&value)?;

    let mut decoded = DecodedTasks::default();
    for (index, candidate) in candidates.iter().enumerate() {
        match validate(candidate) {
            Ok(task) => decoded.tasks.push(task),
            Err(e) => decoded.rejected.push((index, e)),
        }
    }
    Ok(decoded)
}

fn candidate_list(value: &Value) -> Result<&Vec<Value>, MalformedResponse> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(obj) => match obj.get("tasks") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(MalformedResponse::UnexpectedShape(
                "object whose 'tasks' is not an array",
            )),
            None => Err(MalformedResponse::UnexpectedShape(
                "object without a 'tasks' key",
            )),
        },
        Value::Null => Err(MalformedResponse::UnexpectedShape("null")),
        Value::Bool(_) => Err(MalformedResponse::UnexpectedShape("boolean")),
        Value::Number(_) => Err(MalformedResponse::UnexpectedShape("number")),
        Value::String(_) => Err(MalformedResponse::UnexpectedShape("string")),
    }
}

/// Parse the response as JSON, tolerating markdown fences and surrounding prose.
fn parse_json_value(raw: &str) -> Result<Value, MalformedResponse> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MalformedResponse::Empty);
    }

    let direct_err = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(fenced) = fenced_json(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(fenced)
    {
        return Ok(value);
    }

    embedded_json(trimmed).ok_or_else(|| MalformedResponse::InvalidJson(direct_err.to_string()))
}

/// Body of a markdown code block that holds JSON.
fn fenced_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let after = &text[start + 7..];
        if let Some(end) = after.find("```") {
            return Some(after[..end].trim());
        }
    }

    let start = text.find("```")?;
    let after = &text[start + 3..];
    let inner = after[..after.find("```")?].trim();
    (inner.starts_with('[') || inner.starts_with('{')).then_some(inner)
}

/// First JSON container embedded in prose.
///
/// Every `[` or `{` is tried as a start, so bracketed prose before the real
/// payload is skipped. A value shaped like a task list wins over the first
/// container that merely parses.
fn embedded_json(text: &str) -> Option<Value> {
    let mut first = None;
    for (pos, _) in text.match_indices(['[', '{']) {
        let mut values = serde_json::Deserializer::from_str(&text[pos..]).into_iter::<Value>();
        let Some(Ok(value)) = values.next() else {
            continue;
        };
        if looks_like_task_list(&value) {
            return Some(value);
        }
        first.get_or_insert(value);
    }
    first
}

fn looks_like_task_list(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(Value::is_object),
        Value::Object(obj) => obj.contains_key("tasks"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::task::TaskType;

    const REPORT_TASK: &str = r#"{"description":"Send the report","deadline":"Friday","task_type":"to_do_item","responsible":null,"dependencies":null}"#;

    #[test]
    fn decode_bare_array() {
        let decoded = decode_response(&format!("[{REPORT_TASK}]")).unwrap();
        assert_eq!(decoded.tasks.len(), 1);
        assert!(decoded.rejected.is_empty());
        let task = &decoded.tasks[0];
        assert_eq!(task.description, "Send the report");
        assert_eq!(task.deadline.as_deref(), Some("Friday"));
        assert_eq!(task.task_type, TaskType::ToDoItem);
        assert!(task.responsible.is_none());
        assert!(task.dependencies.is_none());
    }

    #[test]
    fn decode_tasks_object_matches_bare_array() {
        let bare = decode_response(&format!("[{REPORT_TASK}]")).unwrap();
        let wrapped = decode_response(&format!(r#"{{"tasks": [{REPORT_TASK}]}}"#)).unwrap();
        assert_eq!(bare, wrapped);
    }

    #[test]
    fn decode_preserves_order() {
        let raw = r#"[
            {"description": "first", "task_type": "reminder"},
            {"description": "second", "task_type": "meeting_scheduling"},
            {"description": "third", "task_type": "to_do_item"}
        ]"#;
        let decoded = decode_response(raw).unwrap();
        let descriptions: Vec<&str> = decoded.tasks.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, ["first", "second", "third"]);
    }

    #[test]
    fn decode_drops_invalid_candidates_only() {
        let raw = r#"[
            {"description": "keep", "task_type": "reminder"},
            {"description": "drop", "task_type": "errand"},
            "not an object",
            {"description": "also keep", "task_type": "to_do_item"}
        ]"#;
        let decoded = decode_response(raw).unwrap();
        assert_eq!(decoded.tasks.len(), 2);
        assert_eq!(decoded.tasks[1].description, "also keep");
        assert_eq!(decoded.candidates(), 4);
        assert_eq!(
            decoded.rejected,
            vec![
                (1, SchemaError::UnknownTaskType("errand".into())),
                (2, SchemaError::NotAnObject),
            ]
        );
    }

    #[test]
    fn decode_empty_tasks_object() {
        let decoded = decode_response(r#"{"tasks":[]}"#).unwrap();
        assert!(decoded.tasks.is_empty());
        assert_eq!(decoded.candidates(), 0);
    }

    #[test]
    fn decode_markdown_fenced_array() {
        let raw = format!("```json\n[{REPORT_TASK}]\n```");
        assert_eq!(decode_response(&raw).unwrap().tasks.len(), 1);

        let raw = format!("```\n[{REPORT_TASK}]\n```");
        assert_eq!(decode_response(&raw).unwrap().tasks.len(), 1);
    }

    #[test]
    fn decode_array_with_surrounding_prose() {
        let raw = format!("Here are the tasks I found:\n[{REPORT_TASK}]\nLet me know!");
        assert_eq!(decode_response(&raw).unwrap().tasks.len(), 1);
    }

    #[test]
    fn decode_malformed_text() {
        assert!(matches!(
            decode_response("I could not find any tasks."),
            Err(MalformedResponse::InvalidJson(_))
        ));
        assert!(matches!(
            decode_response(r#"[{"description": "x", "task_type": "#),
            Err(MalformedResponse::InvalidJson(_))
        ));
    }

    #[test]
    fn decode_empty_text() {
        assert_eq!(decode_response("  \n"), Err(MalformedResponse::Empty));
    }

    #[test]
    fn decode_unexpected_shapes() {
        for raw in [
            r#"{"items": []}"#,
            r#"{"tasks": "none"}"#,
            "42",
            "null",
            r#""tasks""#,
        ] {
            assert!(
                matches!(decode_response(raw), Err(MalformedResponse::UnexpectedShape(_))),
                "expected UnexpectedShape for {raw}"
            );
        }
    }

    #[test]
    fn embedded_json_prefers_task_list() {
        let text = r#"note {"tasks": [1]} end"#;
        assert_eq!(embedded_json(text), Some(serde_json::json!({"tasks": [1]})));
        assert_eq!(embedded_json("see item [1] then [] done"), Some(serde_json::json!([1])));
        assert_eq!(embedded_json("no json here"), None);
    }

    #[test]
    fn decode_skips_bracketed_prose_before_payload() {
        let raw = format!("Here are the tasks [see below]:\n[{REPORT_TASK}]");
        let decoded = decode_response(&raw).unwrap();
        assert_eq!(decoded.tasks.len(), 1);
        assert_eq!(decoded.tasks[0].description, "Send the report");

        let raw = format!("Step [1] of 2:\n{{\"tasks\": [{REPORT_TASK}]}}\nThanks");
        assert_eq!(decode_response(&raw).unwrap().tasks.len(), 1);
    }

    #[test]
    fn decode_prose_with_empty_array() {
        let decoded = decode_response("Nothing actionable here: []").unwrap();
        assert!(decoded.tasks.is_empty());
    }
}
