//! Task record model: the validated output of one extraction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of action an email asks for. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    MeetingScheduling,
    Reminder,
    ToDoItem,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [
        TaskType::MeetingScheduling,
        TaskType::Reminder,
        TaskType::ToDoItem,
    ];

    /// Wire tag, as the model is asked to emit it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeetingScheduling => "meeting_scheduling",
            Self::Reminder => "reminder",
            Self::ToDoItem => "to_do_item",
        }
    }

    /// Exact-match lookup. No case folding, no synonyms.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One actionable item extracted from an email.
///
/// Optional fields serialize as `null` rather than being omitted, so every
/// persisted object carries the same five keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub description: String,
    pub deadline: Option<String>,
    pub task_type: TaskType,
    pub dependencies: Option<Vec<String>>,
    pub responsible: Option<String>,
}

/// Why a candidate object from the model was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("task is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be {expected}")]
    WrongShape {
        field: &'static str,
        expected: &'static str,
    },

    #[error("description is empty")]
    EmptyDescription,

    #[error("unknown task_type '{0}'")]
    UnknownTaskType(String),
}

/// Validate a raw JSON object into a [`TaskRecord`].
///
/// Values are carried over verbatim; nothing is trimmed or normalized.
pub fn validate(raw: &Value) -> Result<TaskRecord, SchemaError> {
    let obj = raw.as_object().ok_or(SchemaError::NotAnObject)?;

    let description = match obj.get("description") {
        None | Some(Value::Null) => return Err(SchemaError::MissingField("description")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(SchemaError::EmptyDescription);
        }
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(SchemaError::WrongShape {
                field: "description",
                expected: "a string",
            });
        }
    };

    let task_type = match obj.get("task_type") {
        None | Some(Value::Null) => return Err(SchemaError::MissingField("task_type")),
        Some(Value::String(tag)) => {
            TaskType::from_tag(tag).ok_or_else(|| SchemaError::UnknownTaskType(tag.clone()))?
        }
        Some(_) => {
            return Err(SchemaError::WrongShape {
                field: "task_type",
                expected: "a string",
            });
        }
    };

    Ok(TaskRecord {
        description,
        deadline: optional_string(obj, "deadline")?,
        task_type,
        dependencies: optional_string_list(obj, "dependencies")?,
        responsible: optional_string(obj, "responsible")?,
    })
}

fn optional_string(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SchemaError::WrongShape {
            field,
            expected: "a string or null",
        }),
    }
}

fn optional_string_list(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Vec<String>>, SchemaError> {
    let wrong_shape = SchemaError::WrongShape {
        field,
        expected: "an array of strings or null",
    };
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Some)
            .ok_or(wrong_shape),
        Some(_) => Err(wrong_shape),
    }
}
