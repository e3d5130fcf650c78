//! Parsing helpers for authority response bodies.
//!
//! Success bodies are parsed into typed records here; error bodies are
//! mined for a human-readable message. Both FastAPI-style
//! (`{"detail": ...}`) and plain (`{"message": ...}` / `{"error": ...}`)
//! error bodies are understood.

use std::fmt;

use serde_json::{Map, Value};

use crate::types::{InstructionId, LgRecord};

/// Errors raised while reading an authority response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The body is not a JSON object where one was required.
    NotAnObject { context: String },
    /// A required field is absent or null.
    MissingField { field: String },
    /// A field is present but has the wrong shape.
    InvalidField { field: String, message: String },
    /// The body carries fields from both success shapes.
    Ambiguous { message: String },
    /// An embedded LG record failed to deserialize.
    InvalidRecord { message: String },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::NotAnObject { context } => {
                write!(f, "{} response is not a JSON object", context)
            }
            WireError::MissingField { field } => {
                write!(f, "response missing required field: '{}'", field)
            }
            WireError::InvalidField { field, message } => {
                write!(f, "response field '{}': {}", field, message)
            }
            WireError::Ambiguous { message } => {
                write!(f, "ambiguous response: {}", message)
            }
            WireError::InvalidRecord { message } => {
                write!(f, "invalid LG record in response: {}", message)
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Borrow `body` as a JSON object or fail with [`WireError::NotAnObject`].
pub(crate) fn as_object<'a>(
    body: &'a Value,
    context: &str,
) -> Result<&'a Map<String, Value>, WireError> {
    body.as_object().ok_or_else(|| WireError::NotAnObject {
        context: context.to_string(),
    })
}

/// A field that is present and not JSON `null`.
pub(crate) fn present<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

/// Read a positive integer identifier. The authority sometimes sends ids as
/// strings, so numeric strings are accepted too.
pub(crate) fn id_value(field: &str, value: &Value) -> Result<u64, WireError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| WireError::InvalidField {
        field: field.to_string(),
        message: format!("expected a non-negative integer id, got {}", value),
    })
}

pub(crate) fn optional_instruction_id(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<InstructionId>, WireError> {
    present(obj, field)
        .map(|v| id_value(field, v).map(InstructionId))
        .transpose()
}

pub(crate) fn optional_string(obj: &Map<String, Value>, field: &str) -> Option<String> {
    present(obj, field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Deserialize one LG record.
pub fn parse_record(value: &Value) -> Result<LgRecord, WireError> {
    serde_json::from_value(value.clone()).map_err(|e| WireError::InvalidRecord {
        message: e.to_string(),
    })
}

/// Deserialize a list of LG records.
///
/// Accepts a bare array or an object wrapping it under `items` or
/// `lg_records`.
pub fn parse_record_list(body: &Value) -> Result<Vec<LgRecord>, WireError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(obj) => present(obj, "items")
            .or_else(|| present(obj, "lg_records"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| WireError::MissingField {
                field: "items".to_string(),
            })?,
        _ => {
            return Err(WireError::NotAnObject {
                context: "record list".to_string(),
            })
        }
    };
    items.iter().map(parse_record).collect()
}

/// Extract the human-readable message from an error response body.
///
/// Lookup order: `detail` (string, list of `{msg}` entries, or object with
/// `message`), then top-level `message`, then `error`. Returns `None` when
/// the body offers nothing usable, leaving the caller to pick a fallback.
pub fn remote_error_message(body: &Value) -> Option<String> {
    let obj = body.as_object()?;

    if let Some(detail) = present(obj, "detail") {
        match detail {
            Value::String(s) if !s.trim().is_empty() => return Some(s.clone()),
            Value::Array(entries) => {
                let messages: Vec<&str> = entries
                    .iter()
                    .filter_map(|entry| entry.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            Value::Object(inner) => {
                if let Some(message) = optional_string(inner, "message") {
                    return Some(message);
                }
            }
            _ => {}
        }
    }

    optional_string(obj, "message")
        .or_else(|| optional_string(obj, "error"))
        .filter(|s| !s.trim().is_empty())
}

/// The offending field named by a validation error body, if any.
///
/// Reads the last string component of the first `detail[].loc` entry,
/// e.g. `{"detail": [{"loc": ["body", "new_amount"], ...}]}` → `new_amount`.
pub fn remote_error_field(body: &Value) -> Option<String> {
    body.get("detail")?
        .as_array()?
        .first()?
        .get("loc")?
        .as_array()?
        .iter()
        .rev()
        .find_map(|part| part.as_str())
        .filter(|part| *part != "body")
        .map(|part| part.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_from_detail_string() {
        let body = json!({"detail": "Decrease amount exceeds current balance"});
        assert_eq!(
            remote_error_message(&body).as_deref(),
            Some("Decrease amount exceeds current balance")
        );
    }

    #[test]
    fn error_message_from_validation_list() {
        let body = json!({"detail": [
            {"loc": ["body", "new_amount"], "msg": "must be positive"},
            {"loc": ["body", "reason"], "msg": "field required"}
        ]});
        assert_eq!(
            remote_error_message(&body).as_deref(),
            Some("must be positive; field required")
        );
        assert_eq!(remote_error_field(&body).as_deref(), Some("new_amount"));
    }

    #[test]
    fn error_message_falls_back_to_message_then_error() {
        assert_eq!(
            remote_error_message(&json!({"message": "nope"})).as_deref(),
            Some("nope")
        );
        assert_eq!(
            remote_error_message(&json!({"error": "bad"})).as_deref(),
            Some("bad")
        );
        assert_eq!(remote_error_message(&json!({"detail": ""})), None);
        assert_eq!(remote_error_message(&json!("oops")), None);
    }

    #[test]
    fn id_value_accepts_numeric_strings() {
        assert_eq!(id_value("x", &json!(77)), Ok(77));
        assert_eq!(id_value("x", &json!("77")), Ok(77));
        assert!(id_value("x", &json!(-1)).is_err());
        assert!(id_value("x", &json!(true)).is_err());
    }

    #[test]
    fn record_list_accepts_wrapped_items() {
        assert_eq!(parse_record_list(&json!([])).unwrap().len(), 0);
        assert_eq!(parse_record_list(&json!({"items": []})).unwrap().len(), 0);
        assert!(matches!(
            parse_record_list(&json!({"count": 0})),
            Err(WireError::MissingField { .. })
        ));
    }
}
