//! Deserialization from proposition payload JSON into typed structs.
//!
//! [`proposition_from_value`] is strict and reports the first problem it
//! finds. [`from_payload`] is the tolerant entry point used by the
//! pipeline: malformed entries are skipped, never surfaced.

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::schema::SchemaType;
use crate::types::*;

/// Key carrying the originating request id on a decision fragment.
pub const REQUEST_EVENT_ID: &str = "requestEventId";
/// Key carrying the request id on a completion signal.
pub const ENDING_EVENT_ID: &str = "endingEventId";

/// Errors during proposition JSON deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    /// A proposition is missing a required field.
    MissingField { field: String },
    /// An item inside a proposition is malformed.
    ItemError {
        proposition: String,
        index: usize,
        message: String,
    },
    /// The payload structure is invalid.
    InvalidPayload(String),
}

impl fmt::Display for InterchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterchangeError::MissingField { field } => {
                write!(f, "proposition missing required field: '{}'", field)
            }
            InterchangeError::ItemError {
                proposition,
                index,
                message,
            } => {
                write!(f, "proposition '{}' item {}: {}", proposition, index, message)
            }
            InterchangeError::InvalidPayload(msg) => {
                write!(f, "invalid payload: {}", msg)
            }
        }
    }
}

impl std::error::Error for InterchangeError {}

/// Deserialize one proposition, failing on the first malformed field.
pub fn proposition_from_value(obj: &Value) -> Result<Proposition, InterchangeError> {
    decode_proposition(obj, ItemPolicy::Reject)
}

/// What to do with an item that fails to parse.
#[derive(Clone, Copy)]
enum ItemPolicy {
    Reject,
    Skip,
}

fn decode_proposition(obj: &Value, policy: ItemPolicy) -> Result<Proposition, InterchangeError> {
    let id = required_str(obj, "id")?;
    let scope = required_str(obj, "scope")?;

    let scope_details = match obj.get("scopeDetails") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(InterchangeError::InvalidPayload(format!(
                "proposition '{}': 'scopeDetails' is not an object",
                id
            )))
        }
    };

    let items_arr = obj
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| InterchangeError::MissingField {
            field: "items".to_string(),
        })?;

    let mut items = Vec::with_capacity(items_arr.len());
    for (index, item) in items_arr.iter().enumerate() {
        match (parse_item(item), policy) {
            (Ok(item), _) => items.push(item),
            (Err(message), ItemPolicy::Skip) => {
                debug!(proposition = %id, index, %message, "skipping malformed item");
            }
            (Err(message), ItemPolicy::Reject) => {
                return Err(InterchangeError::ItemError {
                    proposition: id.clone(),
                    index,
                    message,
                })
            }
        }
    }

    Ok(Proposition::new(id, scope, scope_details, items))
}

/// Deserialize a payload array, skipping entries that fail to parse.
///
/// A malformed item is dropped on its own; its proposition and sibling
/// items are kept.
///
/// Accepts either a bare array or an object with a `payload` array.
pub fn from_payload(payload: &Value) -> Vec<Proposition> {
    let entries = match payload {
        Value::Array(arr) => arr.as_slice(),
        Value::Object(_) => match payload.get("payload").and_then(Value::as_array) {
            Some(arr) => arr.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    entries
        .iter()
        .filter_map(|entry| match decode_proposition(entry, ItemPolicy::Skip) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!(error = %e, "skipping malformed proposition");
                None
            }
        })
        .collect()
}

/// Read a decision fragment event: `{requestEventId, payload: [...]}`.
///
/// Returns `None` when the request id is missing or empty.
pub fn fragment_from_event(event: &Value) -> Option<DecisionFragment> {
    let request_id = non_empty_str(event, REQUEST_EVENT_ID)?;
    Some(DecisionFragment {
        request_id,
        payload: from_payload(event),
    })
}

/// Read a completion event: `{endingEventId}`.
pub fn completion_from_event(event: &Value) -> Option<CompletionSignal> {
    non_empty_str(event, ENDING_EVENT_ID).map(|request_id| CompletionSignal { request_id })
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn required_str(obj: &Value, field: &str) -> Result<String, InterchangeError> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| InterchangeError::MissingField {
            field: field.to_string(),
        })
}

fn non_empty_str(obj: &Value, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn parse_item(obj: &Value) -> Result<PropositionItem, String> {
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing 'id' field".to_string())?;
    let schema = obj
        .get("schema")
        .and_then(Value::as_str)
        .map(SchemaType::classify)
        .unwrap_or(SchemaType::Unknown);
    let data = obj.get("data").cloned().unwrap_or(Value::Null);
    Ok(PropositionItem::new(id, schema, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SCHEMA_HTML_CONTENT;
    use serde_json::json;

    fn html_proposition(id: &str, scope: &str) -> Value {
        json!({
            "id": id,
            "scope": scope,
            "scopeDetails": {"rank": 1},
            "items": [{"id": format!("{}-item", id), "schema": SCHEMA_HTML_CONTENT, "data": {"content": "<p/>"}}]
        })
    }

    #[test]
    fn test_parse_proposition() {
        let p = proposition_from_value(&html_proposition("p1", "mobileapp://app")).unwrap();
        assert_eq!(p.unique_id, "p1");
        assert_eq!(p.scope, "mobileapp://app");
        assert_eq!(p.rank(), 1);
        assert_eq!(p.items.len(), 1);
        assert_eq!(p.items[0].schema, SchemaType::HtmlContent);
        assert_eq!(p.items[0].proposition_id(), Some("p1"));
    }

    #[test]
    fn test_missing_scope() {
        let result = proposition_from_value(&json!({"id": "p", "items": []}));
        match result.unwrap_err() {
            InterchangeError::MissingField { field } => assert_eq!(field, "scope"),
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_items() {
        let result = proposition_from_value(&json!({"id": "p", "scope": "s://a"}));
        assert_eq!(
            result.unwrap_err(),
            InterchangeError::MissingField {
                field: "items".to_string()
            }
        );
    }

    #[test]
    fn test_item_without_id() {
        let result = proposition_from_value(&json!({
            "id": "p", "scope": "s://a", "items": [{"schema": SCHEMA_HTML_CONTENT}]
        }));
        match result.unwrap_err() {
            InterchangeError::ItemError { proposition, index, .. } => {
                assert_eq!(proposition, "p");
                assert_eq!(index, 0);
            }
            other => panic!("expected ItemError, got {:?}", other),
        }
    }

    #[test]
    fn test_scope_details_must_be_object() {
        let result = proposition_from_value(&json!({
            "id": "p", "scope": "s://a", "scopeDetails": [1], "items": []
        }));
        assert!(matches!(result, Err(InterchangeError::InvalidPayload(_))));
    }

    #[test]
    fn test_item_without_schema_is_unknown() {
        let p = proposition_from_value(&json!({
            "id": "p", "scope": "s://a", "items": [{"id": "i", "data": {}}]
        }))
        .unwrap();
        assert_eq!(p.items[0].schema, SchemaType::Unknown);
    }

    #[test]
    fn test_from_payload_skips_malformed_entries() {
        let payload = json!([
            html_proposition("p1", "s://a"),
            {"id": "broken"},
            42,
            html_proposition("p2", "s://b"),
        ]);
        let props = from_payload(&payload);
        let ids: Vec<_> = props.iter().map(|p| p.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_from_payload_drops_only_the_bad_item() {
        let payload = json!([{
            "id": "p1",
            "scope": "s://a",
            "items": [
                {"id": "good", "schema": SCHEMA_HTML_CONTENT, "data": {"content": "<p/>"}},
                {"schema": SCHEMA_HTML_CONTENT, "data": {"content": "<p/>"}}
            ]
        }]);
        let props = from_payload(&payload);
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].items.len(), 1);
        assert_eq!(props[0].items[0].item_id, "good");
        assert!(proposition_from_value(&payload[0]).is_err());
    }

    #[test]
    fn test_from_payload_non_array() {
        assert!(from_payload(&json!("nope")).is_empty());
        assert!(from_payload(&json!({})).is_empty());
    }

    #[test]
    fn test_fragment_from_event() {
        let event = json!({
            "requestEventId": "req-1",
            "payload": [html_proposition("p1", "s://a")]
        });
        let fragment = fragment_from_event(&event).unwrap();
        assert_eq!(fragment.request_id, "req-1");
        assert_eq!(fragment.payload.len(), 1);
    }

    #[test]
    fn test_fragment_without_request_id() {
        assert!(fragment_from_event(&json!({"payload": []})).is_none());
        assert!(fragment_from_event(&json!({"requestEventId": "", "payload": []})).is_none());
    }

    #[test]
    fn test_completion_from_event() {
        let signal = completion_from_event(&json!({"endingEventId": "req-1"})).unwrap();
        assert_eq!(signal.request_id, "req-1");
        assert!(completion_from_event(&json!({})).is_none());
    }

    #[test]
    fn test_error_display() {
        let e = InterchangeError::ItemError {
            proposition: "p".to_string(),
            index: 2,
            message: "missing 'id' field".to_string(),
        };
        assert_eq!(e.to_string(), "proposition 'p' item 2: missing 'id' field");
    }
}
