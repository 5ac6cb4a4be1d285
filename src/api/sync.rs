//! Parsing of hand-written `/sync` payloads.

use serde_json::Value;
use thiserror::Error;

use super::types::SyncPayloadItem;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncPayloadError {
  #[error("Sync payload must be valid JSON.")]
  InvalidJson,
  #[error("Sync payload must be an array or an object with items.")]
  InvalidShape,
}

/// Parse the items of a sync submission.
///
/// Accepts a JSON array of items or an object whose `items` field is an
/// array. Fields the client does not know are kept on each item.
pub fn parse_sync_payload(input: &str) -> Result<Vec<SyncPayloadItem>, SyncPayloadError> {
  let value: Value = serde_json::from_str(input).map_err(|_| SyncPayloadError::InvalidJson)?;

  let items = match value {
    Value::Array(items) => items,
    Value::Object(mut object) => match object.remove("items") {
      Some(Value::Array(items)) => items,
      _ => return Err(SyncPayloadError::InvalidShape),
    },
    _ => return Err(SyncPayloadError::InvalidShape),
  };

  items
    .into_iter()
    .map(serde_json::from_value)
    .collect::<Result<Vec<_>, _>>()
    .map_err(|_| SyncPayloadError::InvalidShape)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_array_payload() {
    let items = parse_sync_payload(r#"[{"type": "prayer", "action": "create"}, {}]"#).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].action.as_deref(), Some("create"));
  }

  #[test]
  fn test_items_object_payload() {
    let items = parse_sync_payload(
      r#"{"items": [{"id": "p-1", "type": "prayer", "updatedAt": "2024-01-01", "device": "x"}]}"#,
    )
    .unwrap();
    assert_eq!(items[0].id.as_deref(), Some("p-1"));
    assert_eq!(items[0].updated_at.as_deref(), Some("2024-01-01"));
    assert_eq!(items[0].extra.get("device"), Some(&json!("x")));
  }

  #[test]
  fn test_empty_array() {
    assert!(parse_sync_payload("[]").unwrap().is_empty());
  }

  #[test]
  fn test_invalid_json() {
    let err = parse_sync_payload("[{").unwrap_err();
    assert_eq!(err, SyncPayloadError::InvalidJson);
    assert_eq!(err.to_string(), "Sync payload must be valid JSON.");
  }

  #[test]
  fn test_wrong_shapes() {
    for input in [r#"{"items": {}}"#, r#"{"records": []}"#, "42", r#""items""#, "[1, 2]"] {
      let err = parse_sync_payload(input).unwrap_err();
      assert_eq!(
        err.to_string(),
        "Sync payload must be an array or an object with items."
      );
    }
  }
}
