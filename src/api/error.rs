use serde_json::Value;
use thiserror::Error;

/// Failure of one backend call.
///
/// `Clone` so that every reader sharing an in-flight request receives the
/// same error.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
  /// No response was received (connection refused, DNS, TLS, ...)
  #[error("network error: {0}")]
  Transport(String),

  /// The backend answered with a non-2xx status
  #[error("{message}")]
  Status {
    status: u16,
    message: String,
    details: Option<Value>,
  },

  /// A 2xx body could not be shaped into the expected type
  #[error("unexpected response: {0}")]
  Decode(String),

  /// A request body could not be serialized
  #[error("could not encode request: {0}")]
  Encode(String),
}

impl ApiError {
  /// Build the error for a non-2xx response from its (possibly null) JSON body.
  ///
  /// The backend message wins when present and non-empty; otherwise the
  /// message is `Request failed (<status>)`. `details` is kept whatever
  /// the message looks like.
  pub fn from_response(status: u16, body: &Value) -> Self {
    let message = body
      .get("message")
      .and_then(Value::as_str)
      .filter(|m| !m.is_empty())
      .map(str::to_string)
      .unwrap_or_else(|| format!("Request failed ({status})"));
    let details = body.get("details").filter(|d| !d.is_null()).cloned();

    ApiError::Status {
      status,
      message,
      details,
    }
  }

  /// HTTP status, for errors that carry one.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Status { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn details(&self) -> Option<&Value> {
    match self {
      ApiError::Status { details, .. } => details.as_ref(),
      _ => None,
    }
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(self.status(), Some(401) | Some(403))
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    ApiError::Transport(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_backend_message_wins() {
    let err = ApiError::from_response(404, &json!({"message": "Not found"}));
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Not found");
    assert!(err.details().is_none());
  }

  #[test]
  fn test_null_body_uses_template() {
    let err = ApiError::from_response(500, &Value::Null);
    assert_eq!(err.to_string(), "Request failed (500)");
  }

  #[test]
  fn test_empty_message_uses_template() {
    let err = ApiError::from_response(422, &json!({"message": ""}));
    assert_eq!(err.to_string(), "Request failed (422)");
  }

  #[test]
  fn test_details_are_kept() {
    let err = ApiError::from_response(
      400,
      &json!({"message": "Invalid payload", "details": {"field": "email"}}),
    );
    assert_eq!(err.details(), Some(&json!({"field": "email"})));
  }

  #[test]
  fn test_unrecognized_body_shape_uses_template() {
    let err = ApiError::from_response(502, &json!({"message": 42}));
    assert_eq!(err.to_string(), "Request failed (502)");
    assert!(!err.is_unauthorized());
    assert!(ApiError::from_response(401, &Value::Null).is_unauthorized());
  }

  #[test]
  fn test_details_survive_non_string_message() {
    let err = ApiError::from_response(
      400,
      &json!({"message": 42, "details": {"field": "title"}}),
    );
    assert_eq!(err.to_string(), "Request failed (400)");
    assert_eq!(err.details(), Some(&json!({"field": "title"})));
  }
}
