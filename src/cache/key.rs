//! Hierarchical identities for cached reads.

use serde::Serialize;
use std::fmt;

/// One primitive component of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum KeyPart {
  /// An absent filter
  Null,
  Bool(bool),
  Int(i64),
  Str(String),
}

impl From<&str> for KeyPart {
  fn from(value: &str) -> Self {
    KeyPart::Str(value.to_string())
  }
}

impl From<String> for KeyPart {
  fn from(value: String) -> Self {
    KeyPart::Str(value)
  }
}

impl From<&String> for KeyPart {
  fn from(value: &String) -> Self {
    KeyPart::Str(value.clone())
  }
}

impl From<i64> for KeyPart {
  fn from(value: i64) -> Self {
    KeyPart::Int(value)
  }
}

impl From<u32> for KeyPart {
  fn from(value: u32) -> Self {
    KeyPart::Int(i64::from(value))
  }
}

impl From<bool> for KeyPart {
  fn from(value: bool) -> Self {
    KeyPart::Bool(value)
  }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
  fn from(value: Option<T>) -> Self {
    value.map(Into::into).unwrap_or(KeyPart::Null)
  }
}

/// Ordered tuple identifying one cacheable read.
///
/// Two keys are equal iff their parts are equal. A shorter key acts as the
/// family prefix of every key that starts with it, so `["events"]` covers
/// `["events", null, "youth"]` and `["events", "dashboard"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
  /// Create a key whose first part is `root`.
  pub fn new(root: impl Into<KeyPart>) -> Self {
    Self(vec![root.into()])
  }

  /// Append a part.
  pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
    self.0.push(part.into());
    self
  }

  pub fn parts(&self) -> &[KeyPart] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Whether this key belongs to the family denoted by `prefix`.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl<P: Into<KeyPart>> FromIterator<P> for QueryKey {
  fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
    Self(iter.into_iter().map(Into::into).collect())
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Same shape as a JSON array, e.g. ["events",null,"youth"]
    let rendered = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
    f.write_str(&rendered)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_keys_compare_deeply() {
    let a = QueryKey::new("events").with(None::<String>).with("youth");
    let b: QueryKey = vec![KeyPart::from("events"), KeyPart::Null, KeyPart::from("youth")]
      .into_iter()
      .collect();
    assert_eq!(a, b);
  }

  #[test]
  fn test_absent_and_empty_filters_differ() {
    let absent = QueryKey::new("events").with(None::<String>);
    let empty = QueryKey::new("events").with("");
    assert_ne!(absent, empty);
  }

  #[test]
  fn test_prefix_family() {
    let family = QueryKey::new("prayers");
    let filtered = QueryKey::new("prayers").with("healing");
    let other = QueryKey::new("prayer-comments").with("p-1");

    assert!(filtered.starts_with(&family));
    assert!(family.starts_with(&family));
    assert!(!other.starts_with(&family));
    assert!(!family.starts_with(&filtered));
  }

  #[test]
  fn test_display_is_json_like() {
    let key = QueryKey::new("attendance").with("detail").with(7i64).with(true);
    assert_eq!(key.to_string(), r#"["attendance","detail",7,true]"#);
  }
}
