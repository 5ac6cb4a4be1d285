//! Declarative descriptions of how a successful write reconciles the cache.

use serde_json::Value;

use super::key::QueryKey;
use super::traits::Cacheable;

/// How a patched record is written into a matching cached value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchStrategy {
  /// Replace the matching element with the record
  Replace,
  /// Copy only the named fields of the record into the matching element
  Merge(Vec<String>),
}

/// One reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
  /// Mark every entry whose key starts with the prefix stale
  Invalidate(QueryKey),
  /// Update the entry at exactly this key from the mutation's record
  Patch {
    key: QueryKey,
    strategy: PatchStrategy,
  },
}

/// Record written by patch steps, taken from a mutation's response.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PatchRecord {
  pub entity: &'static str,
  pub id: String,
  pub value: Value,
}

type RecordFn<T> = Box<dyn Fn(&T) -> serde_json::Result<PatchRecord> + Send + Sync>;

/// Success policy of a mutation, evaluated by [`QueryClient`](super::QueryClient).
///
/// Steps run in declaration order, atomically with respect to other cache
/// writes. Patch steps need a record extractor; without one they fall back to
/// invalidating their key.
pub struct MutationEffects<T> {
  steps: Vec<Effect>,
  record: Option<RecordFn<T>>,
}

impl<T> MutationEffects<T> {
  pub fn new() -> Self {
    Self {
      steps: Vec::new(),
      record: None,
    }
  }

  /// Invalidate the key family `prefix`.
  pub fn invalidate(mut self, prefix: QueryKey) -> Self {
    self.steps.push(Effect::Invalidate(prefix));
    self
  }

  /// Replace the matching record inside the value cached at `key`.
  pub fn patch(mut self, key: QueryKey) -> Self {
    self.steps.push(Effect::Patch {
      key,
      strategy: PatchStrategy::Replace,
    });
    self
  }

  /// Merge `fields` of the record into the matching record cached at `key`.
  pub fn merge(mut self, key: QueryKey, fields: &[&str]) -> Self {
    self.steps.push(Effect::Patch {
      key,
      strategy: PatchStrategy::Merge(fields.iter().map(|f| f.to_string()).collect()),
    });
    self
  }

  /// Select the record that patch steps write, from the mutation's response.
  pub fn record<R, F>(mut self, extract: F) -> Self
  where
    R: Cacheable,
    F: Fn(&T) -> &R + Send + Sync + 'static,
  {
    self.record = Some(Box::new(move |data: &T| {
      let record = extract(data);
      Ok(PatchRecord {
        entity: R::entity_type(),
        id: record.id().to_string(),
        value: serde_json::to_value(record)?,
      })
    }));
    self
  }

  pub fn steps(&self) -> &[Effect] {
    &self.steps
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// The record patch steps apply, if an extractor was given.
  pub(crate) fn record_value(&self, data: &T) -> Option<serde_json::Result<PatchRecord>> {
    self.record.as_ref().map(|extract| extract(data))
  }
}

impl<T> Default for MutationEffects<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> std::fmt::Debug for MutationEffects<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MutationEffects")
      .field("steps", &self.steps)
      .field("has_record", &self.record.is_some())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::{Deserialize, Serialize};
  use serde_json::json;

  #[derive(Debug, Clone, Serialize, Deserialize)]
  struct Reply {
    note: Note,
  }

  #[derive(Debug, Clone, Serialize, Deserialize)]
  struct Note {
    id: String,
    text: String,
  }

  impl Cacheable for Note {
    fn id(&self) -> &str {
      &self.id
    }

    fn entity_type() -> &'static str {
      "note"
    }
  }

  #[test]
  fn test_record_carries_entity_and_id() {
    let effects: MutationEffects<Reply> = MutationEffects::new()
      .patch(QueryKey::new("notes"))
      .record(|r: &Reply| &r.note);
    let reply = Reply {
      note: Note {
        id: "n-1".into(),
        text: "hello".into(),
      },
    };

    let record = effects.record_value(&reply).unwrap().unwrap();
    assert_eq!(record.entity, "note");
    assert_eq!(record.id, "n-1");
    assert_eq!(record.value, json!({"id": "n-1", "text": "hello"}));
  }

  #[test]
  fn test_steps_keep_declaration_order() {
    let effects: MutationEffects<Reply> = MutationEffects::new()
      .invalidate(QueryKey::new("notes"))
      .merge(QueryKey::new("users"), &["email"]);

    assert!(effects.record_value(&Reply {
      note: Note {
        id: "n-1".into(),
        text: String::new(),
      },
    })
    .is_none());
    assert_eq!(
      effects.steps(),
      &[
        Effect::Invalidate(QueryKey::new("notes")),
        Effect::Patch {
          key: QueryKey::new("users"),
          strategy: PatchStrategy::Merge(vec!["email".to_string()]),
        },
      ]
    );
  }
}
