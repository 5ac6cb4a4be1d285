//! In-memory entry store behind the query client.
//!
//! Every method here runs under the client's lock and never awaits, so each
//! reconciliation is applied as a whole before any other task observes it.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::effects::PatchStrategy;
use super::key::QueryKey;
use super::traits::{QuerySnapshot, QueryStatus};
use crate::api::ApiError;

/// A request whose result every reader of the same generation awaits.
pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<Value, ApiError>>>;

pub(crate) struct InFlight {
  pub generation: u64,
  pub future: SharedFetch,
}

/// One cached read.
pub(crate) struct CacheEntry {
  pub value: Option<Value>,
  pub status: QueryStatus,
  pub error: Option<ApiError>,
  pub invalidated: bool,
  pub updated_at: Option<Instant>,
  pub cached_at: Option<DateTime<Utc>>,
  pub generation: u64,
  pub in_flight: Option<InFlight>,
  pub observers: usize,
}

impl CacheEntry {
  fn new() -> Self {
    Self {
      value: None,
      status: QueryStatus::Pending,
      error: None,
      invalidated: false,
      updated_at: None,
      cached_at: None,
      generation: 0,
      in_flight: None,
      observers: 0,
    }
  }

  /// Value that can be served without a request.
  pub fn fresh_value(&self, stale_time: Duration) -> Option<&Value> {
    if self.status != QueryStatus::Success || self.invalidated {
      return None;
    }
    let age = self.updated_at?.elapsed();
    if age < stale_time {
      self.value.as_ref()
    } else {
      None
    }
  }

  /// The in-flight request, if it belongs to the current generation.
  pub fn current_in_flight(&self) -> Option<&InFlight> {
    self
      .in_flight
      .as_ref()
      .filter(|f| f.generation == self.generation)
  }

  pub fn snapshot(&self) -> QuerySnapshot {
    QuerySnapshot {
      status: self.status,
      invalidated: self.invalidated,
      fetching: self.current_in_flight().is_some(),
      generation: self.generation,
      observers: self.observers,
      cached_at: self.cached_at,
      error: self.error.as_ref().map(ToString::to_string),
    }
  }

  /// Start a new generation; anything dispatched before it is superseded.
  fn bump(&mut self) {
    self.generation += 1;
    self.in_flight = None;
  }

  fn touch(&mut self) {
    self.updated_at = Some(Instant::now());
    self.cached_at = Some(Utc::now());
  }
}

/// Outcome of handing a response back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
  /// The response was written to the entry
  Stored,
  /// Another waiter of the same request already wrote it
  AlreadyStored,
  /// A newer dispatch, patch or invalidation happened meanwhile
  Superseded,
  /// The entry no longer exists (cache cleared)
  Missing,
}

/// Outcome of patching one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Patched {
  /// The record was written into the cached value
  Updated,
  /// Nothing to write into yet; the entry was marked stale
  Invalidated,
  /// No cached record matched
  Unchanged,
}

/// Counts reported by a family invalidation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Invalidated {
  pub entries: usize,
  pub observed: usize,
}

#[derive(Default)]
pub(crate) struct CacheStore {
  entries: HashMap<QueryKey, CacheEntry>,
}

impl CacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: &QueryKey) -> Option<&CacheEntry> {
    self.entries.get(key)
  }

  /// Get the entry for `key`, creating a pending one on first access.
  pub fn entry(&mut self, key: &QueryKey) -> &mut CacheEntry {
    self
      .entries
      .entry(key.clone())
      .or_insert_with(CacheEntry::new)
  }

  /// Register a new request as the authoritative one for `key`.
  pub fn dispatch(
    &mut self,
    key: &QueryKey,
    request: BoxFuture<'static, Result<Value, ApiError>>,
  ) -> (u64, SharedFetch) {
    let entry = self.entry(key);
    entry.bump();
    let future = request.shared();
    entry.in_flight = Some(InFlight {
      generation: entry.generation,
      future: future.clone(),
    });
    (entry.generation, future)
  }

  /// Store the result of the request dispatched as `generation`.
  pub fn complete(
    &mut self,
    key: &QueryKey,
    generation: u64,
    result: &Result<Value, ApiError>,
  ) -> Completion {
    let Some(entry) = self.entries.get_mut(key) else {
      return Completion::Missing;
    };
    if entry.generation != generation {
      return Completion::Superseded;
    }
    if entry.current_in_flight().is_none() {
      return Completion::AlreadyStored;
    }

    entry.in_flight = None;
    entry.invalidated = false;
    match result {
      Ok(value) => {
        entry.value = Some(value.clone());
        entry.status = QueryStatus::Success;
        entry.error = None;
        entry.touch();
      }
      Err(err) => {
        // Previous data stays readable next to the error
        entry.status = QueryStatus::Error;
        entry.error = Some(err.clone());
      }
    }
    Completion::Stored
  }

  /// Overwrite the value at `key` as if it had just been fetched.
  pub fn set_value(&mut self, key: &QueryKey, value: Value) {
    let entry = self.entry(key);
    entry.bump();
    entry.value = Some(value);
    entry.status = QueryStatus::Success;
    entry.error = None;
    entry.invalidated = false;
    entry.touch();
  }

  /// Mark every entry of the family `prefix` stale.
  pub fn invalidate_prefix(&mut self, prefix: &QueryKey) -> Invalidated {
    let mut counts = Invalidated::default();
    for (key, entry) in self.entries.iter_mut() {
      if !key.starts_with(prefix) {
        continue;
      }
      entry.bump();
      entry.invalidated = true;
      counts.entries += 1;
      if entry.observers > 0 {
        counts.observed += 1;
      }
    }
    counts
  }

  /// Write `record` into the value cached at exactly `key`.
  ///
  /// Lists have the element with the same `id` updated; a single record is
  /// updated when its own `id` matches. An entry that cannot be patched while
  /// its load is still pending is marked stale instead, so a response sent
  /// before the write is never stored as fresh.
  pub fn patch(
    &mut self,
    key: &QueryKey,
    id: &str,
    record: &Value,
    strategy: &PatchStrategy,
  ) -> Patched {
    let Some(entry) = self.entries.get_mut(key) else {
      return Patched::Unchanged;
    };

    let changed = match entry.value.as_mut() {
      Some(Value::Array(items)) => {
        let mut hit = false;
        for item in items.iter_mut().filter(|item| has_id(item, id)) {
          apply_record(item, record, strategy);
          hit = true;
        }
        hit
      }
      Some(single) if has_id(single, id) => {
        apply_record(single, record, strategy);
        true
      }
      _ => false,
    };

    if changed {
      entry.bump();
      entry.status = QueryStatus::Success;
      entry.error = None;
      entry.touch();
      Patched::Updated
    } else if entry.value.is_none() || entry.current_in_flight().is_some() {
      entry.bump();
      entry.invalidated = true;
      Patched::Invalidated
    } else {
      Patched::Unchanged
    }
  }

  pub fn observe(&mut self, key: &QueryKey) {
    self.entry(key).observers += 1;
  }

  pub fn unobserve(&mut self, key: &QueryKey) {
    if let Some(entry) = self.entries.get_mut(key) {
      entry.observers = entry.observers.saturating_sub(1);
    }
  }

  /// Drop every entry. Pending requests complete as `Missing`.
  pub fn clear(&mut self) -> usize {
    let count = self.entries.len();
    self.entries.clear();
    count
  }

  pub fn snapshots(&self) -> Vec<(QueryKey, QuerySnapshot)> {
    let mut all: Vec<_> = self
      .entries
      .iter()
      .map(|(key, entry)| (key.clone(), entry.snapshot()))
      .collect();
    all.sort_by_key(|(key, _)| key.to_string());
    all
  }
}

fn has_id(value: &Value, id: &str) -> bool {
  value.get("id").and_then(Value::as_str) == Some(id)
}

fn apply_record(target: &mut Value, record: &Value, strategy: &PatchStrategy) {
  match strategy {
    PatchStrategy::Replace => *target = record.clone(),
    PatchStrategy::Merge(fields) => {
      let (Some(target), Some(record)) = (target.as_object_mut(), record.as_object()) else {
        return;
      };
      for field in fields {
        match record.get(field) {
          Some(v) => {
            target.insert(field.clone(), v.clone());
          }
          None => {
            target.remove(field);
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn store_with(key: &QueryKey, value: Value) -> CacheStore {
    let mut store = CacheStore::new();
    store.set_value(key, value);
    store
  }

  #[test]
  fn test_patch_replaces_matching_list_element() {
    let key = QueryKey::new("events").with(None::<String>).with(None::<String>);
    let mut store = store_with(
      &key,
      json!([
        {"id": "evt-1", "title": "Picnic", "isRegistered": false},
        {"id": "evt-2", "title": "Choir", "isRegistered": false}
      ]),
    );

    let record = json!({"id": "evt-1", "title": "Picnic", "isRegistered": true});
    assert_eq!(
      store.patch(&key, "evt-1", &record, &PatchStrategy::Replace),
      Patched::Updated
    );

    let value = store.get(&key).and_then(|e| e.value.clone()).unwrap();
    assert_eq!(value[0]["isRegistered"], json!(true));
    assert_eq!(value[1]["isRegistered"], json!(false));
  }

  #[test]
  fn test_patch_without_match_changes_nothing() {
    let key = QueryKey::new("users");
    let mut store = store_with(&key, json!([{"id": "u-1", "email": "a@x.org"}]));
    let before = store.get(&key).map(|e| e.generation);

    let record = json!({"id": "u-9", "email": "z@x.org"});
    assert_eq!(
      store.patch(&key, "u-9", &record, &PatchStrategy::Replace),
      Patched::Unchanged
    );
    assert_eq!(store.get(&key).map(|e| e.generation), before);
  }

  #[test]
  fn test_merge_copies_only_named_fields() {
    let key = QueryKey::new("users");
    let mut store = store_with(
      &key,
      json!([{"id": "u-1", "email": "old@x.org", "name": "Ada"}]),
    );

    let record = json!({"id": "u-1", "email": "new@x.org", "name": "Changed"});
    let strategy = PatchStrategy::Merge(vec!["email".to_string()]);
    assert_eq!(store.patch(&key, "u-1", &record, &strategy), Patched::Updated);

    let value = store.get(&key).and_then(|e| e.value.clone()).unwrap();
    assert_eq!(value[0]["email"], json!("new@x.org"));
    assert_eq!(value[0]["name"], json!("Ada"));
  }

  #[test]
  fn test_patch_single_record_by_id() {
    let key = QueryKey::new("event").with("evt-1");
    let mut store = store_with(&key, json!({"id": "evt-1", "attendeesCount": 4}));

    let record = json!({"id": "evt-1", "attendeesCount": 5});
    assert_eq!(
      store.patch(&key, "evt-1", &record, &PatchStrategy::Replace),
      Patched::Updated
    );
    assert_eq!(
      store.patch(&key, "evt-2", &record, &PatchStrategy::Replace),
      Patched::Unchanged
    );

    let value = store.get(&key).and_then(|e| e.value.clone()).unwrap();
    assert_eq!(value["attendeesCount"], json!(5));
  }

  #[test]
  fn test_uncached_key_is_not_created_by_patch() {
    let mut store = CacheStore::new();
    let key = QueryKey::new("event").with("evt-1");
    assert_eq!(
      store.patch(&key, "evt-1", &json!({"id": "evt-1"}), &PatchStrategy::Replace),
      Patched::Unchanged
    );
    assert!(store.get(&key).is_none());
  }

  #[test]
  fn test_patch_during_first_load_marks_entry_stale() {
    let mut store = CacheStore::new();
    let key = QueryKey::new("events");
    let (generation, _) = store.dispatch(&key, async { Ok(json!([])) }.boxed());

    let record = json!({"id": "evt-1", "isRegistered": true});
    assert_eq!(
      store.patch(&key, "evt-1", &record, &PatchStrategy::Replace),
      Patched::Invalidated
    );
    assert!(store.get(&key).unwrap().invalidated);
    assert_eq!(
      store.complete(&key, generation, &Ok(json!([{"id": "evt-1", "isRegistered": false}]))),
      Completion::Superseded
    );
  }

  #[test]
  fn test_invalidate_counts_family_members() {
    let mut store = CacheStore::new();
    store.set_value(&QueryKey::new("prayers").with("a"), json!([]));
    store.set_value(&QueryKey::new("prayers").with("b"), json!([]));
    store.set_value(&QueryKey::new("users"), json!([]));
    store.observe(&QueryKey::new("prayers").with("a"));

    let counts = store.invalidate_prefix(&QueryKey::new("prayers"));
    assert_eq!(counts.entries, 2);
    assert_eq!(counts.observed, 1);
    assert!(!store.get(&QueryKey::new("users")).unwrap().invalidated);
  }

  #[test]
  fn test_invalidate_empty_family_is_noop() {
    let mut store = CacheStore::new();
    let counts = store.invalidate_prefix(&QueryKey::new("events"));
    assert_eq!(counts, Invalidated::default());
    assert!(store.snapshots().is_empty());
  }

  #[test]
  fn test_superseded_completion_is_rejected() {
    let mut store = CacheStore::new();
    let key = QueryKey::new("notifications");
    let (old, _) = store.dispatch(&key, async { Ok(json!(["old"])) }.boxed());
    let (new, _) = store.dispatch(&key, async { Ok(json!(["new"])) }.boxed());

    assert_eq!(
      store.complete(&key, old, &Ok(json!(["old"]))),
      Completion::Superseded
    );
    assert_eq!(
      store.complete(&key, new, &Ok(json!(["new"]))),
      Completion::Stored
    );
    assert_eq!(
      store.complete(&key, new, &Ok(json!(["new"]))),
      Completion::AlreadyStored
    );
    assert_eq!(store.get(&key).unwrap().value, Some(json!(["new"])));
  }
}
