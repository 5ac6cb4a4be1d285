//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

/// Trait for records that can be patched inside cached values.
///
/// Implementors expose the identity the backend assigned to them. Cached
/// lists are matched element by element on the JSON `id` field.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Backend identifier (e.g. event id, prayer id)
  fn id(&self) -> &str;

  /// Entity type name used in log lines (e.g. "event", "prayer")
  fn entity_type() -> &'static str;
}

/// Status of the last resolution of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// No response has been stored yet
  Pending,
  /// The entry holds a value from the backend or a patch
  Success,
  /// The last request failed; an older value may still be present
  Error,
}

/// Point-in-time view of one cache entry, used by view handles and the
/// `cache` console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySnapshot {
  pub status: QueryStatus,
  /// Marked stale by an invalidation and not refetched since
  pub invalidated: bool,
  /// A request for the current generation is in flight
  pub fetching: bool,
  /// Bumped on every dispatch, patch and invalidation
  pub generation: u64,
  /// Number of mounted `Query` handles watching the key
  pub observers: usize,
  /// When the value was last written
  pub cached_at: Option<DateTime<Utc>>,
  /// Message of the last failed request, until a later success
  pub error: Option<String>,
}
