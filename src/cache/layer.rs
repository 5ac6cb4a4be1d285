//! Query client that orchestrates cached reads and mutation reconciliation.

use futures::future::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use super::effects::{Effect, MutationEffects};
use super::key::QueryKey;
use super::storage::{CacheStore, Completion, SharedFetch};
use super::traits::QuerySnapshot;
use crate::api::ApiError;
use crate::config::CacheConfig;

/// Process-wide query cache.
///
/// Created once at startup and handed to every view (clones share the same
/// store). It is never torn down during a session; [`QueryClient::clear`]
/// empties it on logout.
pub struct QueryClient {
  store: Arc<Mutex<CacheStore>>,
  /// How long a successful read is served without a new request
  stale_time: Duration,
}

/// Next step of a read.
enum Step {
  Ready(Result<Value, ApiError>),
  Wait(u64, SharedFetch),
}

impl QueryClient {
  pub fn new(config: &CacheConfig) -> Self {
    Self {
      store: Arc::new(Mutex::new(CacheStore::new())),
      stale_time: config.stale_time(),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn stale_time(&self) -> Duration {
    self.stale_time
  }

  fn lock(&self) -> MutexGuard<'_, CacheStore> {
    self.store.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Read `key` through the cache.
  ///
  /// 1. Fresh value in cache - return it without a request
  /// 2. Request in flight for the current generation - await the same request
  /// 3. Otherwise dispatch `fetcher()` as a new generation
  ///
  /// A response whose generation was superseded (newer dispatch, patch or
  /// invalidation) is never written; the read then follows the newer state.
  pub async fn fetch_query<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<T, ApiError>
  where
    T: Serialize + DeserializeOwned + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let step = self.begin(key, &fetcher, false);
    self.settle(key, step, &fetcher).await
  }

  /// Read `key` with a new request even if a fresh value is cached.
  pub async fn refetch_query<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<T, ApiError>
  where
    T: Serialize + DeserializeOwned + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let step = self.begin(key, &fetcher, true);
    self.settle(key, step, &fetcher).await
  }

  fn begin<T, F, Fut>(&self, key: &QueryKey, fetcher: &F, force: bool) -> Step
  where
    T: Serialize + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let mut store = self.lock();
    Self::begin_locked(&mut store, key, fetcher, force, self.stale_time)
  }

  fn begin_locked<T, F, Fut>(
    store: &mut CacheStore,
    key: &QueryKey,
    fetcher: &F,
    force: bool,
    stale_time: Duration,
  ) -> Step
  where
    T: Serialize + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let entry = store.entry(key);
    if !force {
      if let Some(value) = entry.fresh_value(stale_time) {
        return Step::Ready(Ok(value.clone()));
      }
      if let Some(in_flight) = entry.current_in_flight() {
        debug!(%key, generation = in_flight.generation, "joining in-flight request");
        return Step::Wait(in_flight.generation, in_flight.future.clone());
      }
    }

    let request = fetcher();
    let request = async move {
      let data = request.await?;
      serde_json::to_value(data).map_err(|e| ApiError::Decode(e.to_string()))
    }
    .boxed();
    let (generation, future) = store.dispatch(key, request);
    debug!(%key, generation, "dispatched request");
    Step::Wait(generation, future)
  }

  async fn settle<T, F, Fut>(&self, key: &QueryKey, mut step: Step, fetcher: &F) -> Result<T, ApiError>
  where
    T: Serialize + DeserializeOwned + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    loop {
      let (generation, future) = match step {
        Step::Ready(result) => return decode(result?),
        Step::Wait(generation, future) => (generation, future),
      };

      let result = future.await;

      let mut store = self.lock();
      step = match store.complete(key, generation, &result) {
        Completion::Stored | Completion::AlreadyStored | Completion::Missing => Step::Ready(result),
        Completion::Superseded => {
          debug!(%key, generation, "discarding superseded response");
          Self::begin_locked(&mut store, key, fetcher, false, self.stale_time)
        }
      };
    }
  }

  /// Decoded value cached at `key`, regardless of staleness.
  pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
    let value = self.lock().get(key)?.value.clone()?;
    serde_json::from_value(value).ok()
  }

  /// Write `data` at `key` as a fresh value.
  pub fn set_query_data<T: Serialize>(&self, key: &QueryKey, data: &T) -> Result<(), ApiError> {
    let value = serde_json::to_value(data).map_err(|e| ApiError::Encode(e.to_string()))?;
    self.lock().set_value(key, value);
    Ok(())
  }

  pub fn snapshot(&self, key: &QueryKey) -> Option<QuerySnapshot> {
    self.lock().get(key).map(|entry| entry.snapshot())
  }

  /// Every cached key with its state, sorted by key.
  pub fn snapshots(&self) -> Vec<(QueryKey, QuerySnapshot)> {
    self.lock().snapshots()
  }

  /// Mark the family `prefix` stale. Returns the number of entries marked.
  ///
  /// Unobserved entries are refetched when next read; mounted `Query` handles
  /// refetch on their next poll.
  pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
    let counts = self.lock().invalidate_prefix(prefix);
    debug!(
      %prefix,
      entries = counts.entries,
      observed = counts.observed,
      "invalidated query family"
    );
    counts.entries
  }

  /// Await `request` and, on success, apply `effects` before returning.
  ///
  /// A failed request leaves the cache untouched.
  pub async fn mutate<T, Fut>(&self, request: Fut, effects: &MutationEffects<T>) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let data = request.await?;
    self.apply_effects(effects, &data);
    Ok(data)
  }

  /// Apply `effects` for the mutation response `data` under one lock.
  pub fn apply_effects<T>(&self, effects: &MutationEffects<T>, data: &T) {
    if effects.is_empty() {
      return;
    }

    let record = match effects.record_value(data) {
      Some(Ok(record)) => Some(record),
      Some(Err(e)) => {
        warn!(error = %e, "could not serialize mutation record; invalidating instead of patching");
        None
      }
      None => None,
    };

    let mut store = self.lock();
    for step in effects.steps() {
      match step {
        Effect::Invalidate(prefix) => {
          let counts = store.invalidate_prefix(prefix);
          debug!(%prefix, entries = counts.entries, "invalidated after mutation");
        }
        Effect::Patch { key, strategy } => match &record {
          Some(record) => {
            let outcome = store.patch(key, &record.id, &record.value, strategy);
            debug!(
              %key,
              entity = record.entity,
              id = %record.id,
              ?outcome,
              "patched after mutation"
            );
          }
          None => {
            store.invalidate_prefix(key);
          }
        },
      }
    }
  }

  /// Register a mounted view on `key`.
  pub(crate) fn observe(&self, key: &QueryKey) {
    self.lock().observe(key);
  }

  pub(crate) fn unobserve(&self, key: &QueryKey) {
    self.lock().unobserve(key);
  }

  /// Empty the cache (logout). Requests still in flight are not written.
  pub fn clear(&self) {
    let dropped = self.lock().clear();
    debug!(entries = dropped, "cleared query cache");
  }
}

impl Clone for QueryClient {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      stale_time: self.stale_time,
    }
  }
}

impl std::fmt::Debug for QueryClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryClient")
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
  serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}
