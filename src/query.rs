//! View handles over the query cache.
//!
//! Inspired by TanStack Query, this module provides `Query<T>` (a mounted read
//! of one cache key) and `Mutation<I, T>` (a write with a success policy).
//! Both run their network work on spawned tasks and are polled from the
//! owning event loop.
//!
//! # Example
//!
//! ```ignore
//! let api = cached_api.clone();
//! let mut events = cache.watch(keys::events(&filters), move || {
//!     let api = api.clone();
//!     async move { api.client().events(&filters).await }
//! });
//!
//! // Start fetching
//! events.fetch();
//!
//! // In event loop tick
//! if events.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match events.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use futures::future::{BoxFuture, FutureExt};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::ApiError;
use crate::cache::{MutationEffects, QueryClient, QueryKey, QueryStatus};

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(ApiError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

impl QueryClient {
  /// Mount a view on `key`. The returned handle is idle until `fetch()`.
  pub fn watch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Query<T>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Query::new(self.clone(), key, fetcher)
  }
}

/// A mounted read of one cache key.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure), routed through the shared cache
/// - Loading/success/error states
/// - Async result handling via channels
/// - Reacting to patches and invalidations of its key made by mutations
///
/// Dropping the handle unmounts it: its pending task is aborted, so nothing
/// is written after the owning view is gone.
pub struct Query<T> {
  client: QueryClient,
  key: QueryKey,
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
  task: Option<JoinHandle<()>>,
  /// Cache generation the current state reflects
  seen_generation: Option<u64>,
}

impl<T> Query<T>
where
  T: Serialize + DeserializeOwned + Send + 'static,
{
  fn new<F, Fut>(client: QueryClient, key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    client.observe(&key);
    Self {
      client,
      key,
      state: QueryState::Idle,
      fetcher: Arc::new(move || fetcher().boxed()),
      receiver: None,
      task: None,
      seen_generation: None,
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query succeeded.
  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  /// Check if the query is currently loading.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Check if the query succeeded.
  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  /// Check if the query failed.
  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error if the query failed.
  pub fn error(&self) -> Option<&ApiError> {
    self.state.error()
  }

  /// Read through the cache if not already loading.
  ///
  /// A fresh cached value resolves without a request.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start(false);
  }

  /// Force a new request, even if already loading or data is fresh.
  pub fn refetch(&mut self) {
    self.start(true);
  }

  /// Poll for results and for cache-side changes to the key.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick
  /// handler.
  pub fn poll(&mut self) -> bool {
    if let Some(receiver) = &mut self.receiver {
      // Try to receive without blocking
      return match receiver.try_recv() {
        Ok(result) => {
          self.resolve(Some(result));
          true
        }
        Err(mpsc::error::TryRecvError::Empty) => false,
        Err(mpsc::error::TryRecvError::Disconnected) => {
          self.resolve(None);
          true
        }
      };
    }

    if matches!(self.state, QueryState::Idle) {
      return false;
    }
    let Some(snapshot) = self.client.snapshot(&self.key) else {
      return false;
    };
    if snapshot.invalidated && !snapshot.fetching {
      self.start(false);
      return true;
    }
    if snapshot.fetching
      || snapshot.status != QueryStatus::Success
      || Some(snapshot.generation) == self.seen_generation
    {
      return false;
    }

    // Patched by a mutation or refreshed by another view
    match self.client.get_query_data::<T>(&self.key) {
      Some(data) => {
        self.state = QueryState::Success(data);
        self.seen_generation = Some(snapshot.generation);
        true
      }
      None => false,
    }
  }

  /// Wait for the pending request, if any, and apply its result.
  ///
  /// Returns `true` if the state changed. For callers that await instead of
  /// ticking an event loop.
  pub async fn settled(&mut self) -> bool {
    let Some(receiver) = &mut self.receiver else {
      return false;
    };
    let result = receiver.recv().await;
    self.resolve(result);
    true
  }

  fn resolve(&mut self, result: Option<Result<T, ApiError>>) {
    match result {
      Some(result) => {
        self.state = match result {
          Ok(data) => QueryState::Success(data),
          Err(error) => QueryState::Error(error),
        };
        self.seen_generation = self.client.snapshot(&self.key).map(|s| s.generation);
      }
      // Sender dropped without sending - treat as error
      None => {
        self.state = QueryState::Error(ApiError::Transport("query was cancelled".to_string()));
      }
    }
    self.finish_task();
  }

  fn start(&mut self, force: bool) {
    self.finish_task();
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let client = self.client.clone();
    let key = self.key.clone();
    let fetcher = Arc::clone(&self.fetcher);
    self.task = Some(tokio::spawn(async move {
      let fetch = move || fetcher();
      let result = if force {
        client.refetch_query(&key, fetch).await
      } else {
        client.fetch_query(&key, fetch).await
      };
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    }));
  }

  fn finish_task(&mut self) {
    self.receiver = None;
    if let Some(task) = self.task.take() {
      task.abort();
    }
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
    self.client.unobserve(&self.key);
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("state", &self.state)
      .field("seen_generation", &self.seen_generation)
      .finish_non_exhaustive()
  }
}

/// The state of a mutation
#[derive(Debug, Clone)]
pub enum MutationState<T> {
  Idle,
  Pending,
  Success(T),
  Error(ApiError),
}

type MutationFn<I, T> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// A write whose success policy is applied to the cache before the result is
/// delivered to the view.
///
/// Unlike `Query`, dropping a `Mutation` does not abort a write in progress:
/// the backend may already have applied it, so the cache is still reconciled.
pub struct Mutation<I, T> {
  client: QueryClient,
  mutation_fn: MutationFn<I, T>,
  effects: Arc<MutationEffects<T>>,
  state: MutationState<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
}

impl QueryClient {
  /// Build a mutation handle (`useMutation`).
  pub fn mutation<I, T, F, Fut>(&self, mutation_fn: F, effects: MutationEffects<T>) -> Mutation<I, T>
  where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Mutation {
      client: self.clone(),
      mutation_fn: Arc::new(move |input| mutation_fn(input).boxed()),
      effects: Arc::new(effects),
      state: MutationState::Idle,
      receiver: None,
    }
  }
}

impl<I, T> Mutation<I, T>
where
  I: Send + 'static,
  T: Send + 'static,
{
  pub fn state(&self) -> &MutationState<T> {
    &self.state
  }

  pub fn is_pending(&self) -> bool {
    matches!(self.state, MutationState::Pending)
  }

  pub fn data(&self) -> Option<&T> {
    match &self.state {
      MutationState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match &self.state {
      MutationState::Error(e) => Some(e),
      _ => None,
    }
  }

  /// Start the write. A second call while pending replaces the tracked result.
  pub fn mutate(&mut self, input: I) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = MutationState::Pending;

    let client = self.client.clone();
    let effects = Arc::clone(&self.effects);
    let request = (self.mutation_fn)(input);
    tokio::spawn(async move {
      let result = client.mutate(request, &effects).await;
      let _ = tx.send(result);
    });
  }

  /// Returns `true` once the pending write resolved.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = &mut self.receiver else {
      return false;
    };
    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = MutationState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = MutationState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.state = MutationState::Error(ApiError::Transport("mutation was cancelled".to_string()));
        self.receiver = None;
        true
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::Cacheable;
  use crate::config::CacheConfig;
  use serde::Deserialize;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Row {
    id: String,
    done: bool,
  }

  impl Cacheable for Row {
    fn id(&self) -> &str {
      &self.id
    }

    fn entity_type() -> &'static str {
      "row"
    }
  }

  fn row(id: &str, done: bool) -> Row {
    Row {
      id: id.to_string(),
      done,
    }
  }

  fn client() -> QueryClient {
    QueryClient::new(&CacheConfig::default())
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
  }

  #[tokio::test]
  async fn test_query_success() {
    let client = client();
    let mut query = client.watch(QueryKey::new("rows"), || async {
      Ok(vec![row("a", false)])
    });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    settle().await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![row("a", false)]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let client = client();
    let mut query: Query<Vec<Row>> = client.watch(QueryKey::new("rows"), || async {
      Err(ApiError::Status {
        status: 404,
        message: "Not found".to_string(),
        details: None,
      })
    });

    query.fetch();
    settle().await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error().and_then(ApiError::status), Some(404));
  }

  #[tokio::test]
  async fn test_settled_waits_for_result() {
    let client = client();
    let key = QueryKey::new("rows");
    let mut query = client.watch(key.clone(), || async {
      tokio::time::sleep(Duration::from_millis(20)).await;
      Ok(vec![row("a", true)])
    });

    assert!(!query.settled().await);
    query.fetch();
    assert!(query.settled().await);
    assert_eq!(query.data(), Some(&vec![row("a", true)]));
    assert_eq!(client.snapshot(&key).unwrap().observers, 1);
    assert!(!query.poll());
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let client = client();
    let mut query = client.watch(QueryKey::new("rows"), || async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok(Vec::<Row>::new())
    });

    query.fetch();
    assert!(query.is_loading());

    // Second fetch should be no-op
    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_mounted_query_follows_patch_without_request() {
    let client = client();
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let key = QueryKey::new("rows");
    let mut query = client.watch(key.clone(), move || {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(vec![row("a", false), row("b", false)])
      }
    });
    query.fetch();
    settle().await;
    query.poll();

    let effects: MutationEffects<Row> = MutationEffects::new().patch(key.clone()).record(|r: &Row| r);
    let mut toggle = client.mutation(|id: String| async move { Ok(row(&id, true)) }, effects);
    toggle.mutate("b".to_string());
    assert!(toggle.is_pending());
    settle().await;
    assert!(toggle.poll());
    assert_eq!(toggle.data(), Some(&row("b", true)));

    assert!(query.poll());
    assert_eq!(query.data(), Some(&vec![row("a", false), row("b", true)]));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_mounted_query_refetches_once_after_invalidation() {
    let client = client();
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let mut query = client.watch(QueryKey::new("rows").with("open"), move || {
      let counter = counter.clone();
      async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(vec![row(&format!("r{n}"), false)])
      }
    });
    query.fetch();
    settle().await;
    query.poll();

    client.invalidate_queries(&QueryKey::new("rows"));
    client.invalidate_queries(&QueryKey::new("rows"));

    assert!(query.poll());
    assert!(query.is_loading());
    settle().await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&vec![row("r1", false)]));
    assert!(!query.poll());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failed_mutation_reports_error() {
    let client = client();
    client.set_query_data(&QueryKey::new("rows"), &vec![row("a", false)]).unwrap();
    let effects: MutationEffects<Row> = MutationEffects::new().invalidate(QueryKey::new("rows"));
    let mut mutation = client.mutation(
      |_: ()| async {
        Err::<Row, _>(ApiError::Status {
          status: 400,
          message: "Bad input".to_string(),
          details: None,
        })
      },
      effects,
    );

    mutation.mutate(());
    settle().await;
    assert!(mutation.poll());
    assert_eq!(mutation.error().map(ToString::to_string), Some("Bad input".to_string()));
    assert!(!client.snapshot(&QueryKey::new("rows")).unwrap().invalidated);
  }

  #[tokio::test]
  async fn test_unmounted_query_writes_nothing() {
    let client = client();
    let key = QueryKey::new("rows");
    let mut query = client.watch(key.clone(), || async {
      tokio::time::sleep(Duration::from_millis(20)).await;
      Ok(vec![row("late", false)])
    });
    query.fetch();
    assert_eq!(client.snapshot(&key).unwrap().observers, 1);
    drop(query);

    settle().await;
    let snapshot = client.snapshot(&key).unwrap();
    assert_eq!(snapshot.observers, 0);
    assert_eq!(snapshot.status, QueryStatus::Pending);
    assert!(client.get_query_data::<Vec<Row>>(&key).is_none());
  }
}
