//! Query cache that keeps views consistent with the backend.
//!
//! This module provides the client-side cache used by every read and write:
//! - Entries are identified by hierarchical [`QueryKey`]s
//! - Identical concurrent reads share one in-flight request
//! - Per-key generations make the most recently dispatched request authoritative
//! - Writes reconcile the cache through declarative [`MutationEffects`]

mod effects;
mod key;
mod layer;
mod storage;
mod traits;

pub use effects::{Effect, MutationEffects, PatchStrategy};
pub use key::{KeyPart, QueryKey};
pub use layer::QueryClient;
pub use traits::{Cacheable, QuerySnapshot, QueryStatus};
