//! Backend access: transport client, typed endpoints and the cached facade.

pub mod cached;
pub mod client;
pub mod effects;
pub mod endpoints;
mod error;
pub mod keys;
pub mod sync;
pub mod types;

pub use cached::CachedApi;
pub use client::{ApiClient, RequestOptions};
pub use endpoints::build_query;
pub use error::ApiError;
