//! Client side of the HPN admin dashboard.
//!
//! - [`api`]: transport client, typed REST surface and cached facade
//! - [`cache`]: process-wide query cache with invalidation and patching
//! - [`query`]: view handles (`Query`, `Mutation`) polled from an event loop
//! - [`config`]: YAML configuration

pub mod api;
pub mod cache;
pub mod config;
pub mod query;
