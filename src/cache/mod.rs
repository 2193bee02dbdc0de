//! Offline cache: a persistent record store plus the network-first read
//! path that falls back to it.
//!
//! This module provides:
//! - a record store keyed by identifier, surviving restarts
//! - a resilient read layer (single network attempt, store fallback)
//! - a uniform result envelope recording which source answered

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{NoopStorage, RecordStorage, SqliteStorage};
pub use traits::{Cacheable, DataSource, FetchResult};
