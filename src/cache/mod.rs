//! Service-worker style response cache for offline reads.
//!
//! This module provides the interception layer that:
//! - Serves `/api/*` reads network first, falling back to cached copies
//! - Serves navigations network first, falling back to an offline page
//! - Serves static assets cache first, with a placeholder for images
//! - Pre-warms a static asset list on install and evicts old versions on activate

mod layer;
mod storage;
mod strategy;
mod types;
mod worker;

pub use layer::{CacheLayer, CacheSettings};
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use types::FetchRequest;
pub use worker::{ServiceWorker, SYNC_TAG};
