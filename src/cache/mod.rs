//! Render cache.
//!
//! - **Keys**: `KeyPlan` derives one `CacheKey` per rendered object
//! - **Client**: `CacheClient` is the batch read/write backend interface
//! - **Store**: `MemoryCache` is a bounded in-process backend
//! - **Planner**: `CachePlan` groups collection positions by key
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1000
//! key_prefix = "platter"
//! ```

mod client;
mod config;
mod keys;
mod lock;
mod planner;
mod store;

pub use client::{CacheClient, CacheError};
pub use config::CacheConfig;
pub(crate) use config::{DEFAULT_CAPACITY, DEFAULT_KEY_PREFIX};
pub use keys::{CACHE_KEY_SEPARATOR, CacheKey, KeyPlan, digest_bytes, digest_parts};
pub use planner::{CachePlan, PlanEntry};
pub use store::MemoryCache;
