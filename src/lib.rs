//! platter: render collections of domain objects to JSON through a batch
//! read-through cache.
//!
//! ```no_run
//! # async fn demo() -> Result<(), platter::application::error::RenderError> {
//! use std::sync::Arc;
//!
//! use platter::application::render::{BatchRenderer, Collection, RenderOptions};
//! use platter::cache::{CacheConfig, MemoryCache};
//! use platter::domain::documents::{Document, DocumentSerializer};
//!
//! let documents: Vec<Document> = Vec::new();
//! let config = CacheConfig::default();
//! let renderer = BatchRenderer::new(Arc::new(MemoryCache::new(&config)), config);
//! let values = renderer
//!     .render(
//!         &Collection::from_members(&documents),
//!         &DocumentSerializer::new(),
//!         &RenderOptions::default(),
//!     )
//!     .await?;
//! assert!(values.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
