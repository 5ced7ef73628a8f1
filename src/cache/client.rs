//! Cache backend interface consumed by the batch renderer.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::application::render::RenderedValue;

use super::keys::CacheKey;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {message}")]
    Unavailable { message: String },
    #[error("cache entry could not be encoded: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Batch-oriented cache backend.
///
/// Both operations are single round trips. Implementations own their retry
/// policy; callers never retry.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Fetch every key at once. Only hits are present in the returned map.
    async fn read_multi(
        &self,
        keys: &[CacheKey],
    ) -> Result<HashMap<CacheKey, RenderedValue>, CacheError>;

    /// Store every entry at once. Keys are unique within one call.
    async fn write_multi(&self, entries: &[(CacheKey, RenderedValue)]) -> Result<(), CacheError>;
}
