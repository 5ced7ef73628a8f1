//! Cache configuration.
//!
//! Controls the render cache via the `[cache]` table of `platter.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

// Default values for cache configuration
pub(crate) const DEFAULT_CAPACITY: usize = 1000;
pub(crate) const DEFAULT_KEY_PREFIX: &str = "platter";

/// Render cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Global switch; when off every render takes the uncached path.
    pub enabled: bool,
    /// Maximum rendered entries held by the in-memory store.
    pub capacity: usize,
    /// First segment of every derived cache key.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            key_prefix: settings.key_prefix.clone(),
        }
    }
}

impl CacheConfig {
    /// Configuration with caching switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
