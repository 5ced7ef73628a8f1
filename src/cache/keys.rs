//! Cache key definitions.
//!
//! Defines `CacheKey` for rendered entries and `KeyPlan`, which derives the key
//! for one object rendered by one serializer with one set of options.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::application::error::RenderError;
use crate::application::render::{RenderOptions, Serializer, Versioned};

/// Separator placed between key segments.
pub const CACHE_KEY_SEPARATOR: char = '+';

/// Opaque identifier of one rendered value in the cache.
///
/// Two objects deriving the same key are interchangeable as far as the cache
/// is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Key derivation for a single `(serializer, object, options)` triple.
///
/// Segments, joined with [`CACHE_KEY_SEPARATOR`]:
/// prefix, serializer base, dependency key, addons digest, object version,
/// options digest. Optional segments are skipped when absent or empty.
pub struct KeyPlan<'a, S: Serializer> {
    prefix: &'a str,
    serializer: &'a S,
    model: &'a S::Model,
    options: &'a RenderOptions,
}

impl<'a, S> KeyPlan<'a, S>
where
    S: Serializer,
    S::Model: Versioned,
{
    pub fn new(
        prefix: &'a str,
        serializer: &'a S,
        model: &'a S::Model,
        options: &'a RenderOptions,
    ) -> Self {
        Self {
            prefix,
            serializer,
            model,
            options,
        }
    }

    /// Derive the cache key.
    ///
    /// Fails with a configuration error when the object exposes no version
    /// marker; such an object can never be cached safely.
    pub fn cache_key(&self) -> Result<CacheKey, RenderError> {
        let version = self.model.cache_version().ok_or_else(|| {
            RenderError::configuration(format!(
                "`{}` model does not expose a cache version",
                self.serializer.cache_key_base()
            ))
        })?;

        let mut segments: Vec<Cow<'_, str>> = Vec::with_capacity(6);
        if !self.prefix.is_empty() {
            segments.push(Cow::Borrowed(self.prefix));
        }
        segments.push(self.serializer.cache_key_base());
        if let Some(dependency) = self.serializer.dependency_key() {
            segments.push(Cow::Owned(dependency));
        }
        if let Some(addons) = self.addons_digest() {
            segments.push(Cow::Owned(addons));
        }
        segments.push(version);
        if !self.options.is_empty() {
            segments.push(Cow::Owned(self.options.digest()));
        }

        let mut key = String::new();
        for (index, segment) in segments.iter().enumerate() {
            if index > 0 {
                key.push(CACHE_KEY_SEPARATOR);
            }
            key.push_str(segment);
        }
        Ok(CacheKey(key))
    }

    fn addons_digest(&self) -> Option<String> {
        let addons = self.serializer.cache_key_addons(self.options);
        if addons.is_empty() {
            return None;
        }
        Some(digest_parts(addons.iter().map(String::as_str)))
    }
}

// ============================================================================
// Hash Utilities
// ============================================================================

/// SHA-256 hex digest of the given bytes.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 hex digest of a sequence of string parts.
///
/// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn digest_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}
