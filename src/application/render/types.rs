use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cache::digest_bytes;

/// JSON-ready output of rendering one object.
pub type RenderedValue = Value;

/// Ordered output of a render call, one value per input position.
pub type RenderResult = Vec<RenderedValue>;

#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("preload failed: {message}")]
    Preload { message: String },
    #[error("render failed for `{model}`: {message}")]
    Render { model: String, message: String },
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl SerializerError {
    pub fn preload(message: impl Into<String>) -> Self {
        Self::Preload {
            message: message.into(),
        }
    }

    pub fn render(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            model: model.into(),
            message: message.into(),
        }
    }
}

/// Options shared by every object of one render call.
///
/// Backed by an ordered map so the digest is independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderOptions {
    values: BTreeMap<String, Value>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Stable SHA-256 hex digest of the options, used in cache keys.
    pub fn digest(&self) -> String {
        // Serializing a BTreeMap of JSON values cannot fail.
        let encoded = serde_json::to_vec(&self.values).unwrap_or_default();
        digest_bytes(&encoded)
    }
}

impl FromIterator<(String, Value)> for RenderOptions {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Objects that expose a version marker for cache keys.
///
/// The marker must change whenever the rendered output could change, for
/// example by embedding an update timestamp.
pub trait Versioned {
    /// `None` when the object cannot be versioned; caching it is then a
    /// configuration error.
    fn cache_version(&self) -> Option<Cow<'_, str>>;
}

/// Renders one model type to JSON.
///
/// Implementations are synchronous; the only awaits of a render call are the
/// cache round trips.
pub trait Serializer: Send + Sync {
    type Model;

    /// Identity of this serializer in cache keys.
    fn cache_key_base(&self) -> Cow<'_, str>;

    /// Strategy-wide version; bump it to retire every entry of this serializer.
    fn dependency_key(&self) -> Option<String> {
        None
    }

    /// Extra key material derived from the options.
    fn cache_key_addons(&self, _options: &RenderOptions) -> Vec<String> {
        Vec::new()
    }

    fn do_caching(&self) -> bool {
        true
    }

    /// Batch hook run once before per-object rendering.
    fn preload(
        &self,
        _models: &[&Self::Model],
        _options: &RenderOptions,
    ) -> Result<(), SerializerError> {
        Ok(())
    }

    fn render(
        &self,
        model: &Self::Model,
        options: &RenderOptions,
    ) -> Result<RenderedValue, SerializerError>;
}

/// Aggregate freshness signal of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// The collection reports a version, e.g. the newest member's update time.
    Versioned(String),
    /// No aggregate signal; the collection is always rendered uncached.
    Unversioned,
}

/// Borrowed, ordered collection tagged with its freshness capability.
#[derive(Debug)]
pub struct Collection<'a, T> {
    items: &'a [T],
    freshness: Freshness,
}

impl<T> Clone for Collection<'_, T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items,
            freshness: self.freshness.clone(),
        }
    }
}

impl<'a, T> Collection<'a, T> {
    pub fn versioned(items: &'a [T], version: impl Into<String>) -> Self {
        Self {
            items,
            freshness: Freshness::Versioned(version.into()),
        }
    }

    pub fn plain(items: &'a [T]) -> Self {
        Self {
            items,
            freshness: Freshness::Unversioned,
        }
    }

    pub fn items(&self) -> &'a [T] {
        self.items
    }

    pub fn freshness(&self) -> &Freshness {
        &self.freshness
    }

    pub fn is_versioned(&self) -> bool {
        matches!(self.freshness, Freshness::Versioned(_))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a, T: Versioned> Collection<'a, T> {
    /// Versioned collection whose aggregate version is derived from its members.
    ///
    /// Falls back to a plain collection when any member is unversioned.
    pub fn from_members(items: &'a [T]) -> Self {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item.cache_version() {
                Some(version) => parts.push(version),
                None => return Self::plain(items),
            }
        }
        let version = crate::cache::digest_parts(parts.iter().map(|part| part.as_ref()));
        Self::versioned(items, format!("{}-{version}", items.len()))
    }
}
