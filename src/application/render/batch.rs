//! Batch rendering with a read-through cache.
//!
//! A cached render derives one key per object, reads every key in one round
//! trip, renders only the misses, writes them back in one round trip and
//! merges hits and fresh values back into collection order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{Span, debug, field, instrument, warn};

use crate::application::error::RenderError;
use crate::cache::{CacheClient, CacheConfig, CacheKey, CachePlan, KeyPlan};

use super::types::{
    Collection, RenderOptions, RenderResult, RenderedValue, Serializer, Versioned,
};

const METRIC_RENDER_CACHE_HIT_TOTAL: &str = "platter_render_cache_hit_total";
const METRIC_RENDER_CACHE_MISS_TOTAL: &str = "platter_render_cache_miss_total";
const METRIC_RENDER_UNCACHED_TOTAL: &str = "platter_render_uncached_total";
const METRIC_RENDER_WRITE_ERROR_TOTAL: &str = "platter_render_write_error_total";
const METRIC_RENDER_MS: &str = "platter_render_ms";

/// Renders collections through an injected cache backend.
#[derive(Clone)]
pub struct BatchRenderer {
    client: Arc<dyn CacheClient>,
    config: CacheConfig,
}

impl BatchRenderer {
    pub fn new(client: Arc<dyn CacheClient>, config: CacheConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Render every object of `collection`, preserving order.
    ///
    /// The cache is consulted only when it is enabled, the serializer opts in
    /// and the collection is versioned. Otherwise every object is rendered and
    /// the cache is never touched.
    ///
    /// Models that do not implement [`Versioned`] can never be cached; render
    /// them with [`render_uncached`].
    #[instrument(
        skip_all,
        fields(
            strategy = %serializer.cache_key_base(),
            count = collection.len(),
            mode = field::Empty,
        )
    )]
    pub async fn render<S>(
        &self,
        collection: &Collection<'_, S::Model>,
        serializer: &S,
        options: &RenderOptions,
    ) -> Result<RenderResult, RenderError>
    where
        S: Serializer,
        S::Model: Versioned,
    {
        if collection.is_empty() {
            return Ok(Vec::new());
        }

        let started_at = Instant::now();
        let result = if self.use_cache(collection, serializer) {
            Span::current().record("mode", "cached");
            self.render_cached(collection.items(), serializer, options)
                .await
        } else {
            Span::current().record("mode", "uncached");
            counter!(METRIC_RENDER_UNCACHED_TOTAL).increment(collection.len() as u64);
            render_uncached(collection.items(), serializer, options)
        };
        histogram!(METRIC_RENDER_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        result
    }

    /// Render a single object through the same cache gate.
    ///
    /// A lone object is its own version, so it is cached whenever the
    /// serializer opts in; an unversioned object is a configuration error then.
    pub async fn render_one<S>(
        &self,
        model: &S::Model,
        serializer: &S,
        options: &RenderOptions,
    ) -> Result<RenderedValue, RenderError>
    where
        S: Serializer,
        S::Model: Versioned,
    {
        let collection = Collection::versioned(std::slice::from_ref(model), "single");
        self.render(&collection, serializer, options)
            .await?
            .pop()
            .ok_or_else(|| RenderError::invariant("single render produced no value"))
    }

    fn use_cache<S: Serializer>(
        &self,
        collection: &Collection<'_, S::Model>,
        serializer: &S,
    ) -> bool {
        self.config.enabled && serializer.do_caching() && collection.is_versioned()
    }

    async fn render_cached<S>(
        &self,
        items: &[S::Model],
        serializer: &S,
        options: &RenderOptions,
    ) -> Result<RenderResult, RenderError>
    where
        S: Serializer,
        S::Model: Versioned,
    {
        let mut plan = CachePlan::with_capacity(items.len());
        for model in items {
            let key = KeyPlan::new(&self.config.key_prefix, serializer, model, options)
                .cache_key()?;
            plan.push(key, model);
        }

        let hits = self
            .client
            .read_multi(&plan.keys())
            .await
            .map_err(RenderError::Backend)?;

        let misses: Vec<_> = plan
            .entries()
            .iter()
            .filter(|entry| !hits.contains_key(&entry.key))
            .collect();

        let hit_count = plan.distinct_len() - misses.len();
        counter!(METRIC_RENDER_CACHE_HIT_TOTAL).increment(hit_count as u64);
        counter!(METRIC_RENDER_CACHE_MISS_TOTAL).increment(misses.len() as u64);
        debug!(
            %plan,
            hits = hit_count,
            misses = misses.len(),
            "Render cache lookup"
        );

        let mut fresh = Vec::with_capacity(misses.len());
        if !misses.is_empty() {
            let models: Vec<&S::Model> = misses.iter().map(|entry| entry.model).collect();
            serializer.preload(&models, options)?;
            for entry in &misses {
                let value = serializer.render(entry.model, options)?;
                fresh.push((entry.key.clone(), value));
            }
        }

        let written = if fresh.is_empty() {
            Ok(())
        } else {
            self.client.write_multi(&fresh).await
        };

        let values = merge(&plan, hits, fresh)?;

        match written {
            Ok(()) => Ok(values),
            Err(source) => {
                counter!(METRIC_RENDER_WRITE_ERROR_TOTAL).increment(1);
                warn!(
                    error = %source,
                    count = values.len(),
                    "Render cache write-back failed; returning rendered values"
                );
                Err(RenderError::WriteBack { source, values })
            }
        }
    }
}

/// Render every object without touching any cache.
///
/// Preload runs once with the full slice, then each object is rendered in
/// order. This is the entry point for models without a version marker.
pub fn render_uncached<S: Serializer>(
    items: &[S::Model],
    serializer: &S,
    options: &RenderOptions,
) -> Result<RenderResult, RenderError> {
    let models: Vec<&S::Model> = items.iter().collect();
    serializer.preload(&models, options)?;

    let mut values = Vec::with_capacity(items.len());
    for model in items {
        values.push(serializer.render(model, options)?);
    }
    Ok(values)
}

/// Rebuild collection order from cache hits and freshly rendered values.
///
/// `fresh` must list the misses in plan order; each value is fanned out to
/// every position sharing its key.
fn merge<T>(
    plan: &CachePlan<'_, T>,
    mut hits: HashMap<CacheKey, RenderedValue>,
    fresh: Vec<(CacheKey, RenderedValue)>,
) -> Result<RenderResult, RenderError> {
    let mut slots: Vec<Option<RenderedValue>> = vec![None; plan.len()];
    let mut fresh = fresh.into_iter();

    for entry in plan.entries() {
        let value = match hits.remove(&entry.key) {
            Some(value) => value,
            None => match fresh.next() {
                Some((key, value)) if key == entry.key => value,
                Some((key, _)) => {
                    return Err(RenderError::invariant(format!(
                        "rendered `{key}` where `{}` was expected",
                        entry.key
                    )));
                }
                None => {
                    return Err(RenderError::invariant(format!(
                        "no rendered value left for `{}`",
                        entry.key
                    )));
                }
            },
        };

        let Some((&last, rest)) = entry.positions.split_last() else {
            continue;
        };
        for &position in rest {
            slots[position] = Some(value.clone());
        }
        slots[last] = Some(value);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(position, slot)| {
            slot.ok_or_else(|| {
                RenderError::invariant(format!("position {position} received no value"))
            })
        })
        .collect()
}
