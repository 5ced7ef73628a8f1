//! Behaviour of `BatchRenderer` against recording cache and serializer doubles.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use platter::application::error::RenderError;
use platter::application::render::{
    BatchRenderer, Collection, RenderOptions, RenderedValue, Serializer, SerializerError,
    Versioned, render_uncached,
};
use platter::cache::{CacheClient, CacheConfig, CacheError, CacheKey, KeyPlan, MemoryCache};

#[derive(Debug, Clone)]
struct Widget {
    id: u32,
    version: Option<u32>,
    name: &'static str,
}

impl Widget {
    fn new(id: u32, name: &'static str) -> Self {
        Self {
            id,
            version: Some(1),
            name,
        }
    }
}

impl Versioned for Widget {
    fn cache_version(&self) -> Option<Cow<'_, str>> {
        self.version
            .map(|version| Cow::Owned(format!("widgets/{}-{version}", self.id)))
    }
}

#[derive(Default)]
struct WidgetSerializer {
    no_caching: bool,
    fail_preload: bool,
    fail_on: Option<u32>,
    preloads: Mutex<Vec<Vec<&'static str>>>,
    renders: Mutex<Vec<&'static str>>,
}

impl WidgetSerializer {
    fn uncached() -> Self {
        Self {
            no_caching: true,
            ..Default::default()
        }
    }

    fn preloads(&self) -> Vec<Vec<&'static str>> {
        self.preloads.lock().expect("preloads lock").clone()
    }

    fn renders(&self) -> Vec<&'static str> {
        self.renders.lock().expect("renders lock").clone()
    }
}

impl Serializer for WidgetSerializer {
    type Model = Widget;

    fn cache_key_base(&self) -> Cow<'_, str> {
        Cow::Borrowed("widget")
    }

    fn do_caching(&self) -> bool {
        !self.no_caching
    }

    fn preload(
        &self,
        models: &[&Widget],
        _options: &RenderOptions,
    ) -> Result<(), SerializerError> {
        self.preloads
            .lock()
            .expect("preloads lock")
            .push(models.iter().map(|widget| widget.name).collect());
        if self.fail_preload {
            return Err(SerializerError::preload("associations unavailable"));
        }
        Ok(())
    }

    fn render(
        &self,
        widget: &Widget,
        options: &RenderOptions,
    ) -> Result<RenderedValue, SerializerError> {
        if self.fail_on == Some(widget.id) {
            return Err(SerializerError::render(widget.name, "refused"));
        }
        self.renders.lock().expect("renders lock").push(widget.name);
        Ok(json!({
            "id": widget.id,
            "name": widget.name,
            "locale": options.get("locale").cloned().unwrap_or(Value::Null),
        }))
    }
}

#[derive(Default)]
struct RecordingCache {
    entries: Mutex<HashMap<CacheKey, RenderedValue>>,
    reads: Mutex<Vec<Vec<CacheKey>>>,
    writes: Mutex<Vec<Vec<(CacheKey, RenderedValue)>>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl RecordingCache {
    fn with_entries(entries: impl IntoIterator<Item = (CacheKey, RenderedValue)>) -> Self {
        Self {
            entries: Mutex::new(entries.into_iter().collect()),
            ..Default::default()
        }
    }

    fn reads(&self) -> Vec<Vec<CacheKey>> {
        self.reads.lock().expect("reads lock").clone()
    }

    fn writes(&self) -> Vec<Vec<(CacheKey, RenderedValue)>> {
        self.writes.lock().expect("writes lock").clone()
    }

    fn untouched(&self) -> bool {
        self.reads().is_empty() && self.writes().is_empty()
    }
}

#[async_trait]
impl CacheClient for RecordingCache {
    async fn read_multi(
        &self,
        keys: &[CacheKey],
    ) -> Result<HashMap<CacheKey, RenderedValue>, CacheError> {
        self.reads.lock().expect("reads lock").push(keys.to_vec());
        if self.fail_reads {
            return Err(CacheError::unavailable("read refused"));
        }
        let entries = self.entries.lock().expect("entries lock");
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    async fn write_multi(&self, entries: &[(CacheKey, RenderedValue)]) -> Result<(), CacheError> {
        self.writes
            .lock()
            .expect("writes lock")
            .push(entries.to_vec());
        if self.fail_writes {
            return Err(CacheError::unavailable("write refused"));
        }
        let mut stored = self.entries.lock().expect("entries lock");
        for (key, value) in entries {
            stored.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

fn renderer(cache: &Arc<RecordingCache>) -> BatchRenderer {
    BatchRenderer::new(cache.clone(), CacheConfig::default())
}

fn key_of(serializer: &WidgetSerializer, widget: &Widget, options: &RenderOptions) -> CacheKey {
    KeyPlan::new("platter", serializer, widget, options)
        .cache_key()
        .expect("widget key")
}

fn rendered(widget: &Widget) -> Value {
    json!({ "id": widget.id, "name": widget.name, "locale": null })
}

#[tokio::test]
async fn renders_only_misses_and_writes_them_back() {
    let serializer = WidgetSerializer::default();
    let options = RenderOptions::default();
    let a = Widget::new(1, "a");
    let b = Widget::new(2, "b");
    let k1 = key_of(&serializer, &a, &options);
    let k2 = key_of(&serializer, &b, &options);

    let cache = Arc::new(RecordingCache::with_entries([(k1.clone(), json!("cachedA"))]));
    let items = vec![a, b.clone()];

    let values = renderer(&cache)
        .render(&Collection::versioned(&items, "v1"), &serializer, &options)
        .await
        .expect("render");

    assert_eq!(values, vec![json!("cachedA"), rendered(&b)]);
    assert_eq!(serializer.preloads(), vec![vec!["b"]]);
    assert_eq!(serializer.renders(), vec!["b"]);
    assert_eq!(cache.reads(), vec![vec![k1, k2.clone()]]);
    assert_eq!(cache.writes(), vec![vec![(k2, rendered(&b))]]);
}

#[tokio::test]
async fn empty_collection_touches_nothing() {
    let serializer = WidgetSerializer::default();
    let cache = Arc::new(RecordingCache::default());
    let items: Vec<Widget> = Vec::new();

    let values = renderer(&cache)
        .render(
            &Collection::versioned(&items, "v1"),
            &serializer,
            &RenderOptions::default(),
        )
        .await
        .expect("render");

    assert!(values.is_empty());
    assert!(cache.untouched());
    assert!(serializer.preloads().is_empty());
    assert!(serializer.renders().is_empty());
}

#[tokio::test]
async fn serializer_without_caching_renders_everything_uncached() {
    let serializer = WidgetSerializer::uncached();
    let cache = Arc::new(RecordingCache::default());
    let items = vec![Widget::new(1, "a"), Widget::new(2, "b"), Widget::new(3, "c")];

    let values = renderer(&cache)
        .render(
            &Collection::versioned(&items, "v1"),
            &serializer,
            &RenderOptions::default(),
        )
        .await
        .expect("render");

    assert_eq!(values, items.iter().map(rendered).collect::<Vec<_>>());
    assert_eq!(serializer.preloads(), vec![vec!["a", "b", "c"]]);
    assert_eq!(serializer.renders(), vec!["a", "b", "c"]);
    assert!(cache.untouched());
}

#[tokio::test]
async fn plain_collection_is_never_cached() {
    let serializer = WidgetSerializer::default();
    let cache = Arc::new(RecordingCache::default());
    let items = vec![Widget::new(1, "a"), Widget::new(2, "b")];

    let values = renderer(&cache)
        .render(
            &Collection::plain(&items),
            &serializer,
            &RenderOptions::default(),
        )
        .await
        .expect("render");

    assert_eq!(values, vec![rendered(&items[0]), rendered(&items[1])]);
    assert_eq!(serializer.preloads(), vec![vec!["a", "b"]]);
    assert!(cache.untouched());
}

#[tokio::test]
async fn disabled_cache_config_skips_cache() {
    let serializer = WidgetSerializer::default();
    let cache = Arc::new(RecordingCache::default());
    let items = vec![Widget::new(1, "a")];

    let renderer = BatchRenderer::new(cache.clone(), CacheConfig::disabled());
    let values = renderer
        .render(
            &Collection::versioned(&items, "v1"),
            &serializer,
            &RenderOptions::default(),
        )
        .await
        .expect("render");

    assert_eq!(values, vec![rendered(&items[0])]);
    assert!(cache.untouched());
}

#[tokio::test]
async fn full_hits_skip_preload_render_and_write() {
    let serializer = WidgetSerializer::default();
    let options = RenderOptions::default();
    let items = vec![Widget::new(1, "a"), Widget::new(2, "b")];
    let cache = Arc::new(RecordingCache::with_entries([
        (key_of(&serializer, &items[0], &options), json!("A")),
        (key_of(&serializer, &items[1], &options), json!("B")),
    ]));

    let values = renderer(&cache)
        .render(&Collection::versioned(&items, "v1"), &serializer, &options)
        .await
        .expect("render");

    assert_eq!(values, vec![json!("A"), json!("B")]);
    assert!(serializer.preloads().is_empty());
    assert!(serializer.renders().is_empty());
    assert_eq!(cache.reads().len(), 1);
    assert!(cache.writes().is_empty());
}

#[tokio::test]
async fn duplicate_keys_render_once_and_fill_every_position() {
    let serializer = WidgetSerializer::default();
    let options = RenderOptions::default();
    // Same id and version, so the same key, but different content.
    let first = Widget::new(7, "first");
    let other = Widget::new(8, "other");
    let second = Widget::new(7, "second");
    let items = vec![first, other, second.clone()];
    let cache = Arc::new(RecordingCache::default());

    let values = renderer(&cache)
        .render(&Collection::versioned(&items, "v1"), &serializer, &options)
        .await
        .expect("render");

    assert_eq!(values.len(), 3);
    assert_eq!(values[0], values[2]);
    // The later object represents the shared key.
    assert_eq!(values[0], rendered(&second));
    assert_eq!(serializer.renders(), vec!["second", "other"]);
    assert_eq!(cache.reads()[0].len(), 2);
    assert_eq!(cache.writes()[0].len(), 2);
}

#[tokio::test]
async fn order_is_preserved_for_mixed_hits() {
    let serializer = WidgetSerializer::default();
    let options = RenderOptions::default();
    let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
    let items: Vec<Widget> = names
        .into_iter()
        .enumerate()
        .map(|(index, name)| Widget::new(index as u32, name))
        .collect();

    let cached = items
        .iter()
        .filter(|widget| widget.id % 3 == 0)
        .map(|widget| (key_of(&serializer, widget, &options), rendered(widget)));
    let cache = Arc::new(RecordingCache::with_entries(cached));

    let values = renderer(&cache)
        .render(&Collection::versioned(&items, "v1"), &serializer, &options)
        .await
        .expect("render");

    for (widget, value) in items.iter().zip(&values) {
        assert_eq!(value, &rendered(widget));
    }
    assert_eq!(serializer.renders(), vec!["b", "c", "e", "f", "h"]);
    assert_eq!(serializer.preloads(), vec![vec!["b", "c", "e", "f", "h"]]);
}

#[tokio::test]
async fn second_pass_is_served_from_memory_cache() {
    let serializer = WidgetSerializer::default();
    let options = RenderOptions::new().with("locale", json!("en"));
    let config = CacheConfig::default();
    let store = Arc::new(MemoryCache::new(&config));
    let renderer = BatchRenderer::new(store.clone(), config);
    let items = vec![Widget::new(1, "a"), Widget::new(2, "b")];
    let collection = Collection::versioned(&items, "v1");

    let first = renderer
        .render(&collection, &serializer, &options)
        .await
        .expect("first pass");
    let second = renderer
        .render(&collection, &serializer, &options)
        .await
        .expect("second pass");

    assert_eq!(first, second);
    assert_eq!(first[0]["locale"], json!("en"));
    assert_eq!(serializer.renders(), vec!["a", "b"]);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn missing_version_is_a_configuration_error() {
    let serializer = WidgetSerializer::default();
    let cache = Arc::new(RecordingCache::default());
    let mut unversioned = Widget::new(2, "b");
    unversioned.version = None;
    let items = vec![Widget::new(1, "a"), unversioned];

    let err = renderer(&cache)
        .render(
            &Collection::versioned(&items, "v1"),
            &serializer,
            &RenderOptions::default(),
        )
        .await
        .expect_err("unversioned widget");

    assert!(matches!(err, RenderError::Configuration { .. }));
    assert!(cache.untouched());
    assert!(serializer.renders().is_empty());
}

#[tokio::test]
async fn read_failure_aborts_without_rendering() {
    let serializer = WidgetSerializer::default();
    let cache = Arc::new(RecordingCache {
        fail_reads: true,
        ..Default::default()
    });
    let items = vec![Widget::new(1, "a")];

    let err = renderer(&cache)
        .render(
            &Collection::versioned(&items, "v1"),
            &serializer,
            &RenderOptions::default(),
        )
        .await
        .expect_err("read failure");

    assert!(matches!(err, RenderError::Backend(CacheError::Unavailable { .. })));
    assert!(serializer.preloads().is_empty());
    assert!(serializer.renders().is_empty());
    assert!(cache.writes().is_empty());
}

#[tokio::test]
async fn write_failure_surfaces_with_rendered_values() {
    let serializer = WidgetSerializer::default();
    let options = RenderOptions::default();
    let items = vec![Widget::new(1, "a"), Widget::new(2, "b")];
    let cache = Arc::new(RecordingCache {
        fail_writes: true,
        ..RecordingCache::with_entries([(key_of(&serializer, &items[0], &options), json!("A"))])
    });

    let err = renderer(&cache)
        .render(&Collection::versioned(&items, "v1"), &serializer, &options)
        .await
        .expect_err("write failure");

    assert!(matches!(err, RenderError::WriteBack { .. }));
    assert_eq!(cache.writes().len(), 1);
    let values = err.into_values().expect("values kept");
    assert_eq!(values, vec![json!("A"), rendered(&items[1])]);
}

#[tokio::test]
async fn serializer_failure_skips_write_back() {
    let serializer = WidgetSerializer {
        fail_on: Some(2),
        ..Default::default()
    };
    let cache = Arc::new(RecordingCache::default());
    let items = vec![Widget::new(1, "a"), Widget::new(2, "b")];

    let err = renderer(&cache)
        .render(
            &Collection::versioned(&items, "v1"),
            &serializer,
            &RenderOptions::default(),
        )
        .await
        .expect_err("render failure");

    assert!(matches!(err, RenderError::Serializer(SerializerError::Render { .. })));
    assert_eq!(cache.reads().len(), 1);
    assert!(cache.writes().is_empty());
}

#[tokio::test]
async fn preload_failure_skips_render_and_write_back() {
    let serializer = WidgetSerializer {
        fail_preload: true,
        ..Default::default()
    };
    let cache = Arc::new(RecordingCache::default());
    let items = vec![Widget::new(1, "a"), Widget::new(2, "b")];

    let err = renderer(&cache)
        .render(
            &Collection::versioned(&items, "v1"),
            &serializer,
            &RenderOptions::default(),
        )
        .await
        .expect_err("preload failure");

    assert!(matches!(err, RenderError::Serializer(SerializerError::Preload { .. })));
    assert_eq!(serializer.preloads(), vec![vec!["a", "b"]]);
    assert!(serializer.renders().is_empty());
    assert_eq!(cache.reads().len(), 1);
    assert!(cache.writes().is_empty());
}

#[tokio::test]
async fn render_one_reads_and_writes_a_single_key() {
    let serializer = WidgetSerializer::default();
    let options = RenderOptions::default();
    let cache = Arc::new(RecordingCache::default());
    let widget = Widget::new(5, "solo");
    let renderer = renderer(&cache);

    let first = renderer
        .render_one(&widget, &serializer, &options)
        .await
        .expect("first render");
    let second = renderer
        .render_one(&widget, &serializer, &options)
        .await
        .expect("second render");

    assert_eq!(first, rendered(&widget));
    assert_eq!(first, second);
    assert_eq!(serializer.renders(), vec!["solo"]);
    assert_eq!(
        cache.reads(),
        vec![
            vec![key_of(&serializer, &widget, &options)],
            vec![key_of(&serializer, &widget, &options)],
        ]
    );
    assert_eq!(cache.writes().len(), 1);
}

#[test]
fn render_uncached_preserves_order() {
    let serializer = WidgetSerializer::default();
    let items = vec![Widget::new(3, "c"), Widget::new(1, "a"), Widget::new(2, "b")];

    let values =
        render_uncached(&items, &serializer, &RenderOptions::default()).expect("render");

    assert_eq!(values, items.iter().map(rendered).collect::<Vec<_>>());
    assert_eq!(serializer.preloads(), vec![vec!["c", "a", "b"]]);
}

/// Model type with no version marker at all.
struct Draft(&'static str);

struct DraftSerializer;

impl Serializer for DraftSerializer {
    type Model = Draft;

    fn cache_key_base(&self) -> Cow<'_, str> {
        Cow::Borrowed("draft")
    }

    fn render(
        &self,
        draft: &Draft,
        _options: &RenderOptions,
    ) -> Result<RenderedValue, SerializerError> {
        Ok(json!(draft.0))
    }
}

#[test]
fn unversioned_models_render_through_render_uncached() {
    let drafts = [Draft("x"), Draft("y")];

    let values =
        render_uncached(&drafts, &DraftSerializer, &RenderOptions::default()).expect("render");

    assert_eq!(values, vec![json!("x"), json!("y")]);
}
