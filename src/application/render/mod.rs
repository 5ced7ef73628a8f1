//! Rendering of domain collections into JSON-ready values.
//!
//! Serializers stay pure: they map one model to one `serde_json::Value`.
//! `BatchRenderer` decides per call whether the cache is consulted and keeps
//! the output aligned with the input collection.

mod batch;
mod types;

pub use batch::{BatchRenderer, render_uncached};
pub use types::{
    Collection, Freshness, RenderOptions, RenderResult, RenderedValue, Serializer,
    SerializerError, Versioned,
};
