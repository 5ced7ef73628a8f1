//! Generic JSON documents and their serializer.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::debug;
use uuid::Uuid;

use crate::application::render::{
    RenderOptions, RenderedValue, Serializer, SerializerError, Versioned,
};

use super::error::DomainError;

/// A stored record rendered by [`DocumentSerializer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Last modification; documents without it cannot be cached.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Document {
    pub fn new(id: Uuid, updated_at: OffsetDateTime) -> Self {
        Self {
            id,
            updated_at: Some(updated_at),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

impl Versioned for Document {
    fn cache_version(&self) -> Option<Cow<'_, str>> {
        let updated_at = self.updated_at?;
        Some(Cow::Owned(format!(
            "documents/{}-{}",
            self.id,
            updated_at.unix_timestamp_nanos()
        )))
    }
}

/// Parse a JSON array of documents.
pub fn parse_documents(input: &str) -> Result<Vec<Document>, DomainError> {
    let raw: Vec<Value> = serde_json::from_str(input)
        .map_err(|err| DomainError::validation(format!("expected a JSON array: {err}")))?;

    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value)
                .map_err(|err| DomainError::malformed(index, err.to_string()))
        })
        .collect()
}

/// Renders documents as `{ id, updated_at, ...attributes }`.
///
/// With a field selection only the listed attributes are emitted; unknown
/// names are skipped.
#[derive(Debug, Clone)]
pub struct DocumentSerializer {
    fields: Option<Vec<String>>,
    caching: bool,
}

impl Default for DocumentSerializer {
    fn default() -> Self {
        Self {
            fields: None,
            caching: true,
        }
    }
}

impl DocumentSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    fn copy_attributes(&self, document: &Document, object: &mut Map<String, Value>) {
        match &self.fields {
            Some(fields) => {
                for name in fields {
                    if let Some(value) = document.attributes.get(name) {
                        object.insert(name.clone(), value.clone());
                    }
                }
            }
            None => {
                for (name, value) in &document.attributes {
                    object.insert(name.clone(), value.clone());
                }
            }
        }
    }
}

impl Serializer for DocumentSerializer {
    type Model = Document;

    fn cache_key_base(&self) -> Cow<'_, str> {
        Cow::Borrowed("document")
    }

    fn cache_key_addons(&self, _options: &RenderOptions) -> Vec<String> {
        self.fields.clone().unwrap_or_default()
    }

    fn do_caching(&self) -> bool {
        self.caching
    }

    fn preload(
        &self,
        models: &[&Document],
        _options: &RenderOptions,
    ) -> Result<(), SerializerError> {
        debug!(count = models.len(), "Preloading documents");
        Ok(())
    }

    fn render(
        &self,
        document: &Document,
        _options: &RenderOptions,
    ) -> Result<RenderedValue, SerializerError> {
        let updated_at = match document.updated_at {
            Some(timestamp) => {
                let formatted = timestamp.format(&Rfc3339).map_err(|err| {
                    SerializerError::render(document.id.to_string(), err.to_string())
                })?;
                Value::String(formatted)
            }
            None => Value::Null,
        };

        let mut object = Map::new();
        self.copy_attributes(document, &mut object);
        // Attributes never shadow the record's own fields.
        object.insert("id".to_string(), Value::String(document.id.to_string()));
        object.insert("updated_at".to_string(), updated_at);
        Ok(Value::Object(object))
    }
}
