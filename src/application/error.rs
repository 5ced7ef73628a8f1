use thiserror::Error;

use crate::{
    application::render::{RenderResult, SerializerError},
    cache::CacheError,
    config::LoadError,
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Failure of a single render call.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render configuration error: {message}")]
    Configuration { message: String },
    #[error("cache read failed: {0}")]
    Backend(#[source] CacheError),
    /// Rendering succeeded but persisting the new entries failed. The merged
    /// output is kept so the caller can still use it.
    #[error("cache write-back failed for {} rendered values: {source}", values.len())]
    WriteBack {
        #[source]
        source: CacheError,
        values: RenderResult,
    },
    #[error(transparent)]
    Serializer(#[from] SerializerError),
    #[error("render invariant violated: {message}")]
    Invariant { message: String },
}

impl RenderError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// Rendered output still available despite the error, if any.
    pub fn recovered_values(&self) -> Option<&RenderResult> {
        match self {
            RenderError::WriteBack { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Take the rendered output out of a write-back failure.
    pub fn into_values(self) -> Result<RenderResult, RenderError> {
        match self {
            RenderError::WriteBack { values, .. } => Ok(values),
            other => Err(other),
        }
    }
}

/// Top-level error of the `platter` binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code reported by the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Validation(_)
            | AppError::Config(_)
            | AppError::Domain(DomainError::Validation { .. }) => 2,
            AppError::Render(RenderError::Configuration { .. }) => 3,
            AppError::Render(RenderError::Backend(_) | RenderError::WriteBack { .. }) => 4,
            _ => 1,
        }
    }
}
