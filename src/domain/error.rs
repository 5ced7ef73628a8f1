use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("document {index} is malformed: {message}")]
    MalformedDocument { index: usize, message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn malformed(index: usize, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            index,
            message: message.into(),
        }
    }
}
