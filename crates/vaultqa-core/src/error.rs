use thiserror::Error;

/// Common error types used across the VaultQA service
#[derive(Error, Debug)]
pub enum VaultQaError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid input: {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Embedding input exceeds context window (prompt tokens: {prompt_tokens:?}, window: {context_window:?})")]
    EmbeddingOverflow {
        prompt_tokens: Option<u32>,
        context_window: Option<u32>,
    },

    #[error("External service error: {service}: {message}")]
    ExternalService { service: String, message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl VaultQaError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for the overflow class handled by recursive batch halving.
    pub fn is_embedding_overflow(&self) -> bool {
        matches!(self, Self::EmbeddingOverflow { .. })
    }
}

/// Common Result type used across the VaultQA service
pub type Result<T> = std::result::Result<T, VaultQaError>;

/// Convert common error types
impl From<serde_json::Error> for VaultQaError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string())
    }
}

impl From<std::io::Error> for VaultQaError {
    fn from(error: std::io::Error) -> Self {
        Self::internal(error.to_string())
    }
}
