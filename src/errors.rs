use thiserror::Error;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Represents missing or empty required input.
    #[error("{0}")]
    Validation(String),

    /// Represents a language code outside the supported set.
    #[error("language [{0}] is not supported")]
    UnsupportedLanguage(String),

    /// Represents a reference to an address that does not exist.
    #[error("address {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    /// Represents a listing cursor that no longer resolves to an address.
    #[error("cursor {0} does not refer to an existing address")]
    CursorNotFound(String),

    /// Represents a missing system prompt.
    #[error("prompt {key} not found for language {language}")]
    PromptNotFound { language: String, key: String },

    /// Represents a creation blocked by the near-duplicate check.
    #[error("address with name '{}' and similar tags ({:.0}% similarity) already exists", .name, .similarity * 100.0)]
    Duplicate { name: String, similarity: f64 },

    /// Represents an SQL error.
    #[error("SQLx error")]
    Sqlx { source: sqlx::Error },

    /// Represents a stored document that could not be decoded.
    #[error("failed to parse address document {id}")]
    MalformedDocument { id: String, source: serde_json::Error },

    /// Represents a failure to encode an address as a document.
    #[error("failed to encode address")]
    Encode { source: serde_json::Error },

    /// Represents a transport failure talking to the language model.
    #[error("chat completion failed")]
    LanguageModelRequest { source: reqwest::Error },

    /// Represents a non-success response from the language model.
    #[error("chat completion failed with status {status}: {body}")]
    LanguageModelStatus { status: u16, body: String },

    /// Represents a completion without any choices.
    #[error("no choices returned from completion")]
    NoChoices,

    /// Represents generated content that does not match the address batch shape.
    #[error("failed to unmarshal response")]
    SchemaDecode {
        content: String,
        source: serde_json::Error,
    },
}

/// The broad classes callers map to user-facing codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Upstream,
    SchemaDecode,
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        use CatalogError::*;

        match self {
            Validation(..) | UnsupportedLanguage(..) => ErrorKind::Validation,
            NotFound { .. } | CursorNotFound(..) | PromptNotFound { .. } => ErrorKind::NotFound,
            Duplicate { .. } => ErrorKind::Conflict,
            SchemaDecode { .. } => ErrorKind::SchemaDecode,
            Sqlx { .. }
            | MalformedDocument { .. }
            | Encode { .. }
            | LanguageModelRequest { .. }
            | LanguageModelStatus { .. }
            | NoChoices => ErrorKind::Upstream,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        CatalogError::Validation(message.into())
    }
}
