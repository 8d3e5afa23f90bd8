//! Error types for engram operations.
//!
//! Errors carry a structured [`ErrorCode`] for programmatic handling and an
//! optional suggestion for resolution. Per-signal retrieval failures are
//! normally swallowed by the engine and surfaced as response metadata; only
//! the variants documented as fatal reach callers of `search`.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for engram operations.
pub type EngramResult<T> = Result<T, EngramError>;

/// Main error type for all engram operations.
#[derive(Error, Debug)]
pub enum EngramError {
    /// Query was empty or whitespace-only.
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String, code: ErrorCode },

    /// The embedding provider or vector backend failed or timed out.
    ///
    /// Recoverable: the search degrades to the remaining signals.
    #[error("Semantic provider unavailable: {message}")]
    ProviderUnavailable {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Search requested before any successful index build.
    #[error("Index is stale: {message}")]
    IndexStale { message: String, code: ErrorCode },

    /// No retrieval pass produced a result list.
    #[error("All retrieval signals unavailable: {message}")]
    AllSignalsUnavailable {
        message: String,
        code: ErrorCode,
        failures: Vec<String>,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Item or node not found.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        item_id: Option<String>,
    },

    /// Embedding generation failed.
    #[error("Embedding error: {message}")]
    Embedding {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Repository (persistence) operation failed.
    #[error("Repository error: {message}")]
    Repository {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Long-running operation was cancelled.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider not supported.
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Search (SRCH_xxx)
    SrchInvalidQuery,
    SrchIndexStale,
    SrchAllSignalsUnavailable,

    // Semantic provider (SEM_xxx)
    SemUnavailable,
    SemTimeout,

    // Embedding (EMB_xxx)
    EmbConnectionFailed,
    EmbGenerationFailed,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,

    // Items / nodes (ITEM_xxx)
    ItemNotFound,
    NodeNotFound,

    // Repository (REPO_xxx)
    RepoConnectionFailed,
    RepoOperationFailed,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SrchInvalidQuery => "SRCH_001",
            ErrorCode::SrchIndexStale => "SRCH_002",
            ErrorCode::SrchAllSignalsUnavailable => "SRCH_003",
            ErrorCode::SemUnavailable => "SEM_001",
            ErrorCode::SemTimeout => "SEM_002",
            ErrorCode::EmbConnectionFailed => "EMB_001",
            ErrorCode::EmbGenerationFailed => "EMB_002",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ItemNotFound => "ITEM_001",
            ErrorCode::NodeNotFound => "ITEM_002",
            ErrorCode::RepoConnectionFailed => "REPO_001",
            ErrorCode::RepoOperationFailed => "REPO_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl EngramError {
    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
            code: ErrorCode::SrchInvalidQuery,
        }
    }

    /// Create a provider-unavailable error.
    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            message: message.into(),
            code: ErrorCode::SemUnavailable,
            source: None,
        }
    }

    /// Create a provider-unavailable error for an elapsed timeout.
    pub fn provider_timeout(timeout_ms: u64) -> Self {
        Self::ProviderUnavailable {
            message: format!("semantic pass exceeded {}ms", timeout_ms),
            code: ErrorCode::SemTimeout,
            source: None,
        }
    }

    /// Create an index-stale error.
    pub fn index_stale(message: impl Into<String>) -> Self {
        Self::IndexStale {
            message: message.into(),
            code: ErrorCode::SrchIndexStale,
        }
    }

    /// Create an all-signals-unavailable error from the per-pass failures.
    pub fn all_signals_unavailable(failures: Vec<String>) -> Self {
        Self::AllSignalsUnavailable {
            message: failures.join("; "),
            code: ErrorCode::SrchAllSignalsUnavailable,
            failures,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error with suggestion.
    pub fn validation_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create an item-not-found error.
    pub fn not_found(item_id: impl Into<String>) -> Self {
        let id = item_id.into();
        Self::NotFound {
            message: format!("Item with id '{}' not found", id),
            code: ErrorCode::ItemNotFound,
            item_id: Some(id),
        }
    }

    /// Create a node-not-found error.
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        let id = node_id.into();
        Self::NotFound {
            message: format!("Activation node '{}' not found", id),
            code: ErrorCode::NodeNotFound,
            item_id: Some(id),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
            code: ErrorCode::EmbGenerationFailed,
            source: None,
        }
    }

    /// Create a repository error.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
            code: ErrorCode::RepoOperationFailed,
            source: None,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the failure only degrades a single retrieval pass.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::Embedding { .. } | Self::IndexStale { .. }
        )
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidQuery { code, .. } => *code,
            Self::ProviderUnavailable { code, .. } => *code,
            Self::IndexStale { code, .. } => *code,
            Self::AllSignalsUnavailable { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Embedding { code, .. } => *code,
            Self::Repository { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::InvalidQuery { .. } => Some("Provide a non-empty query string"),
            Self::ProviderUnavailable { .. } => {
                Some("Check the embedding provider connection or raise the semantic timeout")
            }
            Self::IndexStale { .. } => Some("Index at least one item before searching"),
            Self::NotFound { .. } => Some("Please check the item ID and ensure it was indexed"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Embedding { .. } => Some("Please check your embedding provider configuration"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for EngramError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Repository {
            message: err.to_string(),
            code: ErrorCode::RepoOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_query_error() {
        let err = EngramError::invalid_query("query is empty");
        assert_eq!(err.code(), ErrorCode::SrchInvalidQuery);
        assert!(err.to_string().contains("query is empty"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_provider_timeout_is_recoverable() {
        let err = EngramError::provider_timeout(1500);
        assert_eq!(err.code(), ErrorCode::SemTimeout);
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("1500ms"));
    }

    #[test]
    fn test_all_signals_unavailable_joins_failures() {
        let err = EngramError::all_signals_unavailable(vec![
            "lexical: index stale".to_string(),
            "semantic: timeout".to_string(),
        ]);
        assert_eq!(err.code().as_str(), "SRCH_003");
        assert!(err.to_string().contains("lexical: index stale; semantic: timeout"));
    }

    #[test]
    fn test_not_found_error() {
        let err = EngramError::not_found("item-1");
        assert_eq!(err.code(), ErrorCode::ItemNotFound);
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::SrchInvalidQuery.as_str(), "SRCH_001");
        assert_eq!(ErrorCode::NodeNotFound.as_str(), "ITEM_002");
    }
}
