//! Error types for precache striping.

use thiserror::Error;

/// Result type alias for striping operations.
pub type Result<T> = std::result::Result<T, StripingError>;

/// Errors raised synchronously by the coordinator and its helpers.
#[derive(Error, Debug)]
pub enum StripingError {
    #[error("Invalid bucket count: {0} (must be at least 1)")]
    InvalidBucketCount(usize),

    #[error("Conflicting precache entries for {url}: {existing} vs {incoming}")]
    ConflictingEntries {
        url: String,
        existing: String,
        incoming: String,
    },

    #[error("Conflicting integrity for {cache_key}: {existing} vs {incoming}")]
    ConflictingIntegrity {
        cache_key: String,
        existing: String,
        incoming: String,
    },

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl StripingError {
    /// Create an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }
}

/// Errors reported by a registry's asynchronous install, activate or
/// request handling. These surface through the lifecycle event, never
/// through the coordinator's own methods.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Bad precaching response for {url}: status {status}")]
    BadResponse { url: String, status: u16 },

    #[error("Cache error: {0}")]
    Storage(String),
}

impl RegistryError {
    /// Create a network error.
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// URL involved in the failure, when there is one.
    pub fn url(&self) -> Option<&str> {
        match self {
            RegistryError::Network { url, .. } | RegistryError::BadResponse { url, .. } => {
                Some(url)
            }
            RegistryError::Storage(_) => None,
        }
    }
}
