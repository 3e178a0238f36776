//! Error types shared by all storage readers.
//!
//! A [`StorageError`] is returned only for conditions a caller cannot render
//! as an HTTP response on its own. Expected negative outcomes (not found, not
//! modified, invalid range, backend-reported statuses) are represented as
//! [`crate::Object`] values instead.

/// Boxed error used as the source of backend failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Storage reader error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The bucket is rejected by the configured allow/deny lists.
    #[error("access to the {backend} bucket {bucket} is denied")]
    BucketDenied {
        /// Human-readable backend name.
        backend: &'static str,
        /// The rejected bucket or container.
        bucket: String,
    },

    /// The backend configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A request to the backend failed without a renderable HTTP status.
    #[error("{backend} request failed: {source}")]
    Backend {
        /// Human-readable backend name.
        backend: &'static str,
        /// The underlying client error.
        #[source]
        source: BoxError,
    },

    /// Client-side decryption of an object failed.
    #[error("can't decrypt object: {0}")]
    Decryption(String),

    /// Local I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StorageError {
    /// Wrap a native client error as a [`StorageError::Backend`].
    pub fn backend(backend: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            backend,
            source: source.into(),
        }
    }

    /// Build a [`StorageError::Config`] from a message.
    pub fn config(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Config(ConfigError::Invalid {
            backend,
            message: message.into(),
        })
    }
}

/// Configuration validation error, reported when an adapter is constructed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is missing.
    #[error("{backend} {field} must be set")]
    Missing {
        /// Human-readable backend name.
        backend: &'static str,
        /// The missing setting.
        field: &'static str,
    },

    /// A setting has an unusable value.
    #[error("invalid {backend} configuration: {message}")]
    Invalid {
        /// Human-readable backend name.
        backend: &'static str,
        /// What is wrong with the configuration.
        message: String,
    },
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
