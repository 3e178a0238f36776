//! Transport error types.

use imgstore_core::StorageError;

/// Transport error type.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The source URL can't be parsed.
    #[error("invalid source URL {url:?}: {source}")]
    InvalidUrl {
        /// The URL as given.
        url: String,
        /// The parser error.
        #[source]
        source: url::ParseError,
    },

    /// No reader is registered for the URL scheme.
    #[error("unsupported protocol {0:?}")]
    UnsupportedScheme(String),

    /// A reader failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An `http(s)` source request failed.
    #[error("source request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
