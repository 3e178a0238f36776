//! Scheme registry and round-tripper.

use std::collections::HashMap;
use std::sync::Arc;

use http::{HeaderMap, Response};
use imgstore_azure::AzureStorage;
use imgstore_core::url::{bucket_and_key, parse_url};
use imgstore_core::{ObjectBody, StorageReader};
use imgstore_fs::FsStorage;
use imgstore_gcs::GcsStorage;
use imgstore_s3::S3Storage;
use imgstore_swift::SwiftStorage;
use tracing::{debug, info};

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::passthrough::HttpPassthrough;

/// Schemes served by [`HttpPassthrough`] instead of a reader.
const HTTP_SCHEMES: [&str; 2] = ["http", "https"];

/// Routes source URLs to the reader registered for their scheme.
///
/// # Examples
///
/// ```
/// use imgstore_transport::Transport;
///
/// let transport = Transport::new("?");
/// assert!(transport.is_protocol_registered("https"));
/// assert!(!transport.is_protocol_registered("s3"));
/// ```
#[derive(Debug)]
pub struct Transport {
    query_separator: String,
    readers: HashMap<String, Arc<dyn StorageReader>>,
    http: HttpPassthrough,
}

impl Transport {
    /// A transport with only `http` and `https` available.
    #[must_use]
    pub fn new(query_separator: impl Into<String>) -> Self {
        Self {
            query_separator: query_separator.into(),
            readers: HashMap::new(),
            http: HttpPassthrough::default(),
        }
    }

    /// Build every reader `config` enables and register it.
    pub async fn from_config(config: &TransportConfig) -> TransportResult<Self> {
        let mut transport = Self::new(config.query_separator.clone());

        if config.fs.is_enabled() {
            transport.register("local", Arc::new(FsStorage::new(&config.fs)?));
        }
        if config.use_s3 {
            transport.register("s3", Arc::new(S3Storage::new(config.s3.clone()).await?));
        }
        if config.use_gcs {
            transport.register("gs", Arc::new(GcsStorage::new(config.gcs.clone()).await?));
        }
        if config.use_abs {
            transport.register("abs", Arc::new(AzureStorage::new(config.azure.clone())?));
        }
        if config.use_swift {
            transport.register(
                "swift",
                Arc::new(SwiftStorage::new(config.swift.clone()).await?),
            );
        }

        Ok(transport)
    }

    /// Serve `scheme` URLs with `reader`, replacing any previous one.
    pub fn register(&mut self, scheme: &str, reader: Arc<dyn StorageReader>) {
        self.readers.insert(scheme.to_owned(), reader);
        info!(scheme, "Scheme registered");
    }

    /// Whether URLs with `scheme` can be fetched.
    #[must_use]
    pub fn is_protocol_registered(&self, scheme: &str) -> bool {
        HTTP_SCHEMES.contains(&scheme) || self.readers.contains_key(scheme)
    }

    /// Registered schemes, sorted, including `http` and `https`.
    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = HTTP_SCHEMES
            .into_iter()
            .chain(self.readers.keys().map(String::as_str))
            .collect();
        schemes.sort_unstable();
        schemes
    }

    /// Fetch `url`, honoring the range and conditional headers of
    /// `req_headers`, and render the result as an HTTP response.
    ///
    /// Storage URLs may contain `%`, `?` and `#` literally. The key is cut at
    /// the configured query separator and the remainder is handed to the
    /// reader as its version token.
    pub async fn round_trip(
        &self,
        url: &str,
        req_headers: &HeaderMap,
    ) -> TransportResult<Response<ObjectBody>> {
        let parsed = parse_url(url).map_err(|source| TransportError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;
        let scheme = parsed.scheme();

        if HTTP_SCHEMES.contains(&scheme) {
            return self.http.fetch(parsed, req_headers).await;
        }

        let reader = self
            .readers
            .get(scheme)
            .ok_or_else(|| TransportError::UnsupportedScheme(scheme.to_owned()))?;

        let location = bucket_and_key(&parsed, &self.query_separator);
        debug!(
            scheme,
            bucket = %location.bucket,
            key = %location.key,
            query = %location.query,
            "routing source request"
        );

        let obj = reader
            .get_object(req_headers, &location.bucket, &location.key, &location.query)
            .await?;
        Ok(obj.into_response())
    }
}
