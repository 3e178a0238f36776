//! Google Cloud Storage reader configuration.

use imgstore_core::{BucketPolicy, env};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Google Cloud Storage reader configuration.
///
/// # Examples
///
/// ```
/// use imgstore_gcs::GcsConfig;
///
/// let config = GcsConfig::builder()
///     .endpoint("http://localhost:4443".into())
///     .anonymous(true)
///     .build();
/// assert!(config.key.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct GcsConfig {
    /// Service account key JSON. Empty means ambient credentials.
    #[builder(default)]
    #[serde(default)]
    pub key: String,

    /// Custom storage endpoint, e.g. an emulator.
    #[builder(default)]
    #[serde(default)]
    pub endpoint: String,

    /// Skip authentication entirely.
    #[builder(default = false)]
    #[serde(default)]
    pub anonymous: bool,

    /// Bucket allow/deny lists.
    #[builder(default)]
    #[serde(default)]
    pub buckets: BucketPolicy,
}

impl GcsConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `IMGSTORE_GCS_KEY` | (empty) |
    /// | `IMGSTORE_GCS_ENDPOINT` | (empty) |
    /// | `IMGSTORE_GCS_ANONYMOUS` | `false` |
    /// | `IMGSTORE_GCS_ALLOWED_BUCKETS` | (empty) |
    /// | `IMGSTORE_GCS_DENIED_BUCKETS` | (empty) |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env::string("IMGSTORE_GCS_KEY") {
            config.key = v;
        }
        if let Some(v) = env::string("IMGSTORE_GCS_ENDPOINT") {
            config.endpoint = v;
        }
        if let Some(v) = env::boolean("IMGSTORE_GCS_ANONYMOUS") {
            config.anonymous = v;
        }
        config.buckets =
            BucketPolicy::from_env("IMGSTORE_GCS_ALLOWED_BUCKETS", "IMGSTORE_GCS_DENIED_BUCKETS");

        config
    }
}
