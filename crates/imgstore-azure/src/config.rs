//! Azure Blob Storage reader configuration.

use imgstore_core::{BucketPolicy, ConfigError, env};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use url::Url;

/// Azure Blob Storage reader configuration.
///
/// # Examples
///
/// ```
/// use imgstore_azure::AzureConfig;
///
/// let config = AzureConfig::builder().name("photos".into()).build();
/// assert_eq!(
///     config.endpoint_url().unwrap().as_str(),
///     "https://photos.blob.core.windows.net/"
/// );
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AzureConfig {
    /// Storage account name.
    #[builder(default)]
    #[serde(default)]
    pub name: String,

    /// Blob service endpoint. Defaults to `https://<name>.blob.core.windows.net`.
    #[builder(default)]
    #[serde(default)]
    pub endpoint: String,

    /// Base64 account key. Empty means the ambient credential chain.
    #[builder(default)]
    #[serde(default)]
    pub key: String,

    /// Container allow/deny lists.
    #[builder(default)]
    #[serde(default)]
    pub buckets: BucketPolicy,
}

impl AzureConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `IMGSTORE_ABS_NAME` | (empty) |
    /// | `IMGSTORE_ABS_ENDPOINT` | (empty) |
    /// | `IMGSTORE_ABS_KEY` | (empty) |
    /// | `IMGSTORE_ABS_ALLOWED_BUCKETS` | (empty) |
    /// | `IMGSTORE_ABS_DENIED_BUCKETS` | (empty) |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env::string("IMGSTORE_ABS_NAME") {
            config.name = v;
        }
        if let Some(v) = env::string("IMGSTORE_ABS_ENDPOINT") {
            config.endpoint = v;
        }
        if let Some(v) = env::string("IMGSTORE_ABS_KEY") {
            config.key = v;
        }
        config.buckets =
            BucketPolicy::from_env("IMGSTORE_ABS_ALLOWED_BUCKETS", "IMGSTORE_ABS_DENIED_BUCKETS");

        config
    }

    /// Check that an account name is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Missing {
                backend: "Azure",
                field: "account name",
            });
        }
        Ok(())
    }

    /// Whether a custom endpoint replaces the public cloud one.
    #[must_use]
    pub fn has_custom_endpoint(&self) -> bool {
        !self.endpoint.is_empty()
    }

    /// The Blob service endpoint as a URL.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let endpoint = if self.endpoint.is_empty() {
            format!("https://{}.blob.core.windows.net", self.name)
        } else {
            self.endpoint.trim_end_matches('/').to_owned()
        };
        Url::parse(&endpoint).map_err(|e| ConfigError::Invalid {
            backend: "Azure",
            message: format!("invalid endpoint {endpoint:?}: {e}"),
        })
    }
}
