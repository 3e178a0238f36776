//! S3 reader configuration.

use imgstore_core::{BucketPolicy, env};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Region used when neither the configuration nor the environment names one.
pub const DEFAULT_REGION: &str = "us-west-1";

/// S3 reader configuration.
///
/// # Examples
///
/// ```
/// use imgstore_s3::S3Config;
///
/// let config = S3Config::default();
/// assert!(config.endpoint_use_path_style);
/// assert!(!config.decryption_client_enabled);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    /// AWS region. Empty means "from the environment, else `us-west-1`".
    #[builder(default)]
    #[serde(default)]
    pub region: String,

    /// Custom endpoint for S3-compatible services. `http://` is assumed
    /// when no scheme is given.
    #[builder(default)]
    #[serde(default)]
    pub endpoint: String,

    /// Use path-style addressing with a custom endpoint.
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub endpoint_use_path_style: bool,

    /// Role to assume through STS before reading.
    #[builder(default)]
    #[serde(default)]
    pub assume_role_arn: String,

    /// External ID passed along with the assumed role.
    #[builder(default)]
    #[serde(default)]
    pub assume_role_external_id: String,

    /// Decrypt objects written by the S3 encryption client.
    #[builder(default = false)]
    #[serde(default)]
    pub decryption_client_enabled: bool,

    /// Bucket allow/deny lists.
    #[builder(default)]
    #[serde(default)]
    pub buckets: BucketPolicy,
}

fn default_true() -> bool {
    true
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: String::new(),
            endpoint: String::new(),
            endpoint_use_path_style: true,
            assume_role_arn: String::new(),
            assume_role_external_id: String::new(),
            decryption_client_enabled: false,
            buckets: BucketPolicy::default(),
        }
    }
}

impl S3Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `IMGSTORE_S3_REGION` | (empty) |
    /// | `IMGSTORE_S3_ENDPOINT` | (empty) |
    /// | `IMGSTORE_S3_ENDPOINT_USE_PATH_STYLE` | `true` |
    /// | `IMGSTORE_S3_ASSUME_ROLE_ARN` | (empty) |
    /// | `IMGSTORE_S3_ASSUME_ROLE_EXTERNAL_ID` | (empty) |
    /// | `IMGSTORE_S3_DECRYPTION_CLIENT_ENABLED` | `false` |
    /// | `IMGSTORE_S3_ALLOWED_BUCKETS` | (empty) |
    /// | `IMGSTORE_S3_DENIED_BUCKETS` | (empty) |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env::string("IMGSTORE_S3_REGION") {
            config.region = v;
        }
        if let Some(v) = env::string("IMGSTORE_S3_ENDPOINT") {
            config.endpoint = v;
        }
        if let Some(v) = env::boolean("IMGSTORE_S3_ENDPOINT_USE_PATH_STYLE") {
            config.endpoint_use_path_style = v;
        }
        if let Some(v) = env::string("IMGSTORE_S3_ASSUME_ROLE_ARN") {
            config.assume_role_arn = v;
        }
        if let Some(v) = env::string("IMGSTORE_S3_ASSUME_ROLE_EXTERNAL_ID") {
            config.assume_role_external_id = v;
        }
        if let Some(v) = env::boolean("IMGSTORE_S3_DECRYPTION_CLIENT_ENABLED") {
            config.decryption_client_enabled = v;
        }
        config.buckets =
            BucketPolicy::from_env("IMGSTORE_S3_ALLOWED_BUCKETS", "IMGSTORE_S3_DENIED_BUCKETS");

        config
    }

    /// The endpoint with a scheme, or `None` when no endpoint is set.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgstore_s3::S3Config;
    ///
    /// let config = S3Config::builder().endpoint("minio:9000".into()).build();
    /// assert_eq!(config.endpoint_url().as_deref(), Some("http://minio:9000"));
    /// ```
    #[must_use]
    pub fn endpoint_url(&self) -> Option<String> {
        if self.endpoint.is_empty() {
            return None;
        }
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            Some(self.endpoint.clone())
        } else {
            Some(format!("http://{}", self.endpoint))
        }
    }
}
