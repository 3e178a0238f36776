//! Aggregate configuration for every storage scheme.

use imgstore_azure::AzureConfig;
use imgstore_core::env;
use imgstore_core::url::DEFAULT_QUERY_SEPARATOR;
use imgstore_fs::FsConfig;
use imgstore_gcs::GcsConfig;
use imgstore_s3::S3Config;
use imgstore_swift::SwiftConfig;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Which storage schemes to register and how to configure them.
///
/// `http` and `https` are always available; `local` is enabled by a
/// non-empty filesystem root; the cloud schemes each have a switch.
///
/// # Examples
///
/// ```
/// use imgstore_transport::TransportConfig;
///
/// let config = TransportConfig::default();
/// assert_eq!(config.query_separator, "?");
/// assert!(!config.use_s3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    /// Separator between an object key and its version token. May be empty.
    #[builder(default = DEFAULT_QUERY_SEPARATOR.to_owned())]
    #[serde(default = "default_query_separator")]
    pub query_separator: String,

    /// `local://` reader settings.
    #[builder(default)]
    #[serde(default)]
    pub fs: FsConfig,

    /// Register `s3://`.
    #[builder(default)]
    #[serde(default)]
    pub use_s3: bool,

    /// `s3://` reader settings.
    #[builder(default)]
    #[serde(default)]
    pub s3: S3Config,

    /// Register `gs://`.
    #[builder(default)]
    #[serde(default)]
    pub use_gcs: bool,

    /// `gs://` reader settings.
    #[builder(default)]
    #[serde(default)]
    pub gcs: GcsConfig,

    /// Register `abs://`.
    #[builder(default)]
    #[serde(default)]
    pub use_abs: bool,

    /// `abs://` reader settings.
    #[builder(default)]
    #[serde(default)]
    pub azure: AzureConfig,

    /// Register `swift://`.
    #[builder(default)]
    #[serde(default)]
    pub use_swift: bool,

    /// `swift://` reader settings.
    #[builder(default)]
    #[serde(default)]
    pub swift: SwiftConfig,
}

fn default_query_separator() -> String {
    DEFAULT_QUERY_SEPARATOR.to_owned()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            query_separator: default_query_separator(),
            fs: FsConfig::default(),
            use_s3: false,
            s3: S3Config::default(),
            use_gcs: false,
            gcs: GcsConfig::default(),
            use_abs: false,
            azure: AzureConfig::default(),
            use_swift: false,
            swift: SwiftConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `IMGSTORE_SOURCE_URL_QUERY_SEPARATOR` | `?` (empty allowed) |
    /// | `IMGSTORE_USE_S3` | `false` |
    /// | `IMGSTORE_USE_GCS` | `false` |
    /// | `IMGSTORE_USE_ABS` | `false` |
    /// | `IMGSTORE_USE_SWIFT` | `false` |
    ///
    /// Backend settings are read by each backend's own `from_env`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self {
            fs: FsConfig::from_env(),
            s3: S3Config::from_env(),
            gcs: GcsConfig::from_env(),
            azure: AzureConfig::from_env(),
            swift: SwiftConfig::from_env(),
            ..Self::default()
        };

        if let Some(v) = env::string("IMGSTORE_SOURCE_URL_QUERY_SEPARATOR") {
            config.query_separator = v;
        }
        if let Some(v) = env::boolean("IMGSTORE_USE_S3") {
            config.use_s3 = v;
        }
        if let Some(v) = env::boolean("IMGSTORE_USE_GCS") {
            config.use_gcs = v;
        }
        if let Some(v) = env::boolean("IMGSTORE_USE_ABS") {
            config.use_abs = v;
        }
        if let Some(v) = env::boolean("IMGSTORE_USE_SWIFT") {
            config.use_swift = v;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.query_separator, "?");
        assert!(!config.fs.is_enabled());
        assert!(!config.use_s3 && !config.use_gcs && !config.use_abs && !config.use_swift);
    }

    #[test]
    fn test_should_allow_empty_separator() {
        let config = TransportConfig::builder().query_separator(String::new()).build();
        assert!(config.query_separator.is_empty());
    }

    #[test]
    fn test_should_deserialize_partial_config() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"useS3":true,"s3":{"region":"eu-west-1"}}"#)
                .expect("json");
        assert!(config.use_s3);
        assert_eq!(config.s3.region, "eu-west-1");
        assert_eq!(config.query_separator, "?");
    }
}
