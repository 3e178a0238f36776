//! OpenStack Swift reader configuration.

use std::time::Duration;

use imgstore_core::{BucketPolicy, ConfigError, env};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// OpenStack Swift reader configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use imgstore_swift::SwiftConfig;
///
/// let config = SwiftConfig::builder()
///     .auth_url("https://keystone.example.com/v3".into())
///     .build();
/// assert_eq!(config.resolved_auth_version(), 3);
/// assert_eq!(config.timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct SwiftConfig {
    /// User name.
    #[builder(default)]
    #[serde(default)]
    pub username: String,

    /// API key or password.
    #[builder(default)]
    #[serde(default)]
    pub api_key: String,

    /// Keystone authentication URL.
    #[builder(default)]
    #[serde(default)]
    pub auth_url: String,

    /// User and project domain (v3 only).
    #[builder(default)]
    #[serde(default)]
    pub domain: String,

    /// Tenant or project name (v2 and v3).
    #[builder(default)]
    #[serde(default)]
    pub tenant: String,

    /// Keystone API version; 0 detects it from the auth URL.
    #[builder(default)]
    #[serde(default)]
    pub auth_version: u8,

    /// Connection timeout.
    #[builder(default = Duration::from_secs(10))]
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Whole-request timeout.
    #[builder(default = Duration::from_secs(60))]
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Container allow/deny lists.
    #[builder(default)]
    #[serde(default)]
    pub buckets: BucketPolicy,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for SwiftConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            api_key: String::new(),
            auth_url: String::new(),
            domain: String::new(),
            tenant: String::new(),
            auth_version: 0,
            connect_timeout: default_connect_timeout(),
            timeout: default_timeout(),
            buckets: BucketPolicy::default(),
        }
    }
}

impl SwiftConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `IMGSTORE_SWIFT_USERNAME` | (empty) |
    /// | `IMGSTORE_SWIFT_API_KEY` | (empty) |
    /// | `IMGSTORE_SWIFT_AUTH_URL` | (empty) |
    /// | `IMGSTORE_SWIFT_DOMAIN` | (empty) |
    /// | `IMGSTORE_SWIFT_TENANT` | (empty) |
    /// | `IMGSTORE_SWIFT_AUTH_VERSION` | `0` |
    /// | `IMGSTORE_SWIFT_CONNECT_TIMEOUT_SECONDS` | `10` |
    /// | `IMGSTORE_SWIFT_TIMEOUT_SECONDS` | `60` |
    /// | `IMGSTORE_SWIFT_ALLOWED_BUCKETS` | (empty) |
    /// | `IMGSTORE_SWIFT_DENIED_BUCKETS` | (empty) |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env::string("IMGSTORE_SWIFT_USERNAME") {
            config.username = v;
        }
        if let Some(v) = env::string("IMGSTORE_SWIFT_API_KEY") {
            config.api_key = v;
        }
        if let Some(v) = env::string("IMGSTORE_SWIFT_AUTH_URL") {
            config.auth_url = v;
        }
        if let Some(v) = env::string("IMGSTORE_SWIFT_DOMAIN") {
            config.domain = v;
        }
        if let Some(v) = env::string("IMGSTORE_SWIFT_TENANT") {
            config.tenant = v;
        }
        if let Some(v) = env::number("IMGSTORE_SWIFT_AUTH_VERSION") {
            config.auth_version = u8::try_from(v).unwrap_or(u8::MAX);
        }
        if let Some(v) = env::seconds("IMGSTORE_SWIFT_CONNECT_TIMEOUT_SECONDS") {
            config.connect_timeout = v;
        }
        if let Some(v) = env::seconds("IMGSTORE_SWIFT_TIMEOUT_SECONDS") {
            config.timeout = v;
        }
        config.buckets = BucketPolicy::from_env(
            "IMGSTORE_SWIFT_ALLOWED_BUCKETS",
            "IMGSTORE_SWIFT_DENIED_BUCKETS",
        );

        config
    }

    /// Check that an auth URL is set and the auth version is known.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_url.is_empty() {
            return Err(ConfigError::Missing {
                backend: "Swift",
                field: "auth URL",
            });
        }
        if self.auth_version > 3 {
            return Err(ConfigError::Invalid {
                backend: "Swift",
                message: format!("unsupported auth version {}", self.auth_version),
            });
        }
        Ok(())
    }

    /// The configured auth version, or one guessed from the auth URL.
    #[must_use]
    pub fn resolved_auth_version(&self) -> u8 {
        match self.auth_version {
            0 if self.auth_url.contains("v3") => 3,
            0 if self.auth_url.contains("v2") => 2,
            0 => 1,
            v => v,
        }
    }
}
