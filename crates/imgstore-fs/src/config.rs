//! Local filesystem reader configuration.

use std::path::Path;

use imgstore_core::ConfigError;
use imgstore_core::env;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Environment variable holding the filesystem root.
pub const ROOT_ENV: &str = "IMGSTORE_LOCAL_FILESYSTEM_ROOT";

/// Local filesystem reader configuration.
///
/// An empty root disables the `local` scheme.
///
/// # Examples
///
/// ```
/// use imgstore_fs::FsConfig;
///
/// let config = FsConfig::builder().root("/srv/images".into()).build();
/// assert!(config.is_enabled());
/// assert!(!FsConfig::default().is_enabled());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct FsConfig {
    /// Directory objects are served from.
    #[builder(default)]
    #[serde(default)]
    pub root: String,
}

impl FsConfig {
    /// Load configuration from `IMGSTORE_LOCAL_FILESYSTEM_ROOT`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env::string(ROOT_ENV) {
            config.root = v;
        }
        config
    }

    /// Whether a root is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.root.is_empty()
    }

    /// Check that the root is an existing directory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.is_empty() {
            return Err(ConfigError::Missing {
                backend: "local",
                field: "filesystem root",
            });
        }

        match Path::new(&self.root).metadata() {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ConfigError::Invalid {
                backend: "local",
                message: format!("{} is not a directory", self.root),
            }),
            Err(e) => Err(ConfigError::Invalid {
                backend: "local",
                message: format!("can't access {}: {e}", self.root),
            }),
        }
    }
}
