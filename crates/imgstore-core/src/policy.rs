//! Bucket allow/deny policy.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::env;
use crate::error::{StorageError, StorageResult};

/// Allow/deny lists for the buckets (containers) a backend may read from.
///
/// # Examples
///
/// ```
/// use imgstore_core::BucketPolicy;
///
/// let policy = BucketPolicy::builder().allowed(vec!["a".into()]).build();
/// assert!(policy.is_allowed("a"));
/// assert!(!policy.is_allowed("b"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct BucketPolicy {
    /// Buckets that may be read. Empty means "any bucket".
    #[builder(default)]
    #[serde(default)]
    pub allowed: Vec<String>,

    /// Buckets that must never be read.
    #[builder(default)]
    #[serde(default)]
    pub denied: Vec<String>,
}

impl BucketPolicy {
    /// Load the lists from two comma-separated environment variables.
    #[must_use]
    pub fn from_env(allowed_var: &str, denied_var: &str) -> Self {
        Self {
            allowed: env::list(allowed_var).unwrap_or_default(),
            denied: env::list(denied_var).unwrap_or_default(),
        }
    }

    /// Whether `bucket` passes both lists.
    #[must_use]
    pub fn is_allowed(&self, bucket: &str) -> bool {
        is_bucket_allowed(bucket, &self.allowed, &self.denied)
    }

    /// Reject `bucket` with [`StorageError::BucketDenied`] unless allowed.
    pub fn check(&self, backend: &'static str, bucket: &str) -> StorageResult<()> {
        if self.is_allowed(bucket) {
            Ok(())
        } else {
            Err(StorageError::BucketDenied {
                backend,
                bucket: bucket.to_owned(),
            })
        }
    }
}

/// Evaluate allow and deny lists for a bucket name.
///
/// A non-empty allow-list must contain the bucket; independently, the
/// deny-list must not.
///
/// # Examples
///
/// ```
/// use imgstore_core::policy::is_bucket_allowed;
///
/// assert!(is_bucket_allowed("a", &[], &[]));
/// assert!(!is_bucket_allowed("a", &[], &["a".to_owned()]));
/// ```
#[must_use]
pub fn is_bucket_allowed(bucket: &str, allowed: &[String], denied: &[String]) -> bool {
    if !allowed.is_empty() && !allowed.iter().any(|b| b == bucket) {
        return false;
    }
    !denied.iter().any(|b| b == bucket)
}
