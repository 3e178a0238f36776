//! The storage reader contract.

use std::fmt::Debug;

use async_trait::async_trait;
use http::HeaderMap;

use crate::error::StorageResult;
use crate::object::Object;

/// A backend that can fetch objects by bucket and key.
///
/// Implementations honor `Range`, `If-None-Match` and `If-Modified-Since`
/// from `req_headers` and report expected negative outcomes (404, 304, 416,
/// backend statuses) as [`Object`] values. An `Err` is reserved for policy
/// rejections and failures that have no HTTP rendering.
///
/// Dropping the returned future cancels the in-flight request.
#[async_trait]
pub trait StorageReader: Send + Sync + Debug {
    /// Fetch `key` from `bucket`.
    ///
    /// `query` is the backend-specific token split off the key, such as an
    /// S3 `versionId` or a GCS generation.
    async fn get_object(
        &self,
        req_headers: &HeaderMap,
        bucket: &str,
        key: &str,
        query: &str,
    ) -> StorageResult<Object>;
}
