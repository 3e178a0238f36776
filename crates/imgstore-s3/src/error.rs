//! Classification of S3 SDK errors.
//!
//! Every SDK error is inspected exactly once: either it names a region to
//! retry in, or it becomes a renderable [`Object`], or it is a hard failure.

use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_smithy_runtime_api::http::Response;
use http::StatusCode;
use http::header::{ETAG, HeaderMap, LAST_MODIFIED};
use imgstore_core::utils::set_optional_header;
use imgstore_core::{Object, StorageError, StorageResult};

/// Header S3 uses to name the bucket's actual region.
const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";

/// Extract the region from a `301 Moved Permanently` response.
pub(crate) fn redirect_region<B>(response: Option<&Response<B>>) -> Option<String> {
    let response = response?;
    if response.status().as_u16() != StatusCode::MOVED_PERMANENTLY.as_u16() {
        return None;
    }
    response
        .headers()
        .get(BUCKET_REGION_HEADER)
        .filter(|r| !r.is_empty())
        .map(ToOwned::to_owned)
}

/// Region to retry in for an SDK error, if the error is a region redirect.
pub(crate) fn region_from_error<E, R>(err: &SdkError<E, Response<R>>) -> Option<String> {
    redirect_region(err.raw_response())
}

/// Turn an SDK error into a rendered result or a hard failure.
pub(crate) fn handle_error<E>(err: SdkError<E, Response>) -> StorageResult<Object>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match classify(err.raw_response(), message) {
        Some(obj) => Ok(obj),
        None => Err(StorageError::backend("S3", err)),
    }
}

/// Render a response status, or `None` when the status is not renderable.
///
/// Responses without a status, statuses below 100 and `301` (a redirect that
/// survived the retry) are failures.
pub(crate) fn classify<B>(response: Option<&Response<B>>, message: String) -> Option<Object> {
    let response = response?;
    let status = StatusCode::from_u16(response.status().as_u16()).ok()?;
    if status.as_u16() < 100 || status == StatusCode::MOVED_PERMANENTLY {
        return None;
    }

    let mut headers = HeaderMap::new();
    set_optional_header(&mut headers, ETAG, response.headers().get("etag"));
    set_optional_header(
        &mut headers,
        LAST_MODIFIED,
        response.headers().get("last-modified"),
    );
    Some(Object::from_status(status, message, &headers))
}
