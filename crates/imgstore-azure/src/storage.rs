//! Azure Blob Storage-backed [`StorageReader`].

use std::fmt;
use std::io;

use async_trait::async_trait;
use azure_core::RetryOptions;
use azure_core::error::{Error as AzureError, ErrorKind};
use azure_core::request_options::Range;
use azure_storage::{CloudLocation, StorageCredentials};
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder};
use chrono::DateTime;
use futures::{StreamExt, TryStreamExt};
use http::StatusCode;
use http::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, HeaderMap,
    HeaderValue, LAST_MODIFIED, RANGE,
};
use imgstore_core::conditional::is_not_modified;
use imgstore_core::range::{ByteRange, content_range};
use imgstore_core::utils::{format_http_date, header_str, set_header, set_optional_header};
use imgstore_core::{Object, ObjectBody, StorageError, StorageReader, StorageResult};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::config::AzureConfig;

/// Bytes fetched per Get Blob request; larger blobs are read in sequence.
const CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Reads blobs from an Azure Storage account.
pub struct AzureStorage {
    config: AzureConfig,
    service: BlobServiceClient,
}

impl fmt::Debug for AzureStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AzureStorage {
    /// Create a reader after validating `config`.
    pub fn new(config: AzureConfig) -> StorageResult<Self> {
        config.validate()?;
        let endpoint = config.endpoint_url()?;

        let credentials = if config.key.is_empty() {
            let credential = azure_identity::create_default_credential()
                .map_err(|e| StorageError::backend("Azure", e))?;
            StorageCredentials::token_credential(credential)
        } else {
            StorageCredentials::access_key(config.name.clone(), config.key.clone())
        };

        let builder = if config.has_custom_endpoint() {
            let location = CloudLocation::Custom {
                account: config.name.clone(),
                uri: endpoint.as_str().trim_end_matches('/').to_owned(),
            };
            ClientBuilder::with_location(location, credentials)
        } else {
            ClientBuilder::new(config.name.clone(), credentials)
        };
        let service = builder.retry(RetryOptions::none()).blob_service_client();

        info!(
            account = %config.name,
            endpoint = %endpoint,
            shared_key = !config.key.is_empty(),
            "Azure reader created"
        );

        Ok(Self { config, service })
    }

    async fn fetch(
        &self,
        req_headers: &HeaderMap,
        container: &str,
        key: &str,
    ) -> StorageResult<Object> {
        if container.is_empty() || key.is_empty() {
            return Ok(Object::not_found(
                "invalid Azure storage URL: container name or object key are empty",
            ));
        }
        self.config.buckets.check("Azure", container)?;

        let Ok(range) = ByteRange::from_header(header_str(req_headers, &RANGE)) else {
            return Ok(Object::invalid_range());
        };

        let mut get = self
            .service
            .container_client(container)
            .blob_client(key)
            .get()
            .chunk_size(CHUNK_SIZE);
        if let Some(range) = range {
            get = get.range(blob_range(range));
        }

        let mut pages = get.into_stream();
        let first = match pages.next().await {
            Some(Ok(page)) => page,
            Some(Err(err)) => return classify(err),
            None => return Err(StorageError::backend("Azure", "empty Get Blob response")),
        };

        let properties = &first.blob.properties;
        let size = first
            .content_range
            .as_ref()
            .map_or(properties.content_length, |r| r.total_length());

        let mut headers = HeaderMap::new();
        set_header(&mut headers, ETAG, &properties.etag.to_string());
        set_header(
            &mut headers,
            LAST_MODIFIED,
            &http_date(properties.last_modified),
        );

        if range.is_none() && is_not_modified(req_headers, &headers) {
            return Ok(Object::not_modified(&headers));
        }

        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        set_optional_header(
            &mut headers,
            CONTENT_TYPE,
            Some(properties.content_type.as_str()),
        );
        set_optional_header(
            &mut headers,
            CACHE_CONTROL,
            properties.cache_control.as_deref(),
        );

        let partial = match range {
            Some(range) => {
                let Ok((start, end)) = range.resolve(size) else {
                    return Ok(Object::invalid_range());
                };
                headers.insert(CONTENT_LENGTH, HeaderValue::from(end - start + 1));
                set_header(&mut headers, CONTENT_RANGE, &content_range(start, end, size));
                true
            }
            None => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
                false
            }
        };

        let rest = pages.map_ok(|page| page.data).try_flatten();
        let body = ObjectBody::from_stream(first.data.chain(rest).map_err(io::Error::other));
        Ok(if partial {
            Object::partial_content(headers, body)
        } else {
            Object::ok(headers, body)
        })
    }
}

#[async_trait]
impl StorageReader for AzureStorage {
    async fn get_object(
        &self,
        req_headers: &HeaderMap,
        bucket: &str,
        key: &str,
        _query: &str,
    ) -> StorageResult<Object> {
        let obj = self.fetch(req_headers, bucket, key).await?;
        debug!(container = bucket, key, status = %obj.status, "Azure blob fetched");
        Ok(obj)
    }
}

/// An offset plus count, or offset to the end of the blob.
fn blob_range(range: ByteRange) -> Range {
    match range.end {
        Some(end) => Range::from(range.start..end.saturating_add(1)),
        None => Range::from(range.start..),
    }
}

fn http_date(ts: OffsetDateTime) -> String {
    DateTime::from_timestamp(ts.unix_timestamp(), ts.nanosecond())
        .map(|dt| format_http_date(&dt))
        .unwrap_or_default()
}

/// Render a service error status, or fail on anything else.
///
/// Statuses below 100 and `301` are failures.
fn classify(err: AzureError) -> StorageResult<Object> {
    let response = match err.kind() {
        ErrorKind::HttpResponse { status, error_code } => {
            Some((*status as u16, error_code.clone()))
        }
        _ => None,
    };
    let Some((code, error_code)) = response else {
        return Err(StorageError::backend("Azure", err));
    };

    let status = match StatusCode::from_u16(code) {
        Ok(status) if code >= 100 && status != StatusCode::MOVED_PERMANENTLY => status,
        _ => return Err(StorageError::backend("Azure", err)),
    };

    let message = match error_code {
        Some(error_code) => format!("{status}: {error_code}"),
        None => status.to_string(),
    };
    Ok(Object::from_status(status, message, &HeaderMap::new()))
}
