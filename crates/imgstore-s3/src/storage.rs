//! S3-backed [`StorageReader`].

use std::future::Future;

use async_trait::async_trait;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::primitives::{DateTime, DateTimeFormat};
use aws_smithy_runtime_api::http::Response;
use http::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
    ETAG, EXPIRES, HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, RANGE,
};
use imgstore_core::utils::{header_str, parse_http_date, set_optional_header};
use imgstore_core::{Object, ObjectBody, StorageError, StorageReader, StorageResult};
use tracing::{debug, info, warn};

use crate::client::{ClientCache, ClientFactory, RegionClient};
use crate::config::{DEFAULT_REGION, S3Config};
use crate::decrypt::{Envelope, unencrypted_content_length};
use crate::error::{handle_error, region_from_error};

/// STS session name used when assuming a role.
const SESSION_NAME: &str = "imgstore";

/// Reads objects from Amazon S3 or an S3-compatible service.
#[derive(Debug)]
pub struct S3Storage {
    config: S3Config,
    clients: ClientCache,
}

impl S3Storage {
    /// Create a reader from the ambient AWS configuration and `config`.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if !config.region.is_empty() {
            loader = loader.region(Region::new(config.region.clone()));
        }
        let mut sdk_config = loader.load().await;
        let region = resolve_region(&config.region, sdk_config.region());

        if !config.assume_role_arn.is_empty() {
            let mut builder = AssumeRoleProvider::builder(config.assume_role_arn.clone())
                .session_name(SESSION_NAME)
                .region(region.clone())
                .configure(&sdk_config);
            if !config.assume_role_external_id.is_empty() {
                builder = builder.external_id(config.assume_role_external_id.clone());
            }
            let provider = builder.build().await;
            sdk_config = sdk_config
                .into_builder()
                .credentials_provider(SharedCredentialsProvider::new(provider))
                .build();
        }

        Ok(Self::with_sdk_config(config, sdk_config))
    }

    /// Create a reader on an already loaded SDK configuration.
    pub(crate) fn with_sdk_config(config: S3Config, sdk_config: SdkConfig) -> Self {
        let region = resolve_region(&config.region, sdk_config.region());
        let factory = ClientFactory::new(
            sdk_config,
            config.endpoint_url(),
            config.endpoint_use_path_style,
            config.decryption_client_enabled,
        );
        let clients = ClientCache::new(factory, region.clone());

        info!(
            region = %region,
            endpoint = %config.endpoint,
            assume_role = !config.assume_role_arn.is_empty(),
            decryption = config.decryption_client_enabled,
            "S3 reader created"
        );

        Self { config, clients }
    }

    /// Run `call` with the bucket's client, retrying once in the region named
    /// by a redirect.
    async fn call_with_client<T, E, F, Fut>(
        &self,
        bucket: &str,
        call: F,
    ) -> Result<(T, RegionClient), SdkError<E, Response>>
    where
        F: Fn(RegionClient) -> Fut,
        Fut: Future<Output = Result<T, SdkError<E, Response>>>,
    {
        let client = self.clients.bucket_client(bucket);
        match call(client.clone()).await {
            Ok(out) => Ok((out, client)),
            Err(err) => {
                let Some(region) = region_from_error(&err) else {
                    return Err(err);
                };
                warn!(bucket, region, "S3 bucket is in another region, retrying");
                let client = self.clients.region_client(bucket, &region);
                call(client.clone()).await.map(|out| (out, client))
            }
        }
    }

    async fn fetch(
        &self,
        req_headers: &HeaderMap,
        bucket: &str,
        key: &str,
        query: &str,
    ) -> StorageResult<Object> {
        if bucket.is_empty() || key.is_empty() {
            return Ok(Object::not_found(
                "invalid S3 storage URL: bucket name or object key are empty",
            ));
        }
        self.config.buckets.check("S3", bucket)?;

        let range = header_str(req_headers, &RANGE).map(ToOwned::to_owned);
        let (if_none_match, if_modified_since) = if range.is_some() {
            (None, None)
        } else {
            (
                header_str(req_headers, &IF_NONE_MATCH).map(ToOwned::to_owned),
                header_str(req_headers, &IF_MODIFIED_SINCE)
                    .and_then(parse_http_date)
                    .map(|ts| DateTime::from_secs(ts.timestamp())),
            )
        };
        let version_id = (!query.is_empty()).then(|| query.to_owned());

        let request = |client: RegionClient| {
            client
                .s3
                .get_object()
                .bucket(bucket)
                .key(key)
                .set_version_id(version_id.clone())
                .set_range(range.clone())
                .set_if_none_match(if_none_match.clone())
                .set_if_modified_since(if_modified_since)
                .send()
        };

        let (output, client) = match self.call_with_client(bucket, request).await {
            Ok(v) => v,
            Err(err) => return handle_error(err),
        };

        let mut content_length = output
            .content_length()
            .filter(|len| *len > 0)
            .map(i64::unsigned_abs);
        let mut envelope = None;
        if self.config.decryption_client_enabled {
            if let Some(len) = unencrypted_content_length(output.metadata())? {
                content_length = Some(len);
            }
            envelope = Envelope::from_metadata(output.metadata())?;
        }

        let mut headers = response_headers(&output);
        let partial = headers.contains_key(CONTENT_RANGE);

        let body = match (envelope, client.kms.as_ref()) {
            (Some(envelope), Some(kms)) => {
                if range.is_some() {
                    return Err(StorageError::Decryption(
                        "ranged reads of encrypted objects are not supported".to_owned(),
                    ));
                }
                let ciphertext = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::backend("S3", e))?
                    .into_bytes();
                let plaintext = envelope.decrypt(kms, &ciphertext).await?;
                content_length = Some(plaintext.len() as u64);
                ObjectBody::from_bytes(plaintext)
            }
            _ => ObjectBody::new(output.body.into_async_read()),
        };

        if let Some(len) = content_length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }

        Ok(if partial {
            Object::partial_content(headers, body)
        } else {
            Object::ok(headers, body)
        })
    }
}

#[async_trait]
impl StorageReader for S3Storage {
    async fn get_object(
        &self,
        req_headers: &HeaderMap,
        bucket: &str,
        key: &str,
        query: &str,
    ) -> StorageResult<Object> {
        let obj = self.fetch(req_headers, bucket, key, query).await?;
        debug!(bucket, key, status = %obj.status, "S3 object fetched");
        Ok(obj)
    }
}

/// Pick the configured region, then the ambient one, then [`DEFAULT_REGION`].
fn resolve_region(configured: &str, ambient: Option<&Region>) -> Region {
    if !configured.is_empty() {
        return Region::new(configured.to_owned());
    }
    ambient
        .cloned()
        .unwrap_or_else(|| Region::from_static(DEFAULT_REGION))
}

/// Response headers of a successful `GetObject`, without `Content-Length`.
fn response_headers(output: &GetObjectOutput) -> HeaderMap {
    let mut headers = HeaderMap::new();
    set_optional_header(&mut headers, CONTENT_TYPE, output.content_type());
    set_optional_header(&mut headers, CONTENT_ENCODING, output.content_encoding());
    set_optional_header(&mut headers, CACHE_CONTROL, output.cache_control());
    set_optional_header(&mut headers, EXPIRES, output.expires_string());
    set_optional_header(&mut headers, ETAG, output.e_tag());
    let last_modified = output
        .last_modified()
        .and_then(|ts| ts.fmt(DateTimeFormat::HttpDate).ok());
    set_optional_header(&mut headers, LAST_MODIFIED, last_modified.as_deref());
    set_optional_header(&mut headers, ACCEPT_RANGES, output.accept_ranges());
    set_optional_header(&mut headers, CONTENT_RANGE, output.content_range());
    headers
}
