//! Google Cloud Storage-backed [`StorageReader`].

use std::fmt;
use std::io;
use std::pin::pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use google_cloud_storage::client::google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::Error as GcsError;
use google_cloud_storage::http::objects::download::Range as DownloadRange;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use http::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, HeaderMap,
    HeaderValue, LAST_MODIFIED, RANGE,
};
use imgstore_core::conditional::is_not_modified;
use imgstore_core::range::{ByteRange, content_range};
use imgstore_core::utils::{header_str, set_header, set_optional_header};
use imgstore_core::{Object, ObjectBody, StorageError, StorageReader, StorageResult};
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::GcsConfig;
use crate::etag::{decode_crc32c, derive_etag, last_modified, unix_nanos};

/// Chunks buffered between the download task and the body reader.
const CHUNK_BUFFER: usize = 8;

/// Reads objects from Google Cloud Storage.
pub struct GcsStorage {
    config: GcsConfig,
    client: Client,
}

impl fmt::Debug for GcsStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GcsStorage {
    /// Create a reader, resolving credentials as configured.
    pub async fn new(config: GcsConfig) -> StorageResult<Self> {
        let mut client_config = if config.anonymous {
            warn!("GCS authentication disabled");
            ClientConfig::default().anonymous()
        } else if !config.key.is_empty() {
            let credentials = CredentialsFile::new_from_str(&config.key)
                .await
                .map_err(|e| StorageError::config("GCS", format!("invalid service account key: {e}")))?;
            ClientConfig::default()
                .with_credentials(credentials)
                .await
                .map_err(|e| StorageError::backend("GCS", e))?
        } else {
            ClientConfig::default()
                .with_auth()
                .await
                .map_err(|e| StorageError::backend("GCS", e))?
        };

        if !config.endpoint.is_empty() {
            client_config.storage_endpoint.clone_from(&config.endpoint);
        }

        info!(
            endpoint = %config.endpoint,
            anonymous = config.anonymous,
            "GCS reader created"
        );

        Ok(Self {
            client: Client::new(client_config),
            config,
        })
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
                "invalid GCS storage URL: bucket name or object key are empty",
            ));
        }
        self.config.buckets.check("GCS", bucket)?;

        let Ok(range) = ByteRange::from_header(header_str(req_headers, &RANGE)) else {
            return Ok(Object::invalid_range());
        };

        let mut request = GetObjectRequest {
            bucket: bucket.to_owned(),
            object: key.to_owned(),
            generation: parse_generation(query),
            ..Default::default()
        };

        let attrs = match self.client.get_object(&request).await {
            Ok(attrs) => attrs,
            Err(err) => return handle_error(err),
        };
        // Pin the download to the revision the validators describe.
        request.generation = Some(attrs.generation);

        let size = u64::try_from(attrs.size).unwrap_or_default();
        let updated = attrs.updated.unwrap_or(OffsetDateTime::UNIX_EPOCH);

        let mut headers = HeaderMap::new();
        let etag = derive_etag(decode_crc32c(attrs.crc32c.as_deref()), unix_nanos(updated));
        set_header(&mut headers, ETAG, &etag);
        set_header(&mut headers, LAST_MODIFIED, &last_modified(updated));
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        set_optional_header(&mut headers, CONTENT_TYPE, attrs.content_type.as_deref());
        set_optional_header(&mut headers, CACHE_CONTROL, attrs.cache_control.as_deref());

        if let Some(range) = range {
            let Ok((start, end)) = range.resolve(size) else {
                return Ok(Object::invalid_range());
            };
            let body = self
                .download(request, DownloadRange(Some(start), Some(end)))
                .await?;
            headers.insert(CONTENT_LENGTH, HeaderValue::from(end - start + 1));
            set_header(&mut headers, CONTENT_RANGE, &content_range(start, end, size));
            return Ok(Object::partial_content(headers, body));
        }

        if is_not_modified(req_headers, &headers) {
            return Ok(Object::not_modified(&headers));
        }

        let body = self.download(request, DownloadRange::default()).await?;
        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        Ok(Object::ok(headers, body))
    }

    /// Open a download and expose it as an owned body.
    ///
    /// The transfer runs on its own task feeding a bounded channel; dropping
    /// the body closes the channel and ends the task.
    async fn download(
        &self,
        request: GetObjectRequest,
        range: DownloadRange,
    ) -> StorageResult<ObjectBody> {
        let client = self.client.clone();
        let (opened_tx, opened_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel::<io::Result<Bytes>>(CHUNK_BUFFER);

        tokio::spawn(async move {
            let stream = match client.download_streamed_object(&request, &range).await {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = opened_tx.send(Err(err));
                    return;
                }
            };
            if opened_tx.send(Ok(())).is_err() {
                return;
            }

            let mut stream = pin!(stream);
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(io::Error::other);
                let failed = chunk.is_err();
                if chunk_tx.send(chunk).await.is_err() || failed {
                    return;
                }
            }
        });

        match opened_rx.await {
            Ok(Ok(())) => Ok(ObjectBody::from_stream(futures::stream::unfold(
                chunk_rx,
                |mut rx| async move { rx.recv().await.map(|chunk| (chunk, rx)) },
            ))),
            Ok(Err(err)) => Err(StorageError::backend("GCS", err)),
            Err(_) => Err(StorageError::Io(io::Error::other(
                "GCS download task ended before opening the object",
            ))),
        }
    }
}

#[async_trait]
impl StorageReader for GcsStorage {
    async fn get_object(
        &self,
        req_headers: &HeaderMap,
        bucket: &str,
        key: &str,
        query: &str,
    ) -> StorageResult<Object> {
        let obj = self.fetch(req_headers, bucket, key, query).await?;
        debug!(bucket, key, status = %obj.status, "GCS object fetched");
        Ok(obj)
    }
}

/// A positive integer query selects an object generation.
fn parse_generation(query: &str) -> Option<i64> {
    query.parse::<i64>().ok().filter(|g| *g > 0)
}

/// Missing buckets and objects render as 404; everything else fails.
fn handle_error(err: GcsError) -> StorageResult<Object> {
    match &err {
        GcsError::Response(resp) if resp.code == 404 => Ok(Object::not_found(err.to_string())),
        _ => Err(StorageError::backend("GCS", err)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::request::Parts;
    use http::{Response, StatusCode};
    use imgstore_core::BucketPolicy;
    use imgstore_core::testsuite::{MockServer, ReaderSuite, test_data};
    use imgstore_core::url::unescape;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;

    const BUCKET: &str = "test";
    const KEY: &str = "images/data.bin";
    const LATEST: i64 = 1_736_935_200_000_002;
    const OLDER: i64 = 1_736_935_200_000_001;

    /// Query strings of every `alt=media` request the server saw.
    type Downloads = Arc<Mutex<Vec<String>>>;

    fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Bytes> {
        Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from(body.to_string()))
            .expect("response")
    }

    fn not_found(message: &str) -> Response<Bytes> {
        json_response(
            StatusCode::NOT_FOUND,
            &json!({
                "error": {
                    "code": 404,
                    "message": message,
                    "errors": [{ "domain": "global", "reason": "notFound", "message": message }],
                }
            }),
        )
    }

    fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find_map(|(k, v)| (k == name).then_some(v))
    }

    /// The JSON API subset the client uses: object metadata and `alt=media`
    /// downloads of one object with two generations.
    fn gcs_service(downloads: Downloads) -> impl Fn(Parts) -> Response<Bytes> {
        move |parts: Parts| {
            let path = parts.uri.path();
            let Some(rest) = path.strip_prefix("/storage/v1/b/") else {
                return not_found("unknown path");
            };
            let Some((bucket, object)) = rest.split_once("/o/") else {
                return not_found("unknown path");
            };
            if bucket != BUCKET {
                return not_found("The specified bucket does not exist.");
            }
            if unescape(object) != KEY {
                return not_found("No such object.");
            }

            let query = parts.uri.query().unwrap_or_default();
            let generation = query_param(query, "generation")
                .and_then(|g| g.parse::<i64>().ok())
                .unwrap_or(LATEST);
            let data = match generation {
                LATEST => test_data(),
                OLDER => b"older".to_vec(),
                _ => return not_found("No such object."),
            };

            if query_param(query, "alt") != Some("media") {
                return json_response(
                    StatusCode::OK,
                    &json!({
                        "kind": "storage#object",
                        "id": format!("{BUCKET}/{KEY}/{generation}"),
                        "selfLink": "",
                        "mediaLink": "",
                        "name": KEY,
                        "bucket": BUCKET,
                        "generation": generation.to_string(),
                        "metageneration": "1",
                        "contentType": "image/png",
                        "cacheControl": "public, max-age=60",
                        "storageClass": "STANDARD",
                        "size": data.len().to_string(),
                        "md5Hash": "",
                        "crc32c": "AQIDBA==",
                        "etag": "CIKAgICAgIAD",
                        "timeCreated": "2025-01-15T10:00:00.000Z",
                        "updated": "2025-01-15T10:00:00.000Z",
                        "timeStorageClassUpdated": "2025-01-15T10:00:00.000Z",
                    }),
                );
            }

            downloads.lock().push(query.to_owned());
            let range = ByteRange::from_header(header_str(&parts.headers, &RANGE)).expect("range");
            let Some((start, end)) = range.map(|r| r.resolve(data.len() as u64).expect("range"))
            else {
                return Response::new(Bytes::from(data));
            };
            let (start, end) = (start as usize, end as usize);
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(CONTENT_RANGE, content_range(start as u64, end as u64, data.len() as u64))
                .body(Bytes::copy_from_slice(&data[start..=end]))
                .expect("response")
        }
    }

    async fn storage_at(endpoint: &str, buckets: BucketPolicy) -> GcsStorage {
        let config = GcsConfig::builder()
            .endpoint(endpoint.to_owned())
            .anonymous(true)
            .buckets(buckets)
            .build();
        GcsStorage::new(config).await.expect("storage")
    }

    async fn setup() -> (MockServer, GcsStorage, Downloads) {
        let downloads = Downloads::default();
        let server = MockServer::start(gcs_service(downloads.clone())).await;
        let storage = storage_at(&server.url(), BucketPolicy::default()).await;
        (server, storage, downloads)
    }

    async fn get_with_range(storage: &GcsStorage, range: &'static str) -> Object {
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static(range));
        storage
            .get_object(&headers, BUCKET, KEY, "")
            .await
            .expect("get_object")
    }

    #[tokio::test]
    async fn test_should_pass_reader_suite() {
        let (_server, storage, _downloads) = setup().await;
        let data = test_data();
        ReaderSuite {
            reader: &storage,
            container: BUCKET,
            key: KEY,
            data: &data,
            skip_partial_content_checks: false,
        }
        .run()
        .await;
    }

    #[tokio::test]
    async fn test_should_answer_not_modified_from_attributes() {
        let (_server, storage, downloads) = setup().await;
        let obj = storage
            .get_object(&HeaderMap::new(), BUCKET, KEY, "")
            .await
            .expect("get_object");
        let etag = header_str(&obj.headers, &ETAG).expect("etag").to_owned();
        assert_eq!(header_str(&obj.headers, &CONTENT_TYPE), Some("image/png"));
        assert_eq!(
            header_str(&obj.headers, &CACHE_CONTROL),
            Some("public, max-age=60")
        );
        drop(obj);
        downloads.lock().clear();

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::IF_NONE_MATCH,
            HeaderValue::from_str(&etag).expect("etag"),
        );
        let obj = storage
            .get_object(&headers, BUCKET, KEY, "")
            .await
            .expect("get_object");
        assert_eq!(obj.status, StatusCode::NOT_MODIFIED);
        assert!(obj.body.is_none());
        assert!(downloads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_should_clamp_range_to_object_size() {
        let (_server, storage, _downloads) = setup().await;
        let obj = get_with_range(&storage, "bytes=100-500").await;
        assert_eq!(obj.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(header_str(&obj.headers, &CONTENT_RANGE), Some("bytes 100-127/128"));
        assert_eq!(header_str(&obj.headers, &CONTENT_LENGTH), Some("28"));
        let body = obj.body.expect("body").bytes().await.expect("read");
        assert_eq!(&body[..], &test_data()[100..]);
    }

    #[tokio::test]
    async fn test_should_reject_range_starting_past_end() {
        let (_server, storage, downloads) = setup().await;
        for range in ["bytes=128-", "bytes=200-300"] {
            let obj = get_with_range(&storage, range).await;
            assert_eq!(obj.status, StatusCode::RANGE_NOT_SATISFIABLE);
            assert!(obj.body.is_none());
        }
        assert!(downloads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_should_pin_download_to_described_generation() {
        let (_server, storage, downloads) = setup().await;
        let obj = storage
            .get_object(&HeaderMap::new(), BUCKET, KEY, "")
            .await
            .expect("get_object");
        assert_eq!(obj.status, StatusCode::OK);
        let _ = obj.body.expect("body").bytes().await.expect("read");

        let obj = storage
            .get_object(&HeaderMap::new(), BUCKET, KEY, &OLDER.to_string())
            .await
            .expect("get_object");
        assert_eq!(obj.content_length(), Some(5));
        let body = obj.body.expect("body").bytes().await.expect("read");
        assert_eq!(&body[..], b"older");

        let seen: Vec<Option<String>> = downloads
            .lock()
            .iter()
            .map(|q| query_param(q, "generation").map(ToOwned::to_owned))
            .collect();
        assert_eq!(
            seen,
            vec![Some(LATEST.to_string()), Some(OLDER.to_string())]
        );
    }

    #[test]
    fn test_should_parse_positive_generations_only() {
        assert_eq!(parse_generation("1700000000123456"), Some(1_700_000_000_123_456));
        assert_eq!(parse_generation(""), None);
        assert_eq!(parse_generation("0"), None);
        assert_eq!(parse_generation("-3"), None);
        assert_eq!(parse_generation("v2"), None);
    }

    #[tokio::test]
    async fn test_should_return_not_found_for_empty_location() {
        let storage = storage_at("http://localhost:4443", BucketPolicy::default()).await;
        for (bucket, key) in [("", "a.png"), ("bucket", "")] {
            let obj = storage
                .get_object(&HeaderMap::new(), bucket, key, "")
                .await
                .expect("get_object");
            assert_eq!(obj.status, StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_should_deny_buckets_outside_policy() {
        let policy = BucketPolicy::builder().denied(vec!["b".into()]).build();
        let storage = storage_at("http://localhost:4443", policy).await;
        let err = storage
            .get_object(&HeaderMap::new(), "b", "image.png", "")
            .await
            .expect_err("denied");
        assert!(matches!(err, StorageError::BucketDenied { backend: "GCS", .. }));
    }

    #[tokio::test]
    async fn test_should_reject_malformed_range_before_network() {
        let storage = storage_at("http://localhost:4443", BucketPolicy::default()).await;
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=abc"));
        let obj = storage
            .get_object(&headers, "bucket", "image.png", "")
            .await
            .expect("get_object");
        assert_eq!(obj.status, StatusCode::RANGE_NOT_SATISFIABLE);
    }
}
