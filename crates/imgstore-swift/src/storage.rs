//! OpenStack Swift-backed [`StorageReader`].

use std::io;

use async_trait::async_trait;
use futures::TryStreamExt;
use http::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
    ETAG, EXPIRES, HeaderMap, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, RANGE,
};
use http::{Method, StatusCode};
use imgstore_core::conditional::is_not_modified;
use imgstore_core::utils::{copy_headers, set_header};
use imgstore_core::{Object, ObjectBody, StorageError, StorageReader, StorageResult};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{Session, authenticate};
use crate::config::SwiftConfig;

const AUTH_TOKEN: HeaderName = HeaderName::from_static("x-auth-token");

/// Reads objects from an OpenStack Swift account.
#[derive(Debug)]
pub struct SwiftStorage {
    config: SwiftConfig,
    http: reqwest::Client,
    session: RwLock<Session>,
}

impl SwiftStorage {
    /// Validate `config` and authenticate against Keystone.
    pub async fn new(config: SwiftConfig) -> StorageResult<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::backend("Swift", e))?;
        let session = authenticate(&http, &config).await?;

        info!(
            auth_url = %config.auth_url,
            auth_version = config.resolved_auth_version(),
            storage_url = %session.storage_url,
            "Swift reader created"
        );

        Ok(Self {
            config,
            http,
            session: RwLock::new(session),
        })
    }

    async fn reauthenticate(&self) -> StorageResult<Session> {
        warn!(auth_url = %self.config.auth_url, "Swift token rejected, re-authenticating");
        let session = authenticate(&self.http, &self.config).await?;
        *self.session.write() = session.clone();
        Ok(session)
    }

    /// Send a request, re-authenticating once if the token was rejected.
    async fn request(
        &self,
        method: Method,
        container: &str,
        key: Option<&str>,
        headers: &HeaderMap,
    ) -> StorageResult<reqwest::Response> {
        let session = self.session.read().clone();
        let response = self.send(&method, &session, container, key, headers).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        drop(response);

        let session = self.reauthenticate().await?;
        self.send(&method, &session, container, key, headers).await
    }

    async fn send(
        &self,
        method: &Method,
        session: &Session,
        container: &str,
        key: Option<&str>,
        headers: &HeaderMap,
    ) -> StorageResult<reqwest::Response> {
        let url = object_url(&session.storage_url, container, key)?;
        let mut headers = headers.clone();
        set_header(&mut headers, AUTH_TOKEN, &session.token);

        self.http
            .request(method.clone(), url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| StorageError::backend("Swift", e))
    }

    async fn fetch(
        &self,
        req_headers: &HeaderMap,
        container: &str,
        key: &str,
    ) -> StorageResult<Object> {
        if container.is_empty() || key.is_empty() {
            return Ok(Object::not_found(
                "invalid Swift URL: bucket name or object name are empty",
            ));
        }
        self.config.buckets.check("Swift", container)?;

        // Swift evaluates validators before `Range`, so they are only sent on
        // full reads.
        let mut headers = HeaderMap::new();
        copy_headers(req_headers, &mut headers, &[RANGE]);
        let partial = headers.contains_key(RANGE);
        if !partial {
            copy_headers(
                req_headers,
                &mut headers,
                &[IF_NONE_MATCH, IF_MODIFIED_SINCE],
            );
        }

        let response = self
            .request(Method::GET, container, Some(key), &headers)
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => {}
            StatusCode::NOT_MODIFIED => return Ok(Object::not_modified(response.headers())),
            StatusCode::NOT_FOUND => {
                drop(response);
                return self.not_found(container).await;
            }
            StatusCode::RANGE_NOT_SATISFIABLE => return Ok(Object::invalid_range()),
            _ => {
                return Err(StorageError::backend(
                    "Swift",
                    format!("unexpected response status {status}"),
                ));
            }
        }

        let mut headers = HeaderMap::new();
        copy_headers(response.headers(), &mut headers, &[ETAG, LAST_MODIFIED]);

        // Servers may ignore conditional headers; check again locally.
        if !partial && is_not_modified(req_headers, &headers) {
            return Ok(Object::not_modified(&headers));
        }

        copy_headers(
            response.headers(),
            &mut headers,
            &[
                CONTENT_LENGTH,
                CONTENT_TYPE,
                CONTENT_RANGE,
                CONTENT_ENCODING,
                CACHE_CONTROL,
                EXPIRES,
                ACCEPT_RANGES,
            ],
        );

        let body = ObjectBody::from_stream(response.bytes_stream().map_err(io::Error::other));
        Ok(if status == StatusCode::PARTIAL_CONTENT {
            Object::partial_content(headers, body)
        } else {
            Object::ok(headers, body)
        })
    }

    /// Tell a missing container from a missing object.
    async fn not_found(&self, container: &str) -> StorageResult<Object> {
        let response = self
            .request(Method::HEAD, container, None, &HeaderMap::new())
            .await?;
        Ok(Object::not_found(
            if response.status() == StatusCode::NOT_FOUND {
                "Container Not Found"
            } else {
                "Object Not Found"
            },
        ))
    }
}

#[async_trait]
impl StorageReader for SwiftStorage {
    async fn get_object(
        &self,
        req_headers: &HeaderMap,
        bucket: &str,
        key: &str,
        _query: &str,
    ) -> StorageResult<Object> {
        let obj = self.fetch(req_headers, bucket, key).await?;
        debug!(container = bucket, key, status = %obj.status, "Swift object fetched");
        Ok(obj)
    }
}

/// `<storage_url>/<container>[/<key>]` with each segment percent-encoded.
fn object_url(storage_url: &str, container: &str, key: Option<&str>) -> StorageResult<Url> {
    let mut url = Url::parse(storage_url).map_err(|e| {
        StorageError::backend("Swift", format!("invalid storage URL {storage_url:?}: {e}"))
    })?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| StorageError::backend("Swift", "storage URL can't be a base URL"))?;
        segments.pop_if_empty().push(container);
        if let Some(key) = key {
            segments.extend(key.split('/'));
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use http::Response;
    use http::header::{HOST, HeaderValue};
    use http::request::Parts;
    use imgstore_core::BucketPolicy;
    use imgstore_core::range::ByteRange;
    use imgstore_core::testsuite::{MockServer, ReaderSuite, test_data};
    use imgstore_core::url::unescape;
    use imgstore_core::utils::header_str;
    use parking_lot::Mutex;

    use super::*;

    const ACCOUNT_PATH: &str = "/v1/AUTH_test";
    const CONTAINER: &str = "test";
    const ETAG_VALUE: &str = "\"5d41402abc4b2a76b9719d911017c592\"";
    const LAST_MODIFIED_VALUE: &str = "Wed, 15 Jan 2025 10:00:00 GMT";

    /// Tokens issued by the mock and the one it currently accepts.
    #[derive(Debug, Default)]
    struct Tokens {
        issued: AtomicUsize,
        valid: Mutex<Option<String>>,
    }

    fn status(status: StatusCode) -> Response<Bytes> {
        Response::builder()
            .status(status)
            .body(Bytes::new())
            .expect("response")
    }

    /// A v1-auth Swift proxy serving one container.
    ///
    /// With `native_conditionals` off it ignores `If-None-Match` and
    /// `If-Modified-Since` like some gateways do.
    fn swift_service(
        tokens: Arc<Tokens>,
        objects: HashMap<String, Vec<u8>>,
        native_conditionals: bool,
    ) -> impl Fn(Parts) -> Response<Bytes> {
        move |parts: Parts| {
            let path = parts.uri.path();

            if path == "/auth/v1.0" {
                if header_str(&parts.headers, &HeaderName::from_static("x-auth-key"))
                    != Some("secret")
                {
                    return status(StatusCode::UNAUTHORIZED);
                }
                let n = tokens.issued.fetch_add(1, Ordering::SeqCst) + 1;
                let token = format!("tk-{n}");
                *tokens.valid.lock() = Some(token.clone());
                let host = header_str(&parts.headers, &HOST).unwrap_or("localhost");
                return Response::builder()
                    .header("X-Storage-Url", format!("http://{host}{ACCOUNT_PATH}"))
                    .header("X-Auth-Token", token)
                    .body(Bytes::new())
                    .expect("response");
            }

            let token = header_str(&parts.headers, &AUTH_TOKEN).map(ToOwned::to_owned);
            if token.is_none() || *tokens.valid.lock() != token {
                return status(StatusCode::UNAUTHORIZED);
            }

            let Some(path) = path.strip_prefix(&format!("{ACCOUNT_PATH}/")) else {
                return status(StatusCode::NOT_FOUND);
            };
            let path = unescape(path);
            let (container, object) = match path.split_once('/') {
                Some((c, o)) => (c, Some(o)),
                None => (path.as_str(), None),
            };
            if container != CONTAINER {
                return status(StatusCode::NOT_FOUND);
            }
            let Some(object) = object else {
                return status(StatusCode::NO_CONTENT);
            };
            let Some(data) = objects.get(object) else {
                return status(StatusCode::NOT_FOUND);
            };

            let mut validators = HeaderMap::new();
            validators.insert(ETAG, HeaderValue::from_static(ETAG_VALUE));
            validators.insert(LAST_MODIFIED, HeaderValue::from_static(LAST_MODIFIED_VALUE));

            // Validators win over `Range`, as in Swift's proxy server.
            if native_conditionals && is_not_modified(&parts.headers, &validators) {
                return Response::builder()
                    .status(StatusCode::NOT_MODIFIED)
                    .header(ETAG, ETAG_VALUE)
                    .header(LAST_MODIFIED, LAST_MODIFIED_VALUE)
                    .body(Bytes::new())
                    .expect("response");
            }

            let builder = Response::builder()
                .header(ETAG, ETAG_VALUE)
                .header(LAST_MODIFIED, LAST_MODIFIED_VALUE)
                .header(CONTENT_TYPE, "image/png")
                .header(ACCEPT_RANGES, "bytes");

            let range = header_str(&parts.headers, &RANGE);
            let Some(range) = ByteRange::from_header(range).expect("range") else {
                return builder
                    .body(Bytes::from(data.clone()))
                    .expect("response");
            };
            let Ok((start, end)) = range.resolve(data.len() as u64) else {
                return status(StatusCode::RANGE_NOT_SATISFIABLE);
            };
            let (start, end) = (start as usize, end as usize);
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(CONTENT_RANGE, format!("bytes {start}-{end}/{}", data.len()))
                .body(Bytes::copy_from_slice(&data[start..=end]))
                .expect("response")
        }
    }

    async fn setup_with(
        native_conditionals: bool,
        buckets: BucketPolicy,
    ) -> (MockServer, Arc<Tokens>, SwiftStorage) {
        let tokens = Arc::new(Tokens::default());
        let mut objects = HashMap::new();
        objects.insert("images/data.bin".to_owned(), test_data());
        objects.insert("my image.png".to_owned(), b"spaced".to_vec());
        let server =
            MockServer::start(swift_service(tokens.clone(), objects, native_conditionals)).await;

        let config = SwiftConfig::builder()
            .username("test:tester".into())
            .api_key("secret".into())
            .auth_url(format!("{}/auth/v1.0", server.url()))
            .buckets(buckets)
            .build();
        let storage = SwiftStorage::new(config).await.expect("storage");
        (server, tokens, storage)
    }

    async fn setup() -> (MockServer, Arc<Tokens>, SwiftStorage) {
        setup_with(true, BucketPolicy::default()).await
    }

    async fn get(storage: &SwiftStorage, headers: &HeaderMap, container: &str, key: &str) -> Object {
        storage
            .get_object(headers, container, key, "")
            .await
            .expect("get_object")
    }

    #[tokio::test]
    async fn test_should_pass_reader_suite() {
        let (_server, _tokens, storage) = setup().await;
        let data = test_data();
        ReaderSuite {
            reader: &storage,
            container: CONTAINER,
            key: "images/data.bin",
            data: &data,
            skip_partial_content_checks: false,
        }
        .run()
        .await;
    }

    #[tokio::test]
    async fn test_should_pass_reader_suite_without_native_conditionals() {
        let (_server, _tokens, storage) = setup_with(false, BucketPolicy::default()).await;
        let data = test_data();
        ReaderSuite {
            reader: &storage,
            container: CONTAINER,
            key: "images/data.bin",
            data: &data,
            skip_partial_content_checks: false,
        }
        .run()
        .await;
    }

    #[tokio::test]
    async fn test_should_distinguish_missing_container() {
        let (_server, _tokens, storage) = setup().await;

        let obj = get(&storage, &HeaderMap::new(), "missing", "images/data.bin").await;
        assert_eq!(obj.status, StatusCode::NOT_FOUND);
        let body = obj.body.expect("body").bytes().await.expect("read");
        assert_eq!(&body[..], b"Container Not Found");

        let obj = get(&storage, &HeaderMap::new(), CONTAINER, "missing.png").await;
        let body = obj.body.expect("body").bytes().await.expect("read");
        assert_eq!(&body[..], b"Object Not Found");
    }

    #[tokio::test]
    async fn test_should_reauthenticate_on_rejected_token() {
        let (_server, tokens, storage) = setup().await;
        assert_eq!(tokens.issued.load(Ordering::SeqCst), 1);

        *tokens.valid.lock() = Some("rotated".to_owned());
        let obj = get(&storage, &HeaderMap::new(), CONTAINER, "images/data.bin").await;
        assert_eq!(obj.status, StatusCode::OK);
        assert_eq!(tokens.issued.load(Ordering::SeqCst), 2);

        let obj = get(&storage, &HeaderMap::new(), CONTAINER, "images/data.bin").await;
        assert_eq!(obj.status, StatusCode::OK);
        assert_eq!(tokens.issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_should_encode_object_names() {
        let (_server, _tokens, storage) = setup().await;
        let obj = get(&storage, &HeaderMap::new(), CONTAINER, "my image.png").await;
        assert_eq!(obj.status, StatusCode::OK);
        assert_eq!(header_str(&obj.headers, &CONTENT_TYPE), Some("image/png"));
        let body = obj.body.expect("body").bytes().await.expect("read");
        assert_eq!(&body[..], b"spaced");
    }

    #[tokio::test]
    async fn test_should_serve_range_despite_matching_validators() {
        let (_server, _tokens, storage) = setup().await;
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=0-9"));
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static(ETAG_VALUE));
        headers.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_static(LAST_MODIFIED_VALUE),
        );

        let obj = get(&storage, &headers, CONTAINER, "images/data.bin").await;
        assert_eq!(obj.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(header_str(&obj.headers, &CONTENT_RANGE), Some("bytes 0-9/128"));
        let body = obj.body.expect("body").bytes().await.expect("read");
        assert_eq!(&body[..], &test_data()[..10]);
    }

    #[tokio::test]
    async fn test_should_forward_validators_on_full_reads() {
        let (_server, _tokens, storage) = setup().await;
        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, HeaderValue::from_static(ETAG_VALUE));

        let obj = get(&storage, &headers, CONTAINER, "images/data.bin").await;
        assert_eq!(obj.status, StatusCode::NOT_MODIFIED);
        assert_eq!(header_str(&obj.headers, &ETAG), Some(ETAG_VALUE));
        assert!(obj.body.is_none());
    }

    #[tokio::test]
    async fn test_should_render_unsatisfiable_range() {
        let (_server, _tokens, storage) = setup().await;
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=500-"));
        let obj = get(&storage, &headers, CONTAINER, "images/data.bin").await;
        assert_eq!(obj.status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert!(obj.body.is_none());
    }

    #[tokio::test]
    async fn test_should_return_404_for_empty_location() {
        let (_server, _tokens, storage) = setup().await;
        let obj = get(&storage, &HeaderMap::new(), "", "images/data.bin").await;
        assert_eq!(obj.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_should_deny_containers_outside_policy() {
        let policy = BucketPolicy::builder().allowed(vec!["other".into()]).build();
        let (_server, _tokens, storage) = setup_with(true, policy).await;
        let err = storage
            .get_object(&HeaderMap::new(), CONTAINER, "images/data.bin", "")
            .await
            .expect_err("denied");
        assert!(matches!(err, StorageError::BucketDenied { backend: "Swift", .. }));
    }

    #[tokio::test]
    async fn test_should_fail_with_bad_credentials() {
        let tokens = Arc::new(Tokens::default());
        let server = MockServer::start(swift_service(tokens, HashMap::new(), true)).await;
        let config = SwiftConfig::builder()
            .api_key("wrong".into())
            .auth_url(format!("{}/auth/v1.0", server.url()))
            .build();
        let err = SwiftStorage::new(config).await.expect_err("auth fails");
        assert!(matches!(err, StorageError::Backend { .. }));
    }

    #[test]
    fn test_should_build_object_url() {
        let url = object_url("https://swift.example.com/v1/AUTH_t/", "c", Some("a b/c#d.png"))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://swift.example.com/v1/AUTH_t/c/a%20b/c%23d.png"
        );

        let url = object_url("https://swift.example.com/v1/AUTH_t", "c", None).expect("url");
        assert_eq!(url.path(), "/v1/AUTH_t/c");
    }
}
