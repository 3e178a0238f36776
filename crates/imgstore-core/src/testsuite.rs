//! Conformance checks shared by every [`StorageReader`] implementation.
//!
//! Each backend's tests seed an object with [`ReaderSuite::data`] and then
//! call [`ReaderSuite::run`], which checks the HTTP semantics the reader
//! contract promises: validators, conditional requests, ranges, and 404s.
//!
//! [`MockServer`] is a minimal HTTP/1 server for readers that talk to a
//! remote API.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{
    CONTENT_LENGTH, CONTENT_RANGE, ETAG, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED, RANGE,
};
use http::request::Parts;
use http::{HeaderMap, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::Object;
use crate::reader::StorageReader;
use crate::utils::{format_http_date, header_str, parse_http_date};

// ---------------------------------------------------------------------------
// Mock server
// ---------------------------------------------------------------------------

/// An HTTP/1 server on a random local port answering every request with a
/// handler. Request bodies are discarded. Stops when dropped.
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Bind to `127.0.0.1:0` and start serving.
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(Parts) -> Response<Bytes> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let handler = Arc::new(handler);

        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    continue;
                };
                let handler = handler.clone();
                tokio::spawn(async move {
                    let svc = service_fn(move |req: Request<Incoming>| {
                        let handler = handler.clone();
                        async move {
                            let (parts, _body) = req.into_parts();
                            Ok::<_, Infallible>(handler(parts).map(Full::new))
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        Self { addr, task }
    }

    /// Base URL of the server, without a trailing slash.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Conformance suite
// ---------------------------------------------------------------------------

/// Size of the object a suite expects to find.
pub const TEST_DATA_SIZE: usize = 128;

/// Deterministic test payload of [`TEST_DATA_SIZE`] bytes.
#[must_use]
pub fn test_data() -> Vec<u8> {
    (0..TEST_DATA_SIZE)
        .map(|i| u8::try_from((i * 7 + 3) % 256).unwrap_or_default())
        .collect()
}

/// A configured conformance run against one reader.
#[derive(Debug)]
pub struct ReaderSuite<'a> {
    /// The reader under test.
    pub reader: &'a dyn StorageReader,
    /// Bucket or container holding the object; empty for the local reader.
    pub container: &'a str,
    /// Key of the seeded object.
    pub key: &'a str,
    /// Bytes the seeded object holds.
    pub data: &'a [u8],
    /// Skip the 206/`Content-Range` assertions for backends that cannot
    /// report partial content.
    pub skip_partial_content_checks: bool,
}

impl ReaderSuite<'_> {
    /// Run every check.
    pub async fn run(&self) {
        self.etag_enabled().await;
        self.if_none_match_returns_304().await;
        self.updated_etag_returns_200().await;
        self.last_modified_enabled().await;
        self.if_modified_since_returns_304().await;
        self.updated_last_modified_returns_200().await;
        self.range_request().await;
        self.range_overrides_conditional().await;
        self.object_not_found().await;
        self.container_not_found().await;
    }

    async fn fetch(&self, headers: &HeaderMap) -> Object {
        self.fetch_from(self.container, self.key, headers).await
    }

    async fn fetch_from(&self, container: &str, key: &str, headers: &HeaderMap) -> Object {
        self.reader
            .get_object(headers, container, key, "")
            .await
            .expect("get_object should not fail")
    }

    async fn validator(&self, name: &http::HeaderName) -> String {
        let obj = self.fetch(&HeaderMap::new()).await;
        assert_eq!(obj.status, StatusCode::OK);
        header_str(&obj.headers, name)
            .unwrap_or_else(|| panic!("{name} header should be present"))
            .to_owned()
    }

    /// A full read returns 200 with an `ETag` and the whole body.
    pub async fn etag_enabled(&self) {
        let obj = self.fetch(&HeaderMap::new()).await;
        assert_eq!(obj.status, StatusCode::OK);
        assert!(header_str(&obj.headers, &ETAG).is_some());
        assert_eq!(obj.content_length(), Some(self.data.len() as u64));

        let body = obj.body.expect("body").bytes().await.expect("read body");
        assert_eq!(&body[..], self.data);
    }

    /// A matching `If-None-Match` returns 304 with no body.
    pub async fn if_none_match_returns_304(&self) {
        let etag = self.validator(&ETAG).await;

        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, HeaderValue::from_str(&etag).expect("etag"));
        let obj = self.fetch(&headers).await;
        assert_eq!(obj.status, StatusCode::NOT_MODIFIED);
        assert!(obj.body.is_none());
        assert_eq!(header_str(&obj.headers, &ETAG), Some(etag.as_str()));
    }

    /// A stale `If-None-Match` returns 200 with a body.
    pub async fn updated_etag_returns_200(&self) {
        let etag = self.validator(&ETAG).await;

        let mut headers = HeaderMap::new();
        headers.insert(
            IF_NONE_MATCH,
            HeaderValue::from_str(&format!("{etag}_wrong")).expect("etag"),
        );
        let obj = self.fetch(&headers).await;
        assert_eq!(obj.status, StatusCode::OK);
        assert!(obj.body.is_some());
    }

    /// A full read carries `Last-Modified`.
    pub async fn last_modified_enabled(&self) {
        let last_modified = self.validator(&LAST_MODIFIED).await;
        assert!(parse_http_date(&last_modified).is_some());
    }

    /// `If-Modified-Since` equal to `Last-Modified` returns 304.
    pub async fn if_modified_since_returns_304(&self) {
        let last_modified = self.validator(&LAST_MODIFIED).await;

        let mut headers = HeaderMap::new();
        headers.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_str(&last_modified).expect("date"),
        );
        let obj = self.fetch(&headers).await;
        assert_eq!(obj.status, StatusCode::NOT_MODIFIED);
        assert!(obj.body.is_none());
    }

    /// An older `If-Modified-Since` returns 200.
    pub async fn updated_last_modified_returns_200(&self) {
        let last_modified = self.validator(&LAST_MODIFIED).await;
        let since = parse_http_date(&last_modified).expect("date") - chrono::Duration::minutes(1);

        let mut headers = HeaderMap::new();
        headers.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_str(&format_http_date(&since)).expect("date"),
        );
        let obj = self.fetch(&headers).await;
        assert_eq!(obj.status, StatusCode::OK);
        assert!(obj.body.is_some());
    }

    /// `bytes=10-19` returns exactly those ten bytes.
    pub async fn range_request(&self) {
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=10-19"));
        let obj = self.fetch(&headers).await;

        if !self.skip_partial_content_checks {
            assert_eq!(obj.status, StatusCode::PARTIAL_CONTENT);
            let expected = format!("bytes 10-19/{}", self.data.len());
            assert_eq!(header_str(&obj.headers, &CONTENT_RANGE), Some(expected.as_str()));
        }
        assert_eq!(header_str(&obj.headers, &CONTENT_LENGTH), Some("10"));

        let body = obj.body.expect("body").bytes().await.expect("read body");
        assert_eq!(&body[..], &self.data[10..20]);
    }

    /// Validators are ignored on range requests.
    pub async fn range_overrides_conditional(&self) {
        let etag = self.validator(&ETAG).await;

        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=0-9"));
        headers.insert(IF_NONE_MATCH, HeaderValue::from_str(&etag).expect("etag"));
        let obj = self.fetch(&headers).await;
        assert_ne!(obj.status, StatusCode::NOT_MODIFIED);
        assert!(obj.body.is_some());
    }

    /// A missing key returns 404.
    pub async fn object_not_found(&self) {
        let obj = self
            .fetch_from(self.container, "nonexistent/object.png", &HeaderMap::new())
            .await;
        assert_eq!(obj.status, StatusCode::NOT_FOUND);
    }

    /// A missing container returns 404. Skipped for container-less readers.
    pub async fn container_not_found(&self) {
        if self.container.is_empty() {
            return;
        }
        let obj = self
            .fetch_from("nonexistent-container", self.key, &HeaderMap::new())
            .await;
        assert_eq!(obj.status, StatusCode::NOT_FOUND);
    }
}
