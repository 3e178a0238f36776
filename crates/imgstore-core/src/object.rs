//! The normalized storage fetch result.
//!
//! An [`Object`] is what every backend returns, whatever the native response
//! looked like. Its constructors enforce the status/body/header invariants:
//!
//! | Status | Body | Headers |
//! |--------|------|---------|
//! | 200, 206 | present | backend headers |
//! | 304 | absent | only `ETag` and `Last-Modified` |
//! | 416 | absent | none |
//! | 404 and other errors | `text/plain` message | `Content-Type` |

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap, HeaderValue, LAST_MODIFIED};
use http::{Response, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_util::io::{ReaderStream, StreamReader};

use crate::utils::{copy_headers, header_str};

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// An exclusively-owned object body stream.
///
/// Dropping the body closes the underlying file descriptor or connection.
pub struct ObjectBody {
    inner: Pin<Box<dyn AsyncRead + Send>>,
}

impl ObjectBody {
    /// Wrap any async reader.
    pub fn new(reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            inner: Box::pin(reader),
        }
    }

    /// Wrap a stream of byte chunks.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<io::Error> + 'static,
    {
        Self::new(StreamReader::new(stream.map_err(Into::into)))
    }

    /// A body holding the given bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::new(io::Cursor::new(data.into()))
    }

    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// Read the whole body into memory.
    pub async fn bytes(mut self) -> io::Result<Bytes> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Convert the body into a stream of chunks.
    #[must_use]
    pub fn into_stream(self) -> ReaderStream<Self> {
        ReaderStream::new(self)
    }
}

impl AsyncRead for ObjectBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

/// A storage object fetch result.
#[derive(Debug)]
pub struct Object {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers harvested from the backend response.
    pub headers: HeaderMap,
    /// Response body, absent for 304 and 416.
    pub body: Option<ObjectBody>,
    content_length: Option<u64>,
}

impl Object {
    /// A `200 OK` result.
    #[must_use]
    pub fn ok(headers: HeaderMap, body: ObjectBody) -> Self {
        Self {
            status: StatusCode::OK,
            headers,
            body: Some(body),
            content_length: None,
        }
    }

    /// A `206 Partial Content` result.
    #[must_use]
    pub fn partial_content(headers: HeaderMap, body: ObjectBody) -> Self {
        Self {
            status: StatusCode::PARTIAL_CONTENT,
            headers,
            body: Some(body),
            content_length: None,
        }
    }

    /// A `404 Not Found` result carrying `message` as a plain-text body.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(StatusCode::NOT_FOUND, message)
    }

    /// An error result with a custom status and a plain-text body.
    #[must_use]
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Self {
            status,
            headers,
            content_length: Some(message.len() as u64),
            body: Some(ObjectBody::from_bytes(message)),
        }
    }

    /// A `304 Not Modified` result.
    ///
    /// Only `ETag` and `Last-Modified` are kept from `headers`.
    #[must_use]
    pub fn not_modified(headers: &HeaderMap) -> Self {
        let mut nm_headers = HeaderMap::new();
        copy_headers(headers, &mut nm_headers, &[ETAG, LAST_MODIFIED]);
        Self {
            status: StatusCode::NOT_MODIFIED,
            headers: nm_headers,
            body: None,
            content_length: Some(0),
        }
    }

    /// A `416 Range Not Satisfiable` result.
    #[must_use]
    pub fn invalid_range() -> Self {
        Self {
            status: StatusCode::RANGE_NOT_SATISFIABLE,
            headers: HeaderMap::new(),
            body: None,
            content_length: Some(0),
        }
    }

    /// Render a status reported by a backend.
    ///
    /// Statuses with a dedicated constructor keep their invariants (304
    /// keeps only validators, 416 drops everything); anything else becomes a
    /// plain-text error result.
    #[must_use]
    pub fn from_status(status: StatusCode, message: impl Into<String>, headers: &HeaderMap) -> Self {
        match status {
            StatusCode::NOT_MODIFIED => Self::not_modified(headers),
            StatusCode::RANGE_NOT_SATISFIABLE => Self::invalid_range(),
            _ => Self::error(status, message),
        }
    }

    /// Whether the result carries object data (200 or 206).
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, StatusCode::OK | StatusCode::PARTIAL_CONTENT)
    }

    /// The body length, if known.
    ///
    /// Error, 304 and 416 results know their length; data results fall back
    /// to the `Content-Length` header.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        if let Some(len) = self.content_length {
            return Some(len);
        }
        header_str(&self.headers, &CONTENT_LENGTH).and_then(|v| v.parse().ok())
    }

    /// Convert the result into an HTTP response.
    ///
    /// Results without a body get an empty one. A known content length is
    /// written to `Content-Length` when the header is missing.
    #[must_use]
    pub fn into_response(self) -> Response<ObjectBody> {
        let content_length = self.content_length();
        let mut headers = self.headers;
        if let Some(len) = content_length {
            if !headers.contains_key(CONTENT_LENGTH) {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
            }
        }

        let mut response = Response::new(self.body.unwrap_or_else(ObjectBody::empty));
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }
}
