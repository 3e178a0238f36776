//! Plain `http(s)` sources.

use std::io;

use futures::TryStreamExt;
use http::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH, RANGE};
use http::{HeaderMap, Response};
use imgstore_core::ObjectBody;
use imgstore_core::utils::copy_headers;
use url::Url;

use crate::error::TransportResult;

/// Forwards requests for `http` and `https` sources to the origin.
#[derive(Debug, Clone, Default)]
pub struct HttpPassthrough {
    client: reqwest::Client,
}

impl HttpPassthrough {
    /// Wrap an HTTP client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// GET `url` with the conditional and range headers of `req_headers`.
    ///
    /// Any origin status is returned as-is; only connection failures are
    /// errors.
    pub async fn fetch(
        &self,
        url: Url,
        req_headers: &HeaderMap,
    ) -> TransportResult<Response<ObjectBody>> {
        let mut headers = HeaderMap::new();
        copy_headers(
            req_headers,
            &mut headers,
            &[RANGE, IF_NONE_MATCH, IF_MODIFIED_SINCE],
        );

        let upstream = self.client.get(url).headers(headers).send().await?;

        let status = upstream.status();
        let headers = upstream.headers().clone();

        let mut response = Response::new(ObjectBody::from_stream(
            upstream.bytes_stream().map_err(io::Error::other),
        ));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
