//! Conditional GET evaluation.
//!
//! Backends that cannot short-circuit conditional requests natively run
//! [`is_not_modified`] on the response headers they are about to return.

use http::header::{ETAG, HeaderMap, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};

use crate::utils::{header_str, normalize_etag, parse_http_date};

/// Decide whether the request's validators allow a `304 Not Modified`.
///
/// The ETag comparison takes priority: when both the request carries
/// `If-None-Match` and the response carries `ETag`, their match decides
/// alone. Otherwise `If-Modified-Since` is compared with `Last-Modified`; the
/// object is unmodified when it was not modified after the requested date.
/// Unparsable dates never produce a 304.
///
/// # Examples
///
/// ```
/// use http::HeaderMap;
/// use http::header::{ETAG, IF_NONE_MATCH};
/// use imgstore_core::conditional::is_not_modified;
///
/// let mut req = HeaderMap::new();
/// req.insert(IF_NONE_MATCH, "\"v1\"".parse().unwrap());
/// let mut resp = HeaderMap::new();
/// resp.insert(ETAG, "\"v1\"".parse().unwrap());
///
/// assert!(is_not_modified(&req, &resp));
/// ```
#[must_use]
pub fn is_not_modified(req_headers: &HeaderMap, resp_headers: &HeaderMap) -> bool {
    if let (Some(if_none_match), Some(etag)) = (
        header_str(req_headers, &IF_NONE_MATCH),
        header_str(resp_headers, &ETAG),
    ) {
        return etag_matches(if_none_match, etag);
    }

    let (Some(if_modified_since), Some(last_modified)) = (
        header_str(req_headers, &IF_MODIFIED_SINCE),
        header_str(resp_headers, &LAST_MODIFIED),
    ) else {
        return false;
    };

    match (
        parse_http_date(if_modified_since),
        parse_http_date(last_modified),
    ) {
        (Some(since), Some(modified)) => modified <= since,
        _ => false,
    }
}

/// Check an `If-None-Match` value (`*` or a list of ETags) against an ETag.
///
/// # Examples
///
/// ```
/// use imgstore_core::conditional::etag_matches;
///
/// assert!(etag_matches("*", "\"abc\""));
/// assert!(etag_matches("\"x\", \"abc\"", "\"abc\""));
/// assert!(!etag_matches("\"abc\"_wrong", "\"abc\""));
/// ```
#[must_use]
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if if_none_match.trim() == "*" {
        return true;
    }
    let etag = normalize_etag(etag);
    if normalize_etag(if_none_match) == etag {
        return true;
    }
    if_none_match
        .split(',')
        .any(|candidate| normalize_etag(candidate) == etag)
}
