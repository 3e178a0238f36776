//! Shared utilities for storage readers.
//!
//! Provides HTTP-date formatting and parsing, ETag normalization, and small
//! header map helpers used by every backend adapter.

use chrono::{DateTime, NaiveDateTime, Utc};
use http::header::{HeaderMap, HeaderName, HeaderValue};

// ---------------------------------------------------------------------------
// HTTP dates
// ---------------------------------------------------------------------------

/// The IMF-fixdate layout used for `Last-Modified` and friends.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Obsolete RFC 850 layout still accepted by HTTP/1.1 parsers.
const RFC850_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S GMT";

/// Obsolete ANSI C `asctime()` layout.
const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Format a timestamp as an HTTP date (`Mon, 02 Jan 2006 15:04:05 GMT`).
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use imgstore_core::utils::format_http_date;
///
/// let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
/// assert_eq!(format_http_date(&ts), "Mon, 15 Jan 2024 10:30:00 GMT");
/// ```
#[must_use]
pub fn format_http_date(ts: &DateTime<Utc>) -> String {
    ts.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse an HTTP date in any of the three formats allowed by HTTP/1.1.
///
/// Returns `None` for anything that is not a valid HTTP date.
///
/// # Examples
///
/// ```
/// use imgstore_core::utils::parse_http_date;
///
/// assert!(parse_http_date("Mon, 15 Jan 2024 10:30:00 GMT").is_some());
/// assert!(parse_http_date("yesterday").is_none());
/// ```
#[must_use]
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, HTTP_DATE_FORMAT) {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, RFC850_FORMAT) {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, ASCTIME_FORMAT) {
        return Some(dt.and_utc());
    }
    None
}

// ---------------------------------------------------------------------------
// ETags
// ---------------------------------------------------------------------------

/// Normalize an ETag by stripping a weak `W/` prefix and surrounding quotes.
///
/// # Examples
///
/// ```
/// use imgstore_core::utils::normalize_etag;
///
/// assert_eq!(normalize_etag("\"abc\""), "abc");
/// assert_eq!(normalize_etag("W/\"abc\""), "abc");
/// assert_eq!(normalize_etag("abc"), "abc");
/// ```
#[must_use]
pub fn normalize_etag(etag: &str) -> &str {
    let etag = etag.trim();
    let etag = etag.strip_prefix("W/").unwrap_or(etag);
    etag.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(etag)
}

// ---------------------------------------------------------------------------
// Header helpers
// ---------------------------------------------------------------------------

/// Return a header value as a non-empty string, ignoring non-ASCII values.
#[must_use]
pub fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Set a header, silently skipping values that are not valid header text.
pub fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(hv) = HeaderValue::from_str(value) {
        headers.insert(name, hv);
    }
}

/// Set a header only when the value is present and non-empty.
pub fn set_optional_header(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        set_header(headers, name, v);
    }
}

/// Copy the named headers from `src` into `dst` when present.
pub fn copy_headers(src: &HeaderMap, dst: &mut HeaderMap, names: &[HeaderName]) {
    for name in names {
        for value in src.get_all(name) {
            dst.append(name.clone(), value.clone());
        }
    }
}
