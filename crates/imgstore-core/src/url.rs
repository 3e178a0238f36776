//! Storage URL decomposition.
//!
//! Storage URLs (`s3://bucket/key`, `local:///path`, ...) are opaque: their
//! keys may contain `%`, `?` and `#`, which a standard URL parser would treat
//! as escapes, the query, and the fragment. [`escape_url`] neutralizes those
//! characters before parsing and [`bucket_and_key`] reverses the escaping
//! after the bucket and key have been extracted.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use url::Url;

/// Default separator between an object key and its query token.
pub const DEFAULT_QUERY_SEPARATOR: &str = "?";

/// A storage URL split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectLocation {
    /// The URL host: bucket, container, or empty for `local`.
    pub bucket: String,
    /// The decoded path without leading slashes.
    pub key: String,
    /// Everything after the query separator, without the separator.
    pub query: String,
}

/// Escape reserved characters of a non-HTTP URL so it parses losslessly.
///
/// `%` is replaced first so that the `%3F` and `%23` produced for `?` and
/// `#` cannot be confused with escapes already present in the input.
/// `http://` and `https://` URLs are returned unchanged.
///
/// # Examples
///
/// ```
/// use imgstore_core::url::escape_url;
///
/// assert_eq!(escape_url("s3://b/100%?.png#x"), "s3://b/100%25%3F.png%23x");
/// assert_eq!(escape_url("https://a/b?c=1"), "https://a/b?c=1");
/// ```
#[must_use]
pub fn escape_url(url: &str) -> Cow<'_, str> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Cow::Borrowed(url);
    }
    Cow::Owned(
        url.replace('%', "%25")
            .replace('?', "%3F")
            .replace('#', "%23"),
    )
}

/// Escape and parse a storage URL.
///
/// # Errors
///
/// Returns the parser error when the escaped URL is still invalid.
pub fn parse_url(url: &str) -> Result<Url, url::ParseError> {
    Url::parse(&escape_url(url))
}

/// Reverse the escaping applied by [`escape_url`] and by the URL parser.
///
/// Every `%` of the original text was escaped, so every `%XX` sequence in a
/// parsed component was synthesized. Decoding them in a single left-to-right
/// pass never re-interprets a decoded `%`, which is the same guarantee the
/// "decode `%25` last" ordering gives.
///
/// # Examples
///
/// ```
/// use imgstore_core::url::unescape;
///
/// assert_eq!(unescape("100%25%3F.png"), "100%?.png");
/// assert_eq!(unescape("a%2523"), "a%23");
/// ```
#[must_use]
pub fn unescape(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Split a parsed storage URL into bucket, key, and query.
///
/// The host becomes the bucket. The raw path, stripped of leading slashes and
/// unescaped, becomes the key. When `separator` is non-empty the key is cut at
/// its first occurrence and the remainder becomes the query.
///
/// # Examples
///
/// ```
/// use imgstore_core::url::{bucket_and_key, parse_url};
///
/// let url = parse_url("s3://images/a/b.png?version=3").unwrap();
/// let loc = bucket_and_key(&url, "?");
/// assert_eq!(loc.bucket, "images");
/// assert_eq!(loc.key, "a/b.png");
/// assert_eq!(loc.query, "version=3");
/// ```
#[must_use]
pub fn bucket_and_key(url: &Url, separator: &str) -> ObjectLocation {
    let bucket = unescape(url.host_str().unwrap_or_default());
    let key = unescape(url.path().trim_start_matches('/'));

    if separator.is_empty() {
        return ObjectLocation {
            bucket,
            key,
            query: String::new(),
        };
    }

    match key.split_once(separator) {
        Some((key, query)) => ObjectLocation {
            bucket,
            key: key.to_owned(),
            query: query.to_owned(),
        },
        None => ObjectLocation {
            bucket,
            key,
            query: String::new(),
        },
    }
}
