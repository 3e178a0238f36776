//! `Range` header parsing.
//!
//! Only the single-range `bytes=start-end` form is supported, with an
//! optional open end (`bytes=start-`). Suffix ranges (`bytes=-N`) are
//! rejected. When several ranges are listed, the first non-empty one wins.
//!
//! Parsing happens without knowing the object size, so the parser reports
//! [`RangeError::Malformed`] for syntax problems. [`ByteRange::resolve`]
//! reports [`RangeError::Unsatisfiable`] once the size is known. Callers
//! render both as `416 Range Not Satisfiable`.

use std::fmt;

/// Range header failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// The header is not a valid single byte range.
    #[error("invalid range")]
    Malformed,

    /// The range starts at or beyond the end of the object.
    #[error("range not satisfiable")]
    Unsatisfiable,
}

/// Parse a `Range` header value into `(start, end)`.
///
/// - An empty value returns `(0, 0)`: no range was requested.
/// - An open-ended range returns a negative `end`.
/// - Otherwise both bounds are inclusive byte offsets.
///
/// Note that `bytes=0-0` also yields `end == 0` and therefore reads the
/// whole object.
///
/// # Errors
///
/// Returns [`RangeError::Malformed`] when the value is not a `bytes=` range,
/// has no start, has non-numeric bounds, or has `start > end`.
///
/// # Examples
///
/// ```
/// use imgstore_core::range::{parse, RangeError};
///
/// assert_eq!(parse(""), Ok((0, 0)));
/// assert_eq!(parse("bytes=10-19"), Ok((10, 19)));
/// assert_eq!(parse("bytes=10-"), Ok((10, -1)));
/// assert_eq!(parse("bytes=-10"), Err(RangeError::Malformed));
/// ```
pub fn parse(s: &str) -> Result<(i64, i64), RangeError> {
    if s.is_empty() {
        return Ok((0, 0));
    }

    let ranges = s.strip_prefix("bytes=").ok_or(RangeError::Malformed)?;

    for range in ranges.split(',') {
        let range = range.trim();
        if range.is_empty() {
            continue;
        }

        let (start, end) = range.split_once('-').ok_or(RangeError::Malformed)?;
        let (start, end) = (start.trim(), end.trim());

        // Suffix ranges are not supported.
        if start.is_empty() {
            return Err(RangeError::Malformed);
        }

        let start = parse_offset(start)?;

        if end.is_empty() {
            return Ok((start, -1));
        }

        let end = parse_offset(end)?;
        if start > end {
            return Err(RangeError::Malformed);
        }

        return Ok((start, end));
    }

    Err(RangeError::Malformed)
}

/// Parse a non-negative decimal offset.
fn parse_offset(s: &str) -> Result<i64, RangeError> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    s.parse::<i64>().map_err(|_| RangeError::Malformed)
}

/// A requested byte range with an inclusive, possibly open end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset (inclusive), or `None` for "to the end".
    pub end: Option<u64>,
}

impl ByteRange {
    /// Interpret an optional `Range` header.
    ///
    /// Returns `Ok(None)` when no header is present or when the header is the
    /// degenerate "no range" case, meaning a full read should be issued.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgstore_core::range::ByteRange;
    ///
    /// assert_eq!(ByteRange::from_header(None), Ok(None));
    /// let r = ByteRange::from_header(Some("bytes=5-")).unwrap().unwrap();
    /// assert_eq!((r.start, r.end), (5, None));
    /// ```
    pub fn from_header(value: Option<&str>) -> Result<Option<Self>, RangeError> {
        let (start, end) = parse(value.unwrap_or_default())?;
        match end {
            0 => Ok(None),
            e if e < 0 => Ok(Some(Self {
                start: start.unsigned_abs(),
                end: None,
            })),
            e => Ok(Some(Self {
                start: start.unsigned_abs(),
                end: Some(e.unsigned_abs()),
            })),
        }
    }

    /// Resolve the range against an object of `size` bytes.
    ///
    /// Returns the inclusive `(start, end)` pair with `end` clamped to the
    /// last byte of the object.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::Unsatisfiable`] when `start >= size`.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgstore_core::range::{ByteRange, RangeError};
    ///
    /// let r = ByteRange { start: 10, end: Some(100) };
    /// assert_eq!(r.resolve(32), Ok((10, 31)));
    /// assert_eq!(r.resolve(8), Err(RangeError::Unsatisfiable));
    /// ```
    pub fn resolve(self, size: u64) -> Result<(u64, u64), RangeError> {
        if self.start >= size {
            return Err(RangeError::Unsatisfiable);
        }
        let last = size - 1;
        let end = self.end.map_or(last, |e| e.min(last));
        Ok((self.start, end))
    }

    /// Number of requested bytes, or `None` for an open-ended range.
    #[must_use]
    pub fn length(self) -> Option<u64> {
        self.end.map(|e| e - self.start + 1)
    }

    /// Render the range as a request header value (`bytes=start-end`).
    #[must_use]
    pub fn to_header_value(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "bytes={}-{end}", self.start),
            None => write!(f, "bytes={}-", self.start),
        }
    }
}

/// Render a `Content-Range` response header value.
///
/// # Examples
///
/// ```
/// use imgstore_core::range::content_range;
///
/// assert_eq!(content_range(10, 19, 32), "bytes 10-19/32");
/// ```
#[must_use]
pub fn content_range(start: u64, end: u64, size: u64) -> String {
    format!("bytes {start}-{end}/{size}")
}
