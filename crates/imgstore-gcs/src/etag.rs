//! Synthesized validators for GCS objects.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::DateTime;
use imgstore_core::utils::format_http_date;
use time::OffsetDateTime;

/// Decode the base64 big-endian CRC32C reported by GCS.
///
/// Missing or malformed checksums decode to 0.
pub(crate) fn decode_crc32c(crc32c: Option<&str>) -> u32 {
    crc32c
        .and_then(|v| BASE64_STANDARD.decode(v).ok())
        .and_then(|bytes| <[u8; 4]>::try_from(bytes.as_slice()).ok())
        .map_or(0, u32::from_be_bytes)
}

/// Hex ETag of the little-endian CRC32C followed by the little-endian update
/// time in Unix nanoseconds.
pub(crate) fn derive_etag(crc32c: u32, updated_nanos: i64) -> String {
    let mut tag = [0u8; 12];
    tag[..4].copy_from_slice(&crc32c.to_le_bytes());
    tag[4..].copy_from_slice(&updated_nanos.to_le_bytes());
    hex::encode(tag)
}

/// Unix nanoseconds of `ts`, saturating outside the `i64` range.
pub(crate) fn unix_nanos(ts: OffsetDateTime) -> i64 {
    i64::try_from(ts.unix_timestamp_nanos()).unwrap_or(i64::MAX)
}

/// HTTP date of `ts`.
pub(crate) fn last_modified(ts: OffsetDateTime) -> String {
    DateTime::from_timestamp(ts.unix_timestamp(), ts.nanosecond())
        .map(|dt| format_http_date(&dt))
        .unwrap_or_default()
}
