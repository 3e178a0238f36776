//! Content type detection.
//!
//! Magic-byte signatures cover the formats an image proxy is fed. Anything
//! unrecognized is classified as text or binary, and those generic results
//! fall back to the file extension.

use std::path::Path;

/// Number of leading bytes inspected by [`sniff`].
pub(crate) const SNIFF_LEN: usize = 512;

/// Exact prefix signatures.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"II*\x00", "image/tiff"),
    (b"MM\x00*", "image/tiff"),
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\x1f\x8b\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x00asm", "application/wasm"),
];

/// Detect a MIME type from the leading bytes of a file.
///
/// Never fails: unknown binary data is `application/octet-stream`.
pub(crate) fn sniff(head: &[u8]) -> &'static str {
    if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| head.starts_with(sig)) {
        return *mime;
    }

    // RIFF containers carry their format at offset 8.
    if head.len() >= 12 && head.starts_with(b"RIFF") && &head[8..12] == b"WEBP" {
        return "image/webp";
    }

    // ISO-BMFF brands at offset 4.
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return match &head[8..12] {
            b"avif" | b"avis" => "image/avif",
            b"heic" | b"heix" | b"mif1" => "image/heic",
            _ => "video/mp4",
        };
    }

    let trimmed = trim_leading_whitespace(head);
    if starts_with_ignore_case(trimmed, b"<svg") {
        return "image/svg+xml";
    }
    if starts_with_ignore_case(trimmed, b"<?xml") {
        return "text/xml; charset=utf-8";
    }
    if starts_with_ignore_case(trimmed, b"<!doctype html")
        || starts_with_ignore_case(trimmed, b"<html")
    {
        return "text/html; charset=utf-8";
    }

    if head.iter().any(|b| is_binary_byte(*b)) {
        "application/octet-stream"
    } else {
        "text/plain; charset=utf-8"
    }
}

/// Detect the content type of a file from its head and name.
///
/// Generic sniffing results (`text/plain`, `application/octet-stream`) are
/// replaced by the extension's type when the extension is known.
pub(crate) fn detect_content_type(head: &[u8], path: &Path) -> String {
    let sniffed = sniff(head);
    let generic =
        sniffed.starts_with("text/plain") || sniffed.starts_with("application/octet-stream");

    if generic {
        if let Some(guess) = mime_guess::from_path(path).first() {
            return guess.essence_str().to_owned();
        }
    }
    sniffed.to_owned()
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn starts_with_ignore_case(data: &[u8], prefix: &[u8]) -> bool {
    data.len() >= prefix.len() && data[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}
