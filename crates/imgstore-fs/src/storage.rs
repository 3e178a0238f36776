//! Filesystem-backed [`StorageReader`].

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, HeaderMap, HeaderValue,
    LAST_MODIFIED, RANGE,
};
use imgstore_core::conditional::is_not_modified;
use imgstore_core::range::{ByteRange, content_range};
use imgstore_core::utils::{format_http_date, header_str, set_header};
use imgstore_core::{Object, ObjectBody, StorageReader, StorageResult};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use crate::config::FsConfig;
use crate::sniff::{SNIFF_LEN, detect_content_type};

/// Reads objects from a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Create a reader after validating the configured root.
    pub fn new(config: &FsConfig) -> StorageResult<Self> {
        config.validate()?;
        info!(root = %config.root, "local filesystem reader created");
        Ok(Self {
            root: PathBuf::from(&config.root),
        })
    }

    /// The directory objects are served from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn fetch(&self, req_headers: &HeaderMap, key: &str) -> StorageResult<Object> {
        if key.is_empty() {
            return Ok(Object::not_found(
                "invalid local storage URL: object name is empty",
            ));
        }

        let name = clean_path(key);
        let path = self.root.join(name.trim_start_matches('/'));

        let mut file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Ok(Object::not_found(format!("{name} doesn't exist")));
            }
            Err(e) => return Err(e.into()),
        };

        let meta = file.metadata().await?;
        if meta.is_dir() {
            return Ok(Object::not_found(format!("{name} is directory")));
        }
        let size = meta.len();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut file)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await?;
        file.seek(SeekFrom::Start(0)).await?;
        set_header(&mut headers, CONTENT_TYPE, &detect_content_type(&head, &path));

        let range = match ByteRange::from_header(header_str(req_headers, &RANGE)) {
            Ok(range) => range,
            Err(_) => return Ok(Object::invalid_range()),
        };

        if let Some(range) = range {
            let Ok((start, end)) = range.resolve(size) else {
                return Ok(Object::invalid_range());
            };
            file.seek(SeekFrom::Start(start)).await?;

            let len = end - start + 1;
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
            set_header(&mut headers, CONTENT_RANGE, &content_range(start, end, size));

            return Ok(Object::partial_content(
                headers,
                ObjectBody::new(file.take(len)),
            ));
        }

        let modified: DateTime<Utc> = meta.modified()?.into();
        set_header(&mut headers, ETAG, &build_etag(&name, size, &modified));
        set_header(&mut headers, LAST_MODIFIED, &format_http_date(&modified));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));

        if is_not_modified(req_headers, &headers) {
            return Ok(Object::not_modified(&headers));
        }

        Ok(Object::ok(headers, ObjectBody::new(file)))
    }
}

#[async_trait]
impl StorageReader for FsStorage {
    async fn get_object(
        &self,
        req_headers: &HeaderMap,
        _bucket: &str,
        key: &str,
        _query: &str,
    ) -> StorageResult<Object> {
        let obj = self.fetch(req_headers, key).await?;
        debug!(key, status = %obj.status, "local object fetched");
        Ok(obj)
    }
}

/// Lexically clean `/`-prefixed `name`, resolving `.` and `..` segments
/// without ever climbing above the root.
fn clean_path(name: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Build a quoted ETag from the file path, size and modification time.
fn build_etag(path: &str, size: u64, modified: &DateTime<Utc>) -> String {
    let nanos = modified.timestamp_nanos_opt().unwrap_or_default();
    let tag = format!("{path}__{size}__{nanos}");
    format!("\"{}\"", URL_SAFE_NO_PAD.encode(Sha256::digest(tag.as_bytes())))
}
