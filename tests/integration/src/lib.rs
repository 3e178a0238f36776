//! Integration tests for the imgstore S3 reader.
//!
//! These tests require an S3-compatible server (RustStack, MinIO, ...) at
//! `localhost:4566` and credentials the reader can pick up from the default
//! AWS chain. They are marked `#[ignore]` so they don't run during normal
//! `cargo test`.
//!
//! Run them with:
//! ```text
//! AWS_ACCESS_KEY_ID=test AWS_SECRET_ACCESS_KEY=test \
//!     cargo test -p imgstore-integration -- --ignored
//! ```

use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use imgstore_s3::{S3Config, S3Storage};

static INIT: Once = Once::new();

/// Region the server is addressed in.
pub const REGION: &str = "us-east-1";

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
#[must_use]
pub fn endpoint_url() -> String {
    std::env::var("S3_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Create an S3 client used to seed fixtures.
#[must_use]
pub fn s3_client() -> aws_sdk_s3::Client {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "integration-test");

    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(REGION))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(config)
}

/// Reader configuration pointing at the local server.
#[must_use]
pub fn reader_config() -> S3Config {
    S3Config::builder()
        .region(REGION.into())
        .endpoint(endpoint_url())
        .build()
}

/// Create the reader under test.
pub async fn s3_reader() -> S3Storage {
    init_tracing();
    S3Storage::new(reader_config())
        .await
        .expect("failed to create S3 reader")
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{prefix}-{nanos:x}{n}")
}

/// Create `bucket` unless it already exists.
pub async fn ensure_bucket(client: &aws_sdk_s3::Client, bucket: &str) {
    if client.head_bucket().bucket(bucket).send().await.is_ok() {
        return;
    }
    client
        .create_bucket()
        .bucket(bucket)
        .send()
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {bucket}: {e}"));
}

/// Upload `data` to `bucket/key`, returning the version id if any.
pub async fn put_object(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    data: &[u8],
) -> Option<String> {
    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .content_type("image/png")
        .body(ByteStream::from(data.to_vec()))
        .send()
        .await
        .unwrap_or_else(|e| panic!("failed to put {bucket}/{key}: {e}"))
        .version_id()
        .map(ToOwned::to_owned)
}

/// Delete all objects in a bucket, then delete the bucket.
pub async fn cleanup_bucket(client: &aws_sdk_s3::Client, bucket: &str) {
    let Ok(resp) = client.list_object_versions().bucket(bucket).send().await else {
        return; // Bucket may not exist.
    };

    for version in resp.versions() {
        if let Some(key) = version.key() {
            let _ = client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .set_version_id(version.version_id().map(ToOwned::to_owned))
                .send()
                .await;
        }
    }
    for marker in resp.delete_markers() {
        if let Some(key) = marker.key() {
            let _ = client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .set_version_id(marker.version_id().map(ToOwned::to_owned))
                .send()
                .await;
        }
    }

    let _ = client.delete_bucket().bucket(bucket).send().await;
}

/// A 32-byte PNG-signed payload.
#[must_use]
pub fn test_png() -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend((0u8..24).map(|i| i.wrapping_mul(11)));
    data
}

mod test_s3_reader;
mod test_transport;
