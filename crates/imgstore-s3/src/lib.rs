//! Amazon S3 storage reader for imgstore.
//!
//! [`S3Storage`] reads objects through `aws-sdk-s3` using the ambient AWS
//! credential chain, optionally behind an assumed role. Buckets living in a
//! region other than the configured one are discovered from `301` redirects
//! and served by a region-pinned client from then on.
//!
//! With `decryption_client_enabled`, objects written by the S3 encryption
//! client (v2 envelope, KMS-wrapped key) are transparently decrypted.

pub mod config;
mod client;
mod decrypt;
mod error;
mod storage;

pub use config::S3Config;
pub use storage::S3Storage;
