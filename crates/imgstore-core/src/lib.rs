//! Core building blocks for imgstore storage readers.
//!
//! This crate defines the contract every storage backend implements and the
//! helpers that keep their HTTP semantics identical:
//!
//! - [`Object`] is the normalized fetch result (status, headers, body).
//! - [`StorageReader`] is the single `get_object` operation backends provide.
//! - [`range`] parses `Range` headers and resolves them against object sizes.
//! - [`conditional`] decides whether a `304 Not Modified` is warranted.
//! - [`policy`] evaluates per-backend bucket allow/deny lists.
//! - [`url`] decomposes opaque storage URLs into bucket, key, and query.
//!
//! # Architecture
//!
//! ```text
//! imgstore-transport (scheme registry)
//!        |
//!        v
//!   StorageReader (s3 / gcs / azure / swift / fs)
//!        |
//!        v
//!   Object { status, headers, body }
//! ```

pub mod conditional;
pub mod env;
pub mod error;
pub mod object;
pub mod policy;
pub mod range;
pub mod reader;
#[cfg(feature = "testsuite")]
pub mod testsuite;
pub mod url;
pub mod utils;

pub use error::{ConfigError, StorageError, StorageResult};
pub use object::{Object, ObjectBody};
pub use policy::BucketPolicy;
pub use reader::StorageReader;
pub use url::ObjectLocation;
