//! Google Cloud Storage reader for imgstore.
//!
//! [`GcsStorage`] reads object attributes first, answers conditional requests
//! from them, and only then opens a (possibly ranged) download stream.
//!
//! GCS ETags change format between full and ranged reads, so the reader
//! synthesizes its own from the object's CRC32C and update time.

pub mod config;
mod etag;
mod storage;

pub use config::GcsConfig;
pub use storage::GcsStorage;
