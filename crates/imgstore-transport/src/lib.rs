//! Source URL routing for imgstore.
//!
//! [`Transport`] maps a source URL scheme to the [`StorageReader`] that
//! serves it and renders the resulting [`Object`] as an
//! [`http::Response`]:
//!
//! | Scheme | Reader |
//! |--------|--------|
//! | `local` | [`imgstore_fs::FsStorage`] |
//! | `s3` | [`imgstore_s3::S3Storage`] |
//! | `gs` | [`imgstore_gcs::GcsStorage`] |
//! | `abs` | [`imgstore_azure::AzureStorage`] |
//! | `swift` | [`imgstore_swift::SwiftStorage`] |
//! | `http`, `https` | [`HttpPassthrough`] |
//!
//! [`StorageReader`]: imgstore_core::StorageReader
//! [`Object`]: imgstore_core::Object

pub mod config;
pub mod error;
mod passthrough;
mod transport;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use passthrough::HttpPassthrough;
pub use transport::Transport;
