//! Local filesystem storage reader for imgstore.
//!
//! Serves `local:///path/to/file` URLs from a configured root directory. Keys
//! are cleaned before being joined to the root, so `..` segments can never
//! escape it.
//!
//! Content types are sniffed from the file's first bytes with an extension
//! fallback, and validators are synthesized from the file metadata.

pub mod config;
mod sniff;
mod storage;

pub use config::FsConfig;
pub use storage::FsStorage;
