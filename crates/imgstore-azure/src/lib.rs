//! Azure Blob Storage reader for imgstore.
//!
//! [`AzureStorage`] reads blobs through `azure_storage_blobs`. Requests are
//! signed with the account's shared key when one is configured; otherwise
//! they are authorized by `azure_identity`'s default credential chain, which
//! ends with the instance's managed identity.

pub mod config;
mod storage;

pub use config::AzureConfig;
pub use storage::AzureStorage;
