//! OpenStack Swift storage reader for imgstore.
//!
//! [`SwiftStorage`] authenticates against Keystone (v1, v2 or v3) when it is
//! created and reuses the session for every read, re-authenticating once
//! when the token is rejected. Conditional and range headers are forwarded
//! to the object server as-is.

mod auth;
pub mod config;
mod storage;

pub use config::SwiftConfig;
pub use storage::SwiftStorage;
