//! r2media - SigV4-signed image storage on Cloudflare R2

pub mod catalog;
pub mod config;
pub mod s3;

pub use config::{Config, R2Config, SharedConfig};
pub use s3::{ObjectStorageClient, StorageError};
