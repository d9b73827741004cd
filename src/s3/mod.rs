//! S3-compatible object storage with AWS SigV4 signing
//!
//! This module provides:
//! - AWS Signature Version 4 signing for PUT/DELETE requests
//! - Key generation and public URL <-> key mapping
//! - A pooled HTTP transport behind a small trait
//! - The image storage client (upload, update, delete)

pub mod client;
pub mod error;
pub mod keys;
pub mod signer;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{Cleanup, ObjectStorageClient, UpdateReport};
pub use error::{Result, StorageError};
pub use keys::{key_to_url, url_to_key, KeyCodec};
pub use signer::S3SignerV4;
pub use transport::{HyperTransport, Transport};
pub use types::{ObjectKey, PendingUpload, RawResponse, SignedRequest};
