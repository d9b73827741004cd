//! Typed failures for object storage operations

use hyper::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Object storage errors
///
/// `Configuration` and `InvalidUrl` are raised before any network activity.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object storage is not configured: {0}")]
    Configuration(String),

    #[error("URL does not point at an object in the configured bucket: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upload failed: {status} - {body}")]
    Upload { status: StatusCode, body: String },

    #[error("delete failed: {status} - {body}")]
    Delete { status: StatusCode, body: String },

    #[error("failed to read {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// HTTP status returned by the store, if the store answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            StorageError::Upload { status, .. } | StorageError::Delete { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// True when the failure happened before a request was sent
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            StorageError::Configuration(_)
                | StorageError::InvalidUrl(_)
                | StorageError::SourceRead { .. }
        )
    }
}

impl From<hyper::http::Error> for StorageError {
    fn from(err: hyper::http::Error) -> Self {
        StorageError::Transport(format!("request build error: {}", err))
    }
}

impl From<hyper_util::client::legacy::Error> for StorageError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        StorageError::Transport(format!("request failed: {}", err))
    }
}

impl From<hyper::Error> for StorageError {
    fn from(err: hyper::Error) -> Self {
        StorageError::Transport(format!("body error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
