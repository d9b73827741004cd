//! Value types flowing through a single storage call

use bytes::Bytes;
use hyper::{Method, StatusCode};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Content type used when the caller gives none
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Map an image content type to the file extension used in object keys.
///
/// Unknown or missing types fall back to `jpg`.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Path-like identifier of an object within the bucket: `{folder}/{uuid}.{ext}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Build a key from its parts; no validation beyond concatenation
    pub fn encode(folder: &str, id: &Uuid, extension: &str) -> Self {
        Self(format!("{}/{}.{}", folder, id, extension))
    }

    /// Fresh collision-resistant key for an upload into `folder`
    pub fn generate(folder: &str, content_type: &str) -> Self {
        Self::encode(folder, &Uuid::new_v4(), extension_for(content_type))
    }

    /// Wrap a key recovered from a URL
    pub(crate) fn from_raw(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Folder segment (everything before the last `/`), if any
    pub fn folder(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(folder, _)| folder)
    }

    /// File name segment (everything after the last `/`)
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Bytes waiting to be written under a fresh key. Lives for one upload call.
#[derive(Debug)]
pub struct PendingUpload {
    pub source: Bytes,
    pub content_type: String,
    pub target: ObjectKey,
}

impl PendingUpload {
    pub fn new(source: Bytes, content_type: &str, folder: &str) -> Self {
        let content_type = if content_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            content_type.trim().to_string()
        };
        let target = ObjectKey::generate(folder, &content_type);
        Self {
            source,
            content_type,
            target,
        }
    }
}

/// A fully signed request, built fresh for each call and never reused
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    pub url: String,
    pub canonical_uri: String,
    /// Outgoing headers, including `authorization`
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl SignedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a store response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}
