//! Mapping between object keys and public URLs
//!
//! Two URL styles point at the same object:
//! - public/CDN style, bucket implied by the domain:
//!   `https://pub-xxx.r2.dev/portfolio/<uuid>.jpg`
//! - API endpoint style, bucket echoed in the path:
//!   `https://<account>.r2.cloudflarestorage.com/<bucket>/portfolio/<uuid>.jpg`
//!
//! Both are accepted when parsing. URLs on any other host are foreign.

use crate::config::R2Config;
use crate::s3::signer::uri_encode;
use crate::s3::types::ObjectKey;
use url::Url;

/// Public URL for a key: `{base}/{key}` with the key percent-encoded
pub fn key_to_url(public_url_base: &str, key: &ObjectKey) -> String {
    let base = public_url_base.trim().trim_end_matches('/');
    format!("{}/{}", base, uri_encode(key.as_str(), false))
}

/// Recover the object key from a URL's path.
///
/// Strips the leading slash and then a leading `{bucket}/` segment if
/// present and a folder segment is left after it; otherwise the path is the
/// key. Returns `None` for anything that does not parse or has an empty path.
/// Host ownership is not checked here, see [`KeyCodec`] for that.
pub fn url_to_key(url: &str, bucket: &str) -> Option<ObjectKey> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    key_from_path(parsed.path(), "", bucket, false)
}

/// Keys always carry a folder, so an optional bucket segment is only taken
/// off when a folder segment remains behind it. A required bucket segment
/// must be present.
fn key_from_path(
    path: &str,
    base_path: &str,
    bucket: &str,
    bucket_required: bool,
) -> Option<ObjectKey> {
    let decoded = urlencoding::decode(path).ok()?;
    let mut rest = decoded.trim_start_matches('/');

    let base_path = base_path.trim_matches('/');
    if !base_path.is_empty() {
        rest = rest.strip_prefix(base_path)?.strip_prefix('/')?;
    }

    let stripped = match bucket {
        "" => None,
        bucket => rest.strip_prefix(bucket).and_then(|r| r.strip_prefix('/')),
    };
    match stripped {
        Some(stripped) if bucket_required || stripped.contains('/') => rest = stripped,
        _ if bucket_required => return None,
        _ => {}
    }

    if rest.is_empty() || rest.ends_with('/') {
        return None;
    }
    Some(ObjectKey::from_raw(rest.to_string()))
}

/// Host-aware codec built from the current configuration
#[derive(Debug, Clone)]
pub struct KeyCodec {
    bucket: String,
    public_base: String,
    public_host: Option<String>,
    public_path: String,
    endpoint_host: Option<String>,
}

impl KeyCodec {
    pub fn new(config: &R2Config) -> Self {
        let public = config.public_base_url();
        Self {
            bucket: config.bucket.trim().to_string(),
            public_base: config.public_base().to_string(),
            public_host: public.as_ref().and_then(host_with_port),
            public_path: public
                .as_ref()
                .map(|u| u.path().trim_matches('/').to_string())
                .unwrap_or_default(),
            endpoint_host: config.endpoint_url().as_ref().and_then(host_with_port),
        }
    }

    pub fn public_url(&self, key: &ObjectKey) -> String {
        key_to_url(&self.public_base, key)
    }

    /// Key for a URL on the public host or the API endpoint host
    pub fn key_for(&self, url: &str) -> Option<ObjectKey> {
        let parsed = Url::parse(url.trim()).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        let host = host_with_port(&parsed)?;

        if self.public_host.as_deref() == Some(host.as_str()) {
            let key = key_from_path(parsed.path(), &self.public_path, &self.bucket, false);
            if key.is_some() {
                return key;
            }
        }
        if self.endpoint_host.as_deref() == Some(host.as_str()) {
            // Endpoint URLs must name the bucket
            return key_from_path(parsed.path(), "", &self.bucket, true);
        }
        None
    }
}

fn host_with_port(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
