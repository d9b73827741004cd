//! Object storage client: signed PUT/DELETE of images
//!
//! Every call walks the same path: configuration check, signing,
//! transmission, then a terminal success or failure. Nothing is retried and
//! no state survives between calls apart from the configuration handle and
//! the transport's connection pool.

use crate::config::{FolderConfig, R2Config, SharedConfig};
use crate::s3::error::{Result, StorageError};
use crate::s3::keys::KeyCodec;
use crate::s3::signer::{self, S3SignerV4, EMPTY_SHA256};
use crate::s3::transport::{HyperTransport, Transport};
use crate::s3::types::{ObjectKey, PendingUpload, SignedRequest, DEFAULT_CONTENT_TYPE};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::Method;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to the previous object during an update
#[derive(Debug)]
pub enum Cleanup {
    /// No previous URL was given
    Skipped,
    /// The previous object was removed
    Deleted,
    /// Removing the previous object failed; the update still succeeded
    Failed(StorageError),
}

/// Result of [`ObjectStorageClient::update_detailed`]
#[derive(Debug)]
pub struct UpdateReport {
    pub url: String,
    pub cleanup: Cleanup,
}

/// Client for one bucket on an S3-compatible store
///
/// Clone is cheap; clones share the configuration handle and the transport.
#[derive(Clone)]
pub struct ObjectStorageClient<T = HyperTransport> {
    config: SharedConfig,
    folders: FolderConfig,
    transport: T,
}

impl ObjectStorageClient<HyperTransport> {
    /// Create a client backed by the pooled hyper transport
    pub fn new(config: impl Into<SharedConfig>) -> Result<Self> {
        Ok(Self::with_transport(config, HyperTransport::new()?))
    }
}

impl<T: Transport> ObjectStorageClient<T> {
    pub fn with_transport(config: impl Into<SharedConfig>, transport: T) -> Self {
        Self {
            config: config.into(),
            folders: FolderConfig::default(),
            transport,
        }
    }

    /// Override the logical folder names
    pub fn with_folders(mut self, folders: FolderConfig) -> Self {
        self.folders = folders;
        self
    }

    pub fn folders(&self) -> &FolderConfig {
        &self.folders
    }

    pub fn shared_config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Fresh snapshot of the configuration, or a configuration error
    fn configured(&self) -> Result<Arc<R2Config>> {
        let config = self.config.snapshot();
        let missing = config.missing_fields();
        if !missing.is_empty() {
            warn!(missing = ?missing, "object storage not configured");
            return Err(StorageError::Configuration(format!(
                "missing {}",
                missing.join(", ")
            )));
        }
        if config.endpoint_host().is_none() {
            return Err(StorageError::Configuration(format!(
                "invalid endpoint: {}",
                config.endpoint
            )));
        }
        if !config.endpoint_is_origin() {
            warn!(endpoint = %config.endpoint, "endpoint carries a path");
            return Err(StorageError::Configuration(format!(
                "endpoint must not carry a path: {}",
                config.endpoint
            )));
        }
        Ok(config)
    }

    /// Public URL for a key under the current configuration
    pub fn public_url(&self, key: &ObjectKey) -> Result<String> {
        let config = self.configured()?;
        Ok(KeyCodec::new(&config).public_url(key))
    }

    /// Object key a URL refers to, if it belongs to this bucket
    pub fn key_for_url(&self, url: &str) -> Option<ObjectKey> {
        KeyCodec::new(&self.config.snapshot()).key_for(url)
    }

    /// Upload `data` under a fresh key in `folder` and return its public URL
    pub async fn upload(&self, data: Bytes, content_type: &str, folder: &str) -> Result<String> {
        let config = self.configured()?;
        let pending = PendingUpload::new(data, content_type, folder);
        let key = pending.target.clone();

        let request = build_put(&config, pending, &Utc::now());
        debug!(key = %key, size = request.body.len(), "uploading object");

        let response = self.transport.send(request).await?;
        if !response.status.is_success() {
            let body = response.body_text();
            warn!(key = %key, status = %response.status, body = %body, "upload rejected");
            return Err(StorageError::Upload {
                status: response.status,
                body,
            });
        }

        let url = KeyCodec::new(&config).public_url(&key);
        info!(key = %key, url = %url, "upload complete");
        Ok(url)
    }

    /// Delete the object a public URL points at
    pub async fn delete(&self, public_url: &str) -> Result<()> {
        let config = self.configured()?;
        let key = KeyCodec::new(&config)
            .key_for(public_url)
            .ok_or_else(|| StorageError::InvalidUrl(public_url.to_string()))?;

        let request = build_delete(&config, &key, &Utc::now());
        debug!(key = %key, "deleting object");

        let response = self.transport.send(request).await?;
        if !response.status.is_success() {
            let body = response.body_text();
            warn!(key = %key, status = %response.status, body = %body, "delete rejected");
            return Err(StorageError::Delete {
                status: response.status,
                body,
            });
        }

        info!(key = %key, "delete complete");
        Ok(())
    }

    /// Upload the replacement, then remove the old object best-effort
    pub async fn update(
        &self,
        old_url: Option<&str>,
        data: Bytes,
        content_type: &str,
        folder: &str,
    ) -> Result<String> {
        self.update_detailed(old_url, data, content_type, folder)
            .await
            .map(|report| report.url)
    }

    /// Like [`update`](Self::update) but reports what happened to the old object.
    ///
    /// A failed upload is returned as-is and the old object is left alone.
    /// A failed delete never turns the update into a failure.
    pub async fn update_detailed(
        &self,
        old_url: Option<&str>,
        data: Bytes,
        content_type: &str,
        folder: &str,
    ) -> Result<UpdateReport> {
        let url = self.upload(data, content_type, folder).await?;

        let cleanup = match old_url.map(str::trim).filter(|u| !u.is_empty()) {
            None => Cleanup::Skipped,
            Some(old) => match self.delete(old).await {
                Ok(()) => Cleanup::Deleted,
                Err(e) => {
                    warn!(old_url = %old, error = %e, "failed to remove previous object (ignored)");
                    Cleanup::Failed(e)
                }
            },
        };

        Ok(UpdateReport { url, cleanup })
    }

    /// Read a local file and upload it; the content type comes from its extension
    pub async fn upload_file(&self, path: &Path, folder: &str) -> Result<String> {
        let (data, content_type) = read_source(path).await?;
        self.upload(data, &content_type, folder).await
    }

    /// Read a local file and use it to replace the object at `old_url`
    pub async fn update_file(
        &self,
        old_url: Option<&str>,
        path: &Path,
        folder: &str,
    ) -> Result<UpdateReport> {
        let (data, content_type) = read_source(path).await?;
        self.update_detailed(old_url, data, &content_type, folder)
            .await
    }

    pub async fn upload_portfolio_image(&self, data: Bytes, content_type: &str) -> Result<String> {
        self.upload(data, content_type, &self.folders.portfolio).await
    }

    pub async fn upload_technology_icon(&self, data: Bytes, content_type: &str) -> Result<String> {
        self.upload(data, content_type, &self.folders.technology)
            .await
    }
}

async fn read_source(path: &Path) -> Result<(Bytes, String)> {
    let content_type = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| StorageError::SourceRead {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((Bytes::from(data), content_type))
}

/// `/{bucket}/{key}`, percent-encoded with `/` preserved
fn canonical_uri(config: &R2Config, key: &ObjectKey) -> String {
    format!(
        "/{}/{}",
        signer::uri_encode(config.bucket.trim(), true),
        signer::uri_encode(key.as_str(), false)
    )
}

fn signer_for(config: &R2Config) -> S3SignerV4 {
    S3SignerV4::new(
        config.access_key_id.trim(),
        config.secret_access_key.trim(),
        config.region(),
    )
}

/// Signed PUT carrying the upload body.
///
/// Signs `content-type;host;x-amz-content-sha256;x-amz-date`.
pub fn build_put(config: &R2Config, upload: PendingUpload, now: &DateTime<Utc>) -> SignedRequest {
    let payload_hash = signer::sha256_hex(&upload.source);
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), upload.content_type);
    sign_request(
        config,
        Method::PUT,
        &upload.target,
        headers,
        payload_hash,
        upload.source,
        now,
    )
}

/// Signed bodiless DELETE.
///
/// Signs `host;x-amz-content-sha256;x-amz-date`.
pub fn build_delete(config: &R2Config, key: &ObjectKey, now: &DateTime<Utc>) -> SignedRequest {
    sign_request(
        config,
        Method::DELETE,
        key,
        BTreeMap::new(),
        EMPTY_SHA256.to_string(),
        Bytes::new(),
        now,
    )
}

fn sign_request(
    config: &R2Config,
    method: Method,
    key: &ObjectKey,
    mut headers: BTreeMap<String, String>,
    payload_hash: String,
    body: Bytes,
    now: &DateTime<Utc>,
) -> SignedRequest {
    let canonical_uri = canonical_uri(config, key);
    let url = format!("{}{}", config.endpoint_base(), canonical_uri);

    headers.insert(
        "host".to_string(),
        config.endpoint_host().unwrap_or_default(),
    );
    headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
    headers.insert("x-amz-date".to_string(), signer::amz_date(now));

    let signature =
        signer_for(config).sign(method.as_str(), &canonical_uri, &headers, &payload_hash, now);
    headers.insert("authorization".to_string(), signature.authorization);

    SignedRequest {
        method,
        url,
        canonical_uri,
        headers,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::types::RawResponse;
    use chrono::TimeZone;
    use hyper::StatusCode;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Records requests and answers PUT/DELETE with fixed outcomes
    #[derive(Clone)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<SignedRequest>>>,
        put_status: StatusCode,
        delete_status: StatusCode,
        fail_transport: bool,
    }

    impl RecordingTransport {
        fn accepting() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                put_status: StatusCode::OK,
                delete_status: StatusCode::NO_CONTENT,
                fail_transport: false,
            }
        }

        fn methods(&self) -> Vec<Method> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.method.clone())
                .collect()
        }

        fn requests(&self) -> Vec<SignedRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        async fn send(&self, request: SignedRequest) -> Result<RawResponse> {
            let method = request.method.clone();
            self.sent.lock().unwrap().push(request);
            if self.fail_transport {
                return Err(StorageError::Transport("connection reset".to_string()));
            }
            let status = if method == Method::PUT {
                self.put_status
            } else {
                self.delete_status
            };
            Ok(RawResponse::new(status, "<Error>denied</Error>"))
        }
    }

    fn config() -> R2Config {
        R2Config {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY".to_string(),
            region: "auto".to_string(),
            endpoint: "https://acct.r2.cloudflarestorage.com".to_string(),
            bucket: "kahasolusi".to_string(),
            public_url_base: "https://pub-123.r2.dev".to_string(),
        }
    }

    fn client(transport: RecordingTransport) -> ObjectStorageClient<RecordingTransport> {
        ObjectStorageClient::with_transport(config(), transport)
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_put_signs_exact_header_set() {
        let key = ObjectKey::encode(
            "portfolio",
            &Uuid::parse_str("0f8fad5b-d9cb-469f-a165-70867728950e").unwrap(),
            "png",
        );
        let upload = PendingUpload {
            source: Bytes::from_static(b"png bytes"),
            content_type: "image/png".to_string(),
            target: key,
        };
        let request = build_put(&config(), upload, &fixed_time());

        assert_eq!(request.method, Method::PUT);
        assert_eq!(
            request.url,
            "https://acct.r2.cloudflarestorage.com/kahasolusi/portfolio/0f8fad5b-d9cb-469f-a165-70867728950e.png"
        );
        assert_eq!(request.header("x-amz-date"), Some("20250601T080000Z"));
        assert_eq!(
            request.header("x-amz-content-sha256"),
            Some(signer::sha256_hex(b"png bytes").as_str())
        );
        let auth = request.header("authorization").unwrap();
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20250601/auto/s3/aws4_request, "
        ));
        assert!(auth.contains("SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date,"));
    }

    #[test]
    fn test_put_signature_is_deterministic() {
        let key = ObjectKey::encode("portfolio", &Uuid::nil(), "jpg");
        let make = || PendingUpload {
            source: Bytes::from_static(b"same"),
            content_type: "image/jpeg".to_string(),
            target: key.clone(),
        };
        let a = build_put(&config(), make(), &fixed_time());
        let b = build_put(&config(), make(), &fixed_time());
        assert_eq!(a.header("authorization"), b.header("authorization"));
    }

    #[test]
    fn test_delete_signs_without_content_type() {
        let key = ObjectKey::encode("technology", &Uuid::nil(), "webp");
        let request = build_delete(&config(), &key, &fixed_time());

        assert_eq!(request.method, Method::DELETE);
        assert!(request.body.is_empty());
        assert_eq!(request.header("content-type"), None);
        assert_eq!(request.header("x-amz-content-sha256"), Some(EMPTY_SHA256));
        assert!(request
            .header("authorization")
            .unwrap()
            .contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date,"));
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let transport = RecordingTransport::accepting();
        let client = client(transport.clone());

        let url = client
            .upload(Bytes::from(vec![7u8; 1024]), "image/png", "portfolio")
            .await
            .unwrap();

        let suffix = url.strip_prefix("https://pub-123.r2.dev/portfolio/").unwrap();
        let stem = suffix.strip_suffix(".png").unwrap();
        assert!(Uuid::parse_str(stem).is_ok());
        assert_eq!(transport.methods(), vec![Method::PUT]);

        // The URL inverts to the key that was written
        let sent = &transport.requests()[0];
        let key = client.key_for_url(&url).unwrap();
        assert_eq!(sent.canonical_uri, format!("/kahasolusi/{}", key));
    }

    #[tokio::test]
    async fn test_unconfigured_short_circuits() {
        let transport = RecordingTransport::accepting();
        let mut cfg = config();
        cfg.bucket.clear();
        let client = ObjectStorageClient::with_transport(cfg, transport.clone());

        assert!(!client.is_configured());
        let err = client
            .upload(Bytes::from_static(b"x"), "image/png", "portfolio")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));

        let err = client.delete("https://pub-123.r2.dev/portfolio/x.png").await.unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));

        let err = client
            .update(Some("https://pub-123.r2.dev/portfolio/x.png"), Bytes::new(), "", "p")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));

        assert!(transport.methods().is_empty());
    }

    #[tokio::test]
    async fn test_configuration_checked_on_each_call() {
        let transport = RecordingTransport::accepting();
        let shared = SharedConfig::new(R2Config::default());
        let client = ObjectStorageClient::with_transport(shared.clone(), transport.clone());

        assert!(client
            .upload(Bytes::from_static(b"x"), "image/gif", "portfolio")
            .await
            .is_err());

        shared.replace(config());
        let url = client
            .upload(Bytes::from_static(b"x"), "image/gif", "portfolio")
            .await
            .unwrap();
        assert!(url.ends_with(".gif"));
        assert_eq!(transport.methods(), vec![Method::PUT]);
    }

    #[tokio::test]
    async fn test_endpoint_with_path_makes_no_request() {
        let transport = RecordingTransport::accepting();
        let mut cfg = config();
        cfg.endpoint = "https://acct.r2.cloudflarestorage.com/prefix".to_string();
        let client = ObjectStorageClient::with_transport(cfg, transport.clone());

        let err = client
            .upload(Bytes::from_static(b"x"), "image/png", "portfolio")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(ref m) if m.contains("path")));

        let err = client
            .delete("https://pub-123.r2.dev/portfolio/x.png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
        assert!(transport.methods().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejected_carries_status_and_body() {
        let mut transport = RecordingTransport::accepting();
        transport.put_status = StatusCode::FORBIDDEN;
        let client = client(transport);

        let err = client
            .upload(Bytes::from_static(b"x"), "image/png", "portfolio")
            .await
            .unwrap_err();
        match err {
            StorageError::Upload { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "<Error>denied</Error>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let mut transport = RecordingTransport::accepting();
        transport.fail_transport = true;
        let client = client(transport.clone());

        let err = client
            .upload(Bytes::from_static(b"x"), "image/png", "portfolio")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Transport(_)));
        // One attempt only
        assert_eq!(transport.methods().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_foreign_url_makes_no_request() {
        let transport = RecordingTransport::accepting();
        let client = client(transport.clone());

        let err = client
            .delete("https://elsewhere.example.com/portfolio/x.png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl(_)));
        assert!(transport.methods().is_empty());
    }

    #[tokio::test]
    async fn test_delete_issues_signed_delete_for_both_url_styles() {
        let transport = RecordingTransport::accepting();
        let client = client(transport.clone());

        client
            .delete("https://pub-123.r2.dev/portfolio/a.jpg")
            .await
            .unwrap();
        client
            .delete("https://acct.r2.cloudflarestorage.com/kahasolusi/portfolio/b.jpg")
            .await
            .unwrap();

        let uris: Vec<String> = transport
            .requests()
            .into_iter()
            .map(|r| r.canonical_uri)
            .collect();
        assert_eq!(
            uris,
            vec!["/kahasolusi/portfolio/a.jpg", "/kahasolusi/portfolio/b.jpg"]
        );
    }

    #[tokio::test]
    async fn test_delete_rejected() {
        let mut transport = RecordingTransport::accepting();
        transport.delete_status = StatusCode::NOT_FOUND;
        let client = client(transport);

        let err = client
            .delete("https://pub-123.r2.dev/portfolio/a.jpg")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(matches!(err, StorageError::Delete { .. }));
    }

    #[tokio::test]
    async fn test_update_without_old_url_never_deletes() {
        let transport = RecordingTransport::accepting();
        let client = client(transport.clone());

        let report = client
            .update_detailed(None, Bytes::from_static(b"x"), "image/png", "portfolio")
            .await
            .unwrap();
        assert!(matches!(report.cleanup, Cleanup::Skipped));

        client
            .update(Some("  "), Bytes::from_static(b"x"), "image/png", "portfolio")
            .await
            .unwrap();
        assert_eq!(transport.methods(), vec![Method::PUT, Method::PUT]);
    }

    #[tokio::test]
    async fn test_update_failed_upload_skips_delete() {
        let mut transport = RecordingTransport::accepting();
        transport.put_status = StatusCode::INTERNAL_SERVER_ERROR;
        let client = client(transport.clone());

        let err = client
            .update(
                Some("https://pub-123.r2.dev/portfolio/old.jpg"),
                Bytes::from_static(b"x"),
                "image/png",
                "portfolio",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Upload { .. }));
        assert_eq!(transport.methods(), vec![Method::PUT]);
    }

    #[tokio::test]
    async fn test_update_swallows_delete_failure() {
        let mut transport = RecordingTransport::accepting();
        transport.delete_status = StatusCode::FORBIDDEN;
        let client = client(transport.clone());

        let report = client
            .update_detailed(
                Some("https://pub-123.r2.dev/portfolio/old.jpg"),
                Bytes::from_static(b"x"),
                "image/webp",
                "portfolio",
            )
            .await
            .unwrap();

        assert!(report.url.ends_with(".webp"));
        assert!(matches!(
            report.cleanup,
            Cleanup::Failed(StorageError::Delete { .. })
        ));
        assert_eq!(transport.methods(), vec![Method::PUT, Method::DELETE]);
    }

    #[tokio::test]
    async fn test_update_with_foreign_old_url_still_succeeds() {
        let transport = RecordingTransport::accepting();
        let client = client(transport.clone());

        let report = client
            .update_detailed(
                Some("https://firebasestorage.googleapis.com/v0/b/x/o/old.jpg"),
                Bytes::from_static(b"x"),
                "image/jpeg",
                "technology",
            )
            .await
            .unwrap();
        assert!(matches!(
            report.cleanup,
            Cleanup::Failed(StorageError::InvalidUrl(_))
        ));
        assert_eq!(transport.methods(), vec![Method::PUT]);
    }

    #[tokio::test]
    async fn test_update_deletes_old_object() {
        let transport = RecordingTransport::accepting();
        let client = client(transport.clone());

        let report = client
            .update_detailed(
                Some("https://pub-123.r2.dev/portfolio/old.jpg"),
                Bytes::from_static(b"x"),
                "image/jpeg",
                "portfolio",
            )
            .await
            .unwrap();
        assert!(matches!(report.cleanup, Cleanup::Deleted));
        assert_eq!(
            transport.requests()[1].canonical_uri,
            "/kahasolusi/portfolio/old.jpg"
        );
    }

    #[tokio::test]
    async fn test_folder_shortcuts() {
        let transport = RecordingTransport::accepting();
        let client = client(transport).with_folders(FolderConfig {
            portfolio: "works".to_string(),
            technology: "icons".to_string(),
        });

        let url = client
            .upload_portfolio_image(Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap();
        assert!(url.starts_with("https://pub-123.r2.dev/works/"));

        let url = client
            .upload_technology_icon(Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap();
        assert!(url.starts_with("https://pub-123.r2.dev/icons/"));
    }

    #[tokio::test]
    async fn test_upload_file_guesses_content_type() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logo.webp");
        std::fs::write(&path, b"RIFF....WEBP").unwrap();

        let transport = RecordingTransport::accepting();
        let client = client(transport.clone());
        let url = client.upload_file(&path, "technology").await.unwrap();

        assert!(url.ends_with(".webp"));
        assert_eq!(
            transport.requests()[0].header("content-type"),
            Some("image/webp")
        );
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let transport = RecordingTransport::accepting();
        let client = client(transport.clone());

        let err = client
            .upload_file(Path::new("/nonexistent/image.png"), "portfolio")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SourceRead { .. }));
        assert!(transport.methods().is_empty());
    }
}
