//! HTTP transport for signed requests
//!
//! - HTTP/1.1 only
//! - Pooled connections shared by clones (safe for concurrent calls)
//! - TCP_NODELAY for low latency
//! - native-tls (OpenSSL) for TLS
//! - Exactly one attempt per request, no internal timeout

use crate::s3::error::{Result, StorageError};
use crate::s3::types::{RawResponse, SignedRequest};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::future::Future;
use std::time::Duration;

/// Sends a signed request and returns the store's answer.
///
/// Only connection-level failures are errors; any HTTP status is a response.
pub trait Transport: Send + Sync {
    fn send(&self, request: SignedRequest) -> impl Future<Output = Result<RawResponse>> + Send;
}

/// Hyper-based transport
///
/// Clone is cheap - the underlying HTTP client uses Arc internally.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new() -> Result<Self> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = TlsConnector::new()
            .map_err(|e| StorageError::Transport(format!("TLS setup failed: {}", e)))?;
        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .set_host(true)
            .build(https);

        Ok(Self { client })
    }
}

impl Transport for HyperTransport {
    async fn send(&self, request: SignedRequest) -> Result<RawResponse> {
        let mut req = Request::builder()
            .method(request.method)
            .uri(&request.url);
        for (key, value) in request.headers.iter() {
            req = req.header(key, value);
        }
        let req = req.body(Full::new(request.body))?;

        let response = self.client.request(req).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        Ok(RawResponse { status, body })
    }
}
