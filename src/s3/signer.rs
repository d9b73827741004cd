//! AWS Signature Version 4 signer for S3-compatible requests
//!
//! Signing is a pure function of its inputs: the caller supplies the
//! timestamp, so the same request signed twice at the same instant yields a
//! byte-identical `Authorization` header.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// Hex lookup table for percent encoding
static HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const REQUEST_TYPE: &str = "aws4_request";

/// SHA-256 of the empty byte string, the payload hash for bodiless requests
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Hex-encoded SHA-256 of a payload
pub fn sha256_hex(payload: &[u8]) -> String {
    if payload.is_empty() {
        return EMPTY_SHA256.to_string();
    }
    hex::encode(Sha256::digest(payload))
}

/// `yyyyMMdd'T'HHmmss'Z'` in UTC
pub fn amz_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y%m%dT%H%M%SZ").to_string()
}

/// `yyyyMMdd` in UTC, the date component of the credential scope
pub fn date_stamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d").to_string()
}

/// Everything produced while signing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub amz_date: String,
    pub credential_scope: String,
    pub canonical_request: String,
    pub string_to_sign: String,
    pub signed_headers: String,
    pub signature: String,
    pub authorization: String,
}

/// AWS Signature Version 4 signer
#[derive(Clone)]
pub struct S3SignerV4 {
    access_key: String,
    region: String,
    /// "AWS4" + secret key, the root of the HMAC chain
    aws4_key: Vec<u8>,
}

impl std::fmt::Debug for S3SignerV4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3SignerV4")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3SignerV4 {
    pub fn new(access_key: &str, secret_key: &str, region: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            region: region.to_string(),
            aws4_key: format!("AWS4{}", secret_key).into_bytes(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Sign a request.
    ///
    /// `headers` holds every header that takes part in the signature
    /// (names in any case). `canonical_uri` must already be percent-encoded.
    /// There is never a query string.
    pub fn sign(
        &self,
        method: &str,
        canonical_uri: &str,
        headers: &BTreeMap<String, String>,
        payload_hash: &str,
        timestamp: &DateTime<Utc>,
    ) -> Signature {
        let amz_date = amz_date(timestamp);
        let date_stamp = date_stamp(timestamp);

        // Re-key on lowercase names; BTreeMap keeps them sorted
        let canonical: BTreeMap<String, &str> = headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
            .collect();

        let canonical_headers = Self::create_canonical_headers(&canonical);
        let signed_headers = Self::create_signed_headers(&canonical);

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, canonical_uri, "", canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!(
            "{}/{}/{}/{}",
            date_stamp, self.region, SERVICE, REQUEST_TYPE
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            sha256_hex(canonical_request.as_bytes())
        );

        let signing_key = self.derive_signing_key(&date_stamp);
        let signature = hex::encode(Self::hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.access_key, credential_scope, signed_headers, signature
        );

        tracing::trace!(
            method,
            canonical_uri,
            %canonical_request,
            %string_to_sign,
            "sigv4"
        );

        Signature {
            amz_date,
            credential_scope,
            canonical_request,
            string_to_sign,
            signed_headers,
            signature,
            authorization,
        }
    }

    /// `name:value\n` per header, already lowercase and sorted
    fn create_canonical_headers(headers: &BTreeMap<String, &str>) -> String {
        let mut result = String::with_capacity(headers.len() * 64);
        for (k, v) in headers {
            result.push_str(k);
            result.push(':');
            result.push_str(v);
            result.push('\n');
        }
        result
    }

    fn create_signed_headers(headers: &BTreeMap<String, &str>) -> String {
        headers.keys().map(String::as_str).collect::<Vec<_>>().join(";")
    }

    /// kDate -> kRegion -> kService -> kSigning
    fn derive_signing_key(&self, date_stamp: &str) -> [u8; 32] {
        let k_date = Self::hmac_sha256(&self.aws4_key, date_stamp.as_bytes());
        let k_region = Self::hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = Self::hmac_sha256(&k_region, SERVICE.as_bytes());
        Self::hmac_sha256(&k_service, REQUEST_TYPE.as_bytes())
    }

    fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(msg);
        let result = mac.finalize().into_bytes();
        let mut output = [0u8; 32];
        output.copy_from_slice(&result);
        output
    }
}

/// Percent-encode a string per RFC 3986, optionally leaving `/` intact
pub fn uri_encode(s: &str, encode_slash: bool) -> String {
    let mut result = String::with_capacity(s.len() + 16);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            b'/' if !encode_slash => {
                result.push('/');
            }
            _ => {
                result.push('%');
                result.push(HEX_UPPER[(byte >> 4) as usize] as char);
                result.push(HEX_UPPER[(byte & 0xf) as usize] as char);
            }
        }
    }
    result
}
