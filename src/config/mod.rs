use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use url::Url;

/// Cloudflare R2 credentials and addressing
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct R2Config {
    /// Access key ID
    #[serde(default)]
    pub access_key_id: String,

    /// Secret access key
    #[serde(default)]
    pub secret_access_key: String,

    /// Signing region (R2 uses "auto")
    #[serde(default = "default_region")]
    pub region: String,

    /// S3 API endpoint, e.g. https://<account>.r2.cloudflarestorage.com
    #[serde(default)]
    pub endpoint: String,

    /// Bucket name
    #[serde(default)]
    pub bucket: String,

    /// Base of the public URLs handed back to callers
    #[serde(default)]
    pub public_url_base: String,
}

fn default_region() -> String {
    "auto".to_string()
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Config")
            .field("access_key_id", &mask(&self.access_key_id))
            .field("secret_access_key", &"***")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("public_url_base", &self.public_url_base)
            .finish()
    }
}

/// Keep the first four characters of a credential for display
pub fn mask(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let prefix: String = value.chars().take(4).collect();
    format!("{}***", prefix)
}

/// Values shipped in templates that must not count as real configuration
fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    let lower = v.to_ascii_lowercase();
    v.is_empty()
        || lower.starts_with("your_")
        || lower.starts_with("your-")
        || (v.starts_with('<') && v.ends_with('>'))
}

impl R2Config {
    /// Names of the required fields that are empty or placeholders
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("access_key_id", &self.access_key_id),
            ("secret_access_key", &self.secret_access_key),
            ("endpoint", &self.endpoint),
            ("bucket", &self.bucket),
            ("public_url_base", &self.public_url_base),
        ]
        .into_iter()
        .filter(|(_, value)| is_placeholder(value))
        .map(|(name, _)| name)
        .collect()
    }

    /// True only when all five required fields carry real values
    pub fn is_configured(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn region(&self) -> &str {
        let region = self.region.trim();
        if region.is_empty() {
            "auto"
        } else {
            region
        }
    }

    /// Endpoint as a URL; a bare host is taken to mean https
    pub fn endpoint_url(&self) -> Option<Url> {
        parse_base(&self.endpoint)
    }

    /// Public URL base as a URL
    pub fn public_base_url(&self) -> Option<Url> {
        parse_base(&self.public_url_base)
    }

    /// Host header value for the endpoint: host plus any non-default port
    pub fn endpoint_host(&self) -> Option<String> {
        let url = self.endpoint_url()?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    /// Whether the endpoint is a bare origin; requests are signed for
    /// `/{bucket}/{key}`, so a path on the endpoint would break signatures
    pub fn endpoint_is_origin(&self) -> bool {
        self.endpoint_url()
            .map(|url| url.path() == "/" && url.query().is_none())
            .unwrap_or(false)
    }

    /// Endpoint without trailing slash
    pub fn endpoint_base(&self) -> String {
        let trimmed = self.endpoint.trim().trim_end_matches('/');
        if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        }
    }

    /// Public URL base without trailing slash
    pub fn public_base(&self) -> &str {
        self.public_url_base.trim().trim_end_matches('/')
    }
}

fn parse_base(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = if raw.contains("://") {
        Url::parse(raw).ok()?
    } else {
        Url::parse(&format!("https://{}", raw)).ok()?
    };
    url.host_str()?;
    Some(url)
}

/// Logical folders objects are grouped under
///
/// A nested folder whose first segment is the bucket name (`{bucket}/sub`)
/// cannot be told apart from a bucket-echoing URL on the public host, and
/// its URLs parse back without that segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    #[serde(default = "default_portfolio_folder")]
    pub portfolio: String,

    #[serde(default = "default_technology_folder")]
    pub technology: String,
}

fn default_portfolio_folder() -> String {
    "portfolio".to_string()
}

fn default_technology_folder() -> String {
    "technology".to_string()
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            portfolio: default_portfolio_folder(),
            technology: default_technology_folder(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Named credential sets
    #[serde(default)]
    pub profiles: HashMap<String, R2Config>,

    /// Profile used when none is named
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    #[serde(default)]
    pub folders: FolderConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a profile by name, or the default profile if not specified
    pub fn get_profile(&self, name: Option<&str>) -> Option<&R2Config> {
        if let Some(name) = name {
            self.profiles.get(name)
        } else if let Some(default) = &self.default_profile {
            self.profiles.get(default)
        } else {
            self.profiles.values().next()
        }
    }

    /// The profile the client should run with; unconfigured if there is none
    pub fn active_profile(&self) -> R2Config {
        self.get_profile(None).cloned().unwrap_or_default()
    }
}

/// Handle to the current credentials.
///
/// Clones share the same slot. Readers take a snapshot per call, so secrets
/// injected after startup are picked up by the next operation.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<R2Config>>>,
}

impl SharedConfig {
    pub fn new(config: R2Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn snapshot(&self) -> Arc<R2Config> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, config: R2Config) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(config);
    }

    pub fn is_configured(&self) -> bool {
        self.snapshot().is_configured()
    }
}

impl From<R2Config> for SharedConfig {
    fn from(config: R2Config) -> Self {
        Self::new(config)
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(config)
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// Load configuration from environment variables
///
/// - R2_ACCESS_KEY_ID / AWS_ACCESS_KEY_ID
/// - R2_SECRET_ACCESS_KEY / AWS_SECRET_ACCESS_KEY
/// - R2_REGION / AWS_REGION (optional, defaults to auto)
/// - R2_ENDPOINT
/// - R2_BUCKET
/// - R2_PUBLIC_URL
/// - R2_PORTFOLIO_FOLDER, R2_TECHNOLOGY_FOLDER (optional)
///
/// Missing credentials are not an error here: the resulting profile is
/// simply unconfigured and every storage call reports that.
pub fn load_from_env() -> Result<Config> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let profile = R2Config {
        access_key_id: env_first(&["R2_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"]).unwrap_or_default(),
        secret_access_key: env_first(&["R2_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY"])
            .unwrap_or_default(),
        region: env_first(&["R2_REGION", "AWS_REGION"]).unwrap_or_else(default_region),
        endpoint: env_first(&["R2_ENDPOINT"]).unwrap_or_default(),
        bucket: env_first(&["R2_BUCKET"]).unwrap_or_default(),
        public_url_base: env_first(&["R2_PUBLIC_URL"]).unwrap_or_default(),
    };

    let mut config = Config::new();
    config.profiles.insert("default".to_string(), profile);
    config.default_profile = Some("default".to_string());

    if let Some(folder) = env_first(&["R2_PORTFOLIO_FOLDER"]) {
        config.folders.portfolio = folder;
    }
    if let Some(folder) = env_first(&["R2_TECHNOLOGY_FOLDER"]) {
        config.folders.technology = folder;
    }

    Ok(config)
}

/// Load configuration from file or environment
///
/// # Arguments
/// * `config_path` - Optional path to YAML config file
/// * `profile_name` - Optional profile name to use (only relevant for YAML configs)
pub fn load_config(config_path: Option<&str>, profile_name: Option<&str>) -> Result<Config> {
    if let Some(path) = config_path {
        let mut config = load_from_yaml(path)?;

        if let Some(name) = profile_name {
            if !config.profiles.contains_key(name) {
                anyhow::bail!("Profile '{}' not found in config file", name);
            }
            config.default_profile = Some(name.to_string());
        }

        Ok(config)
    } else {
        load_from_env()
    }
}
