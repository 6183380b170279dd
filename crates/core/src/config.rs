//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Storage backend for the mirror.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage. Objects are served back by this server.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
        /// Externally reachable base URL of this server, used to build
        /// download URLs for mirrored archives.
        #[serde(default = "default_public_base_url")]
        public_base_url: String,
    },
    /// S3-compatible storage. Download URLs are presigned.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs. Required for MinIO and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
        /// Lifetime of presigned download URLs.
        #[serde(default = "default_presign_expiry_secs")]
        presign_expiry_secs: u64,
    },
}

fn default_public_base_url() -> String {
    format!("http://{}", default_bind())
}

fn default_presign_expiry_secs() -> u64 {
    900
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/mirror"),
            public_base_url: default_public_base_url(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem {
                public_base_url, ..
            } => {
                if public_base_url.trim().is_empty() {
                    return Err("filesystem storage requires a public_base_url".to_string());
                }
                Ok(())
            }
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                presign_expiry_secs,
                ..
            } => {
                if bucket.trim().is_empty() {
                    return Err("s3 config requires a bucket".to_string());
                }
                if *presign_expiry_secs == 0 {
                    return Err("s3 presign_expiry_secs must be greater than 0".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
        }
    }
}

/// Origin registry client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Deadline for a single call to the origin. Exceeding it counts as the
    /// origin being unreachable.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User-Agent sent to the origin.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Hostname to providers base URL, bypassing remote service discovery.
    #[serde(default)]
    pub discovery_overrides: BTreeMap<String, String>,
}

fn default_timeout_secs() -> u64 {
    crate::DEFAULT_UPSTREAM_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    concat!("depot/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            discovery_overrides: BTreeMap::new(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Background cache-fill configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CopierConfig {
    /// Jobs that may wait for a worker. Submissions beyond this are rejected.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of concurrent copy workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Drop a submission whose coordinate is already queued or running.
    #[serde(default)]
    pub deduplicate: bool,
    /// Deadline for each file a copy job downloads from the origin.
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
}

fn default_queue_capacity() -> usize {
    64
}

fn default_workers() -> usize {
    2
}

fn default_transfer_timeout_secs() -> u64 {
    300
}

impl Default for CopierConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            deduplicate: false,
            transfer_timeout_secs: default_transfer_timeout_secs(),
        }
    }
}

impl CopierConfig {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub copier: CopierConfig,
}

impl AppConfig {
    /// Create a test configuration rooted at `storage_path`.
    ///
    /// **For testing only.**
    pub fn for_testing(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig::Filesystem {
                path: storage_path.into(),
                public_base_url: "http://mirror.test".to_string(),
            },
            ..Self::default()
        }
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        if self.upstream.timeout_secs == 0 {
            return Err("upstream.timeout_secs must be greater than 0".to_string());
        }
        if self.copier.queue_capacity == 0 {
            return Err("copier.queue_capacity must be greater than 0".to_string());
        }
        if self.copier.workers == 0 {
            return Err("copier.workers must be greater than 0".to_string());
        }
        if self.copier.transfer_timeout_secs == 0 {
            return Err("copier.transfer_timeout_secs must be greater than 0".to_string());
        }
        for (host, url) in &self.upstream.discovery_overrides {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!(
                    "upstream.discovery_overrides.{host} must be an http(s) URL"
                ));
            }
        }
        Ok(())
    }
}
