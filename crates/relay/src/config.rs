//! Relay configuration.
//!
//! Built once at process start and handed to the orchestrator; nothing below
//! this point reads the environment.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use deporelay_deposit::{Client, VerifyAuth};
use deporelay_source::{FsObjectReader, HttpObjectReader, ObjectReader, ReadError};
use deporelay_transfer::{DEFAULT_CHUNK_SIZE, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Invalid configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("archive_url is required")]
    MissingArchiveUrl,

    #[error("archive_url must be an http(s) URL: {0}")]
    InvalidArchiveUrl(String),

    #[error("access_token is required")]
    MissingToken,

    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("backoff_factor must be at least 1.0, got {0}")]
    InvalidBackoff(f64),

    #[error("invalid source: {0}")]
    InvalidSource(String),
}

/// What to do with a deposition left behind by a failed transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    /// Leave it for the operator to reconcile.
    #[default]
    Keep,
    /// Delete it and whatever was uploaded to it.
    Delete,
}

/// Where source objects are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Buckets are directories under `root`.
    Fs { root: PathBuf },
    /// Objects are served at `{base_url}/{container}/{key}`.
    Http {
        base_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
}

impl SourceConfig {
    /// Builds the reader this source describes.
    pub fn build_reader(&self) -> Result<Arc<dyn ObjectReader>, ReadError> {
        Ok(match self {
            SourceConfig::Fs { root } => Arc::new(FsObjectReader::new(root.clone())),
            SourceConfig::Http { base_url, token } => {
                Arc::new(HttpObjectReader::new(base_url.clone(), token.clone())?)
            }
        })
    }
}

/// Relay configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Base URL of the archive API.
    pub archive_url: String,

    /// Bearer token for the archive. No default.
    #[serde(default)]
    pub access_token: String,

    /// Community every new deposition is filed under.
    #[serde(default = "default_community")]
    pub community: String,

    #[serde(default = "default_upload_type")]
    pub upload_type: String,

    /// Upper bound of one PUT, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Largest object accepted, in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Retries after the first attempt of any request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// 1.0 keeps the delay fixed.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Timeout of API calls and verification requests. Chunk PUTs are never
    /// bounded by it.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Overall budget of one transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,

    #[serde(default)]
    pub verify_auth: VerifyAuth,

    #[serde(default)]
    pub cleanup: CleanupPolicy,

    pub source: SourceConfig,
}

fn default_community() -> String {
    deporelay_deposit::client::DEFAULT_COMMUNITY.into()
}

fn default_upload_type() -> String {
    deporelay_deposit::client::DEFAULT_UPLOAD_TYPE.into()
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_file_size() -> u64 {
    15 * 1024 * 1024 * 1024
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    4000
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_max_retry_delay_ms() -> u64 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("archive_url", &self.archive_url)
            .field("access_token", &"<redacted>")
            .field("community", &self.community)
            .field("upload_type", &self.upload_type)
            .field("chunk_size", &self.chunk_size)
            .field("max_file_size", &self.max_file_size)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("backoff_factor", &self.backoff_factor)
            .field("max_retry_delay_ms", &self.max_retry_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("deadline_secs", &self.deadline_secs)
            .field("verify_auth", &self.verify_auth)
            .field("cleanup", &self.cleanup)
            .field("source", &self.source)
            .finish()
    }
}

impl RelayConfig {
    /// Configuration with every optional field at its default.
    pub fn new(archive_url: impl Into<String>, access_token: impl Into<String>, source: SourceConfig) -> Self {
        Self {
            archive_url: archive_url.into(),
            access_token: access_token.into(),
            community: default_community(),
            upload_type: default_upload_type(),
            chunk_size: default_chunk_size(),
            max_file_size: default_max_file_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            deadline_secs: None,
            verify_auth: VerifyAuth::default(),
            cleanup: CleanupPolicy::default(),
            source,
        }
    }

    /// Checks required fields and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.archive_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingArchiveUrl);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidArchiveUrl(url.to_string()));
        }
        if self.access_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.backoff_factor.is_nan() || self.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoff(self.backoff_factor));
        }
        match &self.source {
            SourceConfig::Fs { root } if root.as_os_str().is_empty() => {
                Err(ConfigError::InvalidSource("fs root is empty".into()))
            }
            SourceConfig::Http { base_url, .. } if base_url.trim().is_empty() => {
                Err(ConfigError::InvalidSource("http base_url is empty".into()))
            }
            _ => Ok(()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_retry_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    /// Builds the archive client described by this configuration.
    pub fn client(&self) -> Result<Client, deporelay_deposit::Error> {
        Ok(Client::new(self.archive_url.trim(), &self.access_token)?
            .with_retry_policy(self.retry_policy())
            .with_community(self.community.clone())
            .with_upload_type(self.upload_type.clone())
            .with_request_timeout(self.request_timeout()))
    }
}
