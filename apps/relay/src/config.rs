//! Relay configuration loading.
//!
//! Configuration is a TOML file; the access token may instead come from
//! `DEPORELAY_ACCESS_TOKEN` so it stays out of the file.

use std::path::Path;

use anyhow::Context;
use deporelay_relay::RelayConfig;

/// Environment variable overriding `access_token`.
pub const TOKEN_ENV: &str = "DEPORELAY_ACCESS_TOKEN";

/// Loads and validates the configuration at `path`.
///
/// `env_token`, when set and non-empty, replaces the file's `access_token`.
pub fn load(path: &Path, env_token: Option<String>) -> anyhow::Result<RelayConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration {}", path.display()))?;
    let mut config = parse(&content)
        .with_context(|| format!("parsing configuration {}", path.display()))?;

    if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
        config.access_token = token;
    }

    config.validate()?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn parse(content: &str) -> anyhow::Result<RelayConfig> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deporelay_relay::{CleanupPolicy, SourceConfig, VerifyAuth};

    const FULL: &str = r#"
archive_url = "https://archive.test"
access_token = "file-token"
community = "mycomm"
chunk_size = 1048576
max_retries = 4
retry_delay_ms = 500
backoff_factor = 2.0
deadline_secs = 540
verify_auth = "query"
cleanup = "delete"

[source]
kind = "http"
base_url = "https://store.test"
token = "store-token"
"#;

    fn write(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn full_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&write(&dir, FULL), None).unwrap();

        assert_eq!(config.archive_url, "https://archive.test");
        assert_eq!(config.access_token, "file-token");
        assert_eq!(config.community, "mycomm");
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.deadline_secs, Some(540));
        assert_eq!(config.verify_auth, VerifyAuth::Query);
        assert_eq!(config.cleanup, CleanupPolicy::Delete);
        assert_eq!(
            config.source,
            SourceConfig::Http {
                base_url: "https://store.test".into(),
                token: Some("store-token".into()),
            }
        );
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "archive_url = \"https://archive.test\"\naccess_token = \"t\"\n[source]\nkind = \"fs\"\nroot = \"/srv/buckets\"\n",
        );
        let config = load(&path, None).unwrap();
        assert_eq!(config.upload_type, "dataset");
        assert_eq!(config.chunk_size, 100 * 1024 * 1024);
        assert_eq!(config.cleanup, CleanupPolicy::Keep);
    }

    #[test]
    fn env_token_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&write(&dir, FULL), Some("env-token".into())).unwrap();
        assert_eq!(config.access_token, "env-token");
    }

    #[test]
    fn blank_env_token_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&write(&dir, FULL), Some("  ".into())).unwrap();
        assert_eq!(config.access_token, "file-token");
    }

    #[test]
    fn missing_token_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "archive_url = \"https://archive.test\"\n[source]\nkind = \"fs\"\nroot = \"/data\"\n",
        );
        let err = load(&path, None).unwrap_err();
        assert!(err.to_string().contains("access_token"), "{err}");
    }

    #[test]
    fn missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.toml"), None).is_err());
    }

    #[test]
    fn unknown_source_kind_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "archive_url = \"https://a.test\"\naccess_token = \"t\"\n[source]\nkind = \"ftp\"\n",
        );
        assert!(load(&path, None).is_err());
    }
}
