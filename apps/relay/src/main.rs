//! deporelay entry point.
//!
//! Handles one new-object trigger: relays the object into a fresh
//! deposition, prints the outcome as JSON on stdout and exits non-zero if
//! the transfer failed.

mod config;
mod trigger;

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use deporelay_relay::{ObjectRef, RelayEvent, TransferOrchestrator};
use tracing_subscriber::EnvFilter;

/// Relay a newly stored object into a fresh archive deposition.
#[derive(Parser, Debug)]
#[command(name = "deporelay", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "DEPORELAY_CONFIG", default_value = "deporelay.toml")]
    config: PathBuf,

    /// Bucket holding the new object.
    #[arg(long, requires = "key", conflicts_with = "event")]
    bucket: Option<String>,

    /// Key of the new object within the bucket.
    #[arg(long, requires = "bucket")]
    key: Option<String>,

    /// File holding the trigger event JSON. Read from stdin when neither
    /// this nor --bucket/--key is given.
    #[arg(long)]
    event: Option<PathBuf>,
}

impl Args {
    fn object(&self) -> anyhow::Result<ObjectRef> {
        if let (Some(bucket), Some(key)) = (&self.bucket, &self.key) {
            return Ok(ObjectRef::new(bucket.clone(), key.clone()));
        }
        let payload = match &self.event {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading trigger {}", path.display()))?,
            None => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("reading trigger from stdin")?;
                buf
            }
        };
        trigger::parse(&payload)
    }
}

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries only the outcome.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting deporelay");

    let token = std::env::var(config::TOKEN_ENV).ok();
    let config = config::load(&args.config, token)?;
    tracing::info!(archive = %config.archive_url, community = %config.community, "configuration loaded");

    let object = args.object()?;
    let reader = config
        .source
        .build_reader()
        .context("building source reader")?;

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async move {
        let mut orchestrator = TransferOrchestrator::new(config, reader)?;

        let cancel = orchestrator.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling transfer");
                cancel.cancel();
            }
        });

        if let Some(mut events) = orchestrator.take_events() {
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    if let RelayEvent::Progress { percent, eta, .. } = event {
                        tracing::debug!(percent = %format!("{percent:.1}"), eta_secs = eta.map(|d| d.as_secs()), "progress");
                    }
                }
            });
        }

        anyhow::Ok(orchestrator.run(&object).await)
    })?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_and_key_name_the_object() {
        let args = Args::try_parse_from(["deporelay", "--bucket", "uploads", "--key", "a b.csv"]).unwrap();
        assert_eq!(args.object().unwrap(), ObjectRef::new("uploads", "a b.csv"));
    }

    #[test]
    fn bucket_requires_key() {
        assert!(Args::try_parse_from(["deporelay", "--bucket", "uploads"]).is_err());
    }

    #[test]
    fn bucket_conflicts_with_event() {
        assert!(
            Args::try_parse_from(["deporelay", "--bucket", "b", "--key", "k", "--event", "e.json"])
                .is_err()
        );
    }

    #[test]
    fn event_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"data": {"bucket": "uploads", "name": "x.nc"}}"#).unwrap();
        let args =
            Args::try_parse_from(["deporelay", "--event", path.to_str().unwrap()]).unwrap();
        assert_eq!(args.object().unwrap(), ObjectRef::new("uploads", "x.nc"));
    }
}
