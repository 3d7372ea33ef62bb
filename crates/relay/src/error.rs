//! Relay error types and their terminal status codes.

use std::time::Duration;

use deporelay_deposit::Error as DepositError;
use deporelay_source::ReadError;
use deporelay_transfer::TransferError;

use crate::config::ConfigError;

/// The trigger or the source object is unusable. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid destination file name: {0}")]
    FileName(String),

    #[error("object key cannot be decoded: {0}")]
    Key(String),

    #[error("size of {0} cannot be determined")]
    UnknownSize(String),

    #[error("{object} is {size} bytes, over the {max} byte limit")]
    TooLarge { object: String, size: u64, max: u64 },
}

impl From<TransferError> for ValidationError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::InvalidKey(key) => ValidationError::Key(key),
            other => ValidationError::FileName(other.to_string()),
        }
    }
}

/// Errors produced by a transfer.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("source read failed: {0}")]
    Read(#[from] ReadError),

    #[error(transparent)]
    Deposit(#[from] DepositError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transfer exceeded its {}s deadline", .0.as_secs())]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

impl RelayError {
    /// Terminal status code reported for this failure.
    pub fn status(&self) -> u16 {
        match self {
            RelayError::Validation(ValidationError::TooLarge { .. }) => 413,
            RelayError::Validation(_) => 400,
            RelayError::Read(e) => read_status(e),
            RelayError::Deposit(e) => match e {
                DepositError::Read(e) => read_status(e),
                DepositError::Transport(_) => 503,
                DepositError::Plan(_) | DepositError::InvalidToken => 500,
                DepositError::Provision(_)
                | DepositError::Upload(_)
                | DepositError::Verification(_)
                | DepositError::Api { .. }
                | DepositError::MissingUploadTarget(_)
                | DepositError::Json(_) => 502,
            },
            RelayError::Config(_) => 500,
            RelayError::Timeout(_) => 504,
            RelayError::Cancelled => 499,
        }
    }

    /// Short machine-readable class of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "validation",
            RelayError::Read(_) | RelayError::Deposit(DepositError::Read(_)) => "read",
            RelayError::Deposit(e) => match e {
                DepositError::Provision(_) => "provision",
                DepositError::Upload(_) => "upload",
                DepositError::Verification(_) => "verification",
                DepositError::Transport(_) => "transport",
                _ => "archive",
            },
            RelayError::Config(_) => "config",
            RelayError::Timeout(_) => "timeout",
            RelayError::Cancelled => "cancelled",
        }
    }
}

fn read_status(e: &ReadError) -> u16 {
    match e {
        ReadError::NotFound(_) => 404,
        _ => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deporelay_deposit::{ProvisionError, UploadError, VerificationError};
    use deporelay_source::LengthMismatch;
    use deporelay_transfer::ChunkRange;

    #[test]
    fn validation_statuses() {
        let e: RelayError = ValidationError::FileName("empty".into()).into();
        assert_eq!((e.status(), e.kind()), (400, "validation"));
        let e: RelayError = ValidationError::TooLarge {
            object: "b/k".into(),
            size: 20,
            max: 10,
        }
        .into();
        assert_eq!(e.status(), 413);
    }

    #[test]
    fn key_errors_map_to_key_validation() {
        let e = ValidationError::from(TransferError::InvalidKey("%FF".into()));
        assert!(matches!(e, ValidationError::Key(_)));
        let e = ValidationError::from(TransferError::InvalidFileName("empty file name".into()));
        assert!(matches!(e, ValidationError::FileName(_)));
    }

    #[test]
    fn read_statuses() {
        let e: RelayError = ReadError::NotFound("b/k".into()).into();
        assert_eq!(e.status(), 404);
        let e: RelayError = ReadError::Io(std::io::Error::other("disk")).into();
        assert_eq!(e.status(), 500);
        let e: RelayError = DepositError::Read(ReadError::Length(LengthMismatch {
            expected: 10,
            actual: 4,
        }))
        .into();
        assert_eq!((e.status(), e.kind()), (500, "read"));
    }

    #[test]
    fn archive_statuses() {
        let e: RelayError = DepositError::from(ProvisionError {
            status: 500,
            reason: "boom".into(),
        })
        .into();
        assert_eq!((e.status(), e.kind()), (502, "provision"));

        let e: RelayError = DepositError::from(UploadError {
            status: 403,
            reason: "denied".into(),
            range: Some(ChunkRange { index: 1, start: 10, end: 19 }),
        })
        .into();
        assert_eq!((e.status(), e.kind()), (502, "upload"));

        let e: RelayError =
            DepositError::from(VerificationError::SizeMismatch { expected: 1, actual: 2 }).into();
        assert_eq!((e.status(), e.kind()), (502, "verification"));
    }

    #[test]
    fn timeout_and_cancel_statuses() {
        let e = RelayError::Timeout(Duration::from_secs(540));
        assert_eq!(e.status(), 504);
        assert_eq!(e.to_string(), "transfer exceeded its 540s deadline");
        assert_eq!(RelayError::Cancelled.status(), 499);
    }
}
