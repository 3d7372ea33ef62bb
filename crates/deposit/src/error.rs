//! Deposit error types.

use deporelay_source::ReadError;
use deporelay_transfer::{ChunkRange, EMPTY_CONTENT_RANGE, TransferError};

/// The archive refused to create a deposition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("deposition creation rejected with {status}: {reason}")]
pub struct ProvisionError {
    pub status: u16,
    pub reason: String,
}

/// The archive rejected one chunk PUT.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} rejected with {status}: {reason}", describe_range(.range))]
pub struct UploadError {
    pub status: u16,
    pub reason: String,
    /// The rejected range; `None` for the single PUT of an empty object.
    pub range: Option<ChunkRange>,
}

fn describe_range(range: &Option<ChunkRange>) -> String {
    match range {
        Some(r) => format!("chunk {} (bytes {}-{})", r.index, r.start, r.end),
        None => format!("empty file upload ({EMPTY_CONTENT_RANGE})"),
    }
}

/// The uploaded file could not be confirmed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("verification request failed with {status}: {reason}")]
    HeadFailed { status: u16, reason: String },

    #[error("verification request reported no size (expected {expected} bytes)")]
    MissingSize { expected: u64 },

    #[error("size mismatch: expected {expected} bytes, archive reports {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// Errors produced by the deposit client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("API error {status}: {reason}")]
    Api { status: u16, reason: String },

    #[error("deposition {0} has no upload target link")]
    MissingUploadTarget(u64),

    #[error("source read failed: {0}")]
    Read(#[from] ReadError),

    #[error(transparent)]
    Plan(#[from] TransferError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid access token")]
    InvalidToken,
}

/// Extracts a human-readable reason from an error response body.
///
/// Archive errors are JSON with a `message` field; anything else is passed
/// through as text.
pub(crate) fn error_reason(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_prefers_json_message() {
        assert_eq!(
            error_reason(r#"{"status": 403, "message": "Permission denied."}"#),
            "Permission denied."
        );
    }

    #[test]
    fn reason_falls_back_to_text() {
        assert_eq!(error_reason(" Internal Server Error\n"), "Internal Server Error");
        assert_eq!(error_reason(r#"{"status": 500}"#), r#"{"status": 500}"#);
    }

    #[test]
    fn upload_error_names_range() {
        let e = UploadError {
            status: 403,
            reason: "forbidden".into(),
            range: Some(ChunkRange { index: 1, start: 10, end: 19 }),
        };
        assert_eq!(
            e.to_string(),
            "chunk 1 (bytes 10-19) rejected with 403: forbidden"
        );
    }

    #[test]
    fn empty_upload_error_has_no_byte_range() {
        let e = UploadError {
            status: 403,
            reason: "forbidden".into(),
            range: None,
        };
        assert_eq!(
            e.to_string(),
            "empty file upload (bytes */0) rejected with 403: forbidden"
        );
    }

    #[test]
    fn size_mismatch_carries_both_sizes() {
        let e = VerificationError::SizeMismatch {
            expected: 10,
            actual: 7,
        };
        assert!(e.to_string().contains("expected 10"));
        assert!(e.to_string().contains("reports 7"));
    }
}
