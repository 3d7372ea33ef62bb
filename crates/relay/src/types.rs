//! Data types for the transfer flow.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use deporelay_deposit::DepositionFile;
use serde::{Deserialize, Serialize};

/// Stage of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Idle,
    Reading,
    Provisioning,
    Uploading,
    Verifying,
    Succeeded,
    Failed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferState::Idle => "idle",
            TransferState::Reading => "reading",
            TransferState::Provisioning => "provisioning",
            TransferState::Uploading => "uploading",
            TransferState::Verifying => "verifying",
            TransferState::Succeeded => "succeeded",
            TransferState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Event emitted while a transfer runs.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// The transfer entered a new stage.
    StateChanged { object: String, state: TransferState },
    /// A range was acknowledged by the archive.
    Progress {
        object: String,
        bytes_sent: u64,
        total: u64,
        percent: f64,
        bytes_per_second: f64,
        eta: Option<Duration>,
    },
    /// The upload was verified.
    Completed { object: String, deposition_id: u64 },
    /// The transfer failed.
    Failed {
        object: String,
        status: u16,
        error: String,
    },
}

/// What a successful transfer produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    pub deposition_id: u64,
    pub file_name: String,
    /// Size confirmed by the archive.
    pub bytes: u64,
    /// PUT requests acknowledged.
    pub ranges: usize,
    pub view_url: Option<String>,
    /// Files on the deposition after the upload; empty if the final fetch
    /// failed.
    pub files: Vec<DepositionFile>,
}

/// Terminal result of one transfer, as reported to the invoking context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferOutcome {
    /// HTTP-style status: 200 on success.
    pub status: u16,
    pub state: TransferState,
    pub message: String,
    /// Failure class, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    /// Stage the transfer was in when it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_during: Option<TransferState>,
    /// `container/key` of the source object.
    pub object: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Deposition created by this transfer, also on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposition_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<DepositionFile>,
    /// Whether the deposition was deleted after the failure.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cleaned_up: bool,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.state == TransferState::Succeeded
    }
}
