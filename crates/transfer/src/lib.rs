//! Chunk planning, bounded retry and progress accounting for deposition transfers.
//!
//! Everything in this crate is free of network I/O so the arithmetic and the
//! retry policy can be tested in isolation.

mod chunked;
mod progress;
mod retry;
mod types;
mod validation;

pub use chunked::{ChunkRange, EMPTY_CONTENT_RANGE, Ranges, TransferPlan, plan_ranges};
pub use progress::{SpeedCalculator, eta, format_bytes, percent};
pub use retry::{RetryPolicy, retry};
pub use types::TransferAttempt;
pub use validation::{decode_key, encode_path_segment, file_name_from_key, validate_file_name};

/// Default chunk size ceiling: 100 MiB.
///
/// Each chunk is a single PUT, so this bounds how much is re-sent when one
/// request has to be retried.
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("object key is not valid UTF-8 after decoding: {0}")]
    InvalidKey(String),
}
