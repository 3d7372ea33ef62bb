//! Relay of new source objects into archive depositions.
//!
//! The [`TransferOrchestrator`] is the entry point for a new-object
//! trigger. It sequences the pieces provided by the lower crates:
//!
//! 1. **Read**: derive the file name and open the source object
//! 2. **Provision**: create a fresh deposition
//! 3. **Upload**: PUT the object range by range
//! 4. **Verify**: confirm the archived size
//!
//! and turns the result into a [`TransferOutcome`] carrying a status code
//! and message.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod types;

pub use config::{CleanupPolicy, ConfigError, RelayConfig, SourceConfig};
pub use error::{RelayError, ValidationError};
pub use orchestrator::TransferOrchestrator;
pub use types::{RelayEvent, TransferOutcome, TransferReport, TransferState};

pub use deporelay_deposit::VerifyAuth;
pub use deporelay_source::ObjectRef;
