//! Client for a deposition-based archival API.
//!
//! Provides the pieces of a transfer that talk to the archive:
//!
//! 1. **Provision**: create a deposition and obtain its upload target
//! 2. **Upload**: PUT the object in ordered, range-addressed chunks
//! 3. **Verify**: HEAD the uploaded file and compare its size
//!
//! Every request goes through a [`RetryingTransport`] that absorbs
//! transient network failures. HTTP statuses are left to the caller.

pub mod client;
pub mod error;
pub mod transport;
pub mod types;
pub mod upload;
pub mod verify;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::Client;
pub use error::{Error, ProvisionError, UploadError, VerificationError};
pub use transport::{RetryingTransport, is_transient};
pub use types::{Community, Deposition, DepositionFile, DepositionLinks};
pub use upload::{ChunkedUploader, file_url, UploadProgress, UploadRequest, UploadSummary};
pub use verify::{IntegrityVerifier, VerifyAuth};
