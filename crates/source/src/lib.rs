//! Source object readers.
//!
//! An [`ObjectReader`] reports an object's size and hands out byte streams
//! for the whole object or for an inclusive byte range. Every stream is
//! length-checked: a short (or long) read surfaces as an error instead of a
//! silently truncated upload.

pub mod fs;
pub mod http;
mod stream;
mod types;

use std::future::Future;
use std::pin::Pin;

pub use fs::FsObjectReader;
pub use http::HttpObjectReader;
pub use stream::{ExactLengthStream, LengthMismatch, find_length_mismatch};
pub use types::{ByteStream, ObjectRef, OpenedObject};

/// Boxed future returned by [`ObjectReader`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced while reading a source object.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("size of {0} cannot be determined")]
    UnknownSize(String),

    #[error("invalid object reference: {0}")]
    InvalidObject(String),

    #[error("invalid range {start}-{end} for object of {size} bytes")]
    InvalidRange { start: u64, end: u64, size: u64 },

    #[error(transparent)]
    Length(#[from] LengthMismatch),

    #[error("source returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Access to source objects.
///
/// Implementations must be cheap to share: one reader serves every
/// concurrent transfer.
pub trait ObjectReader: Send + Sync {
    /// Reports the object's size without reading its content.
    ///
    /// Fails like [`open`](Self::open).
    fn stat<'a>(&'a self, object: &'a ObjectRef) -> BoxFuture<'a, Result<u64, ReadError>>;

    /// Opens the whole object, returning its size and content stream.
    ///
    /// Fails with [`ReadError::NotFound`] if the object is absent and
    /// [`ReadError::UnknownSize`] if its length cannot be determined.
    fn open<'a>(&'a self, object: &'a ObjectRef) -> BoxFuture<'a, Result<OpenedObject, ReadError>>;

    /// Opens the inclusive byte range `[start, end]`.
    ///
    /// The returned stream yields exactly `end - start + 1` bytes or ends
    /// with an error carrying a [`LengthMismatch`].
    fn open_range<'a>(
        &'a self,
        object: &'a ObjectRef,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, Result<ByteStream, ReadError>>;
}
