use std::error::Error as StdError;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;

use crate::ByteStream;

/// A stream delivered a different number of bytes than announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} bytes from source, got {actual}")]
pub struct LengthMismatch {
    pub expected: u64,
    pub actual: u64,
}

impl From<LengthMismatch> for io::Error {
    fn from(e: LengthMismatch) -> Self {
        let kind = if e.actual < e.expected {
            io::ErrorKind::UnexpectedEof
        } else {
            io::ErrorKind::InvalidData
        };
        io::Error::new(kind, e)
    }
}

/// Finds a [`LengthMismatch`] anywhere in an error's source chain.
///
/// Streams wrapped in [`ExactLengthStream`] report mismatches as
/// `io::Error`s; HTTP clients then bury those several levels deep.
pub fn find_length_mismatch(err: &(dyn StdError + 'static)) -> Option<LengthMismatch> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(m) = e.downcast_ref::<LengthMismatch>() {
            return Some(*m);
        }
        if let Some(m) = e
            .downcast_ref::<io::Error>()
            .and_then(|io| io.get_ref())
            .and_then(|inner| inner.downcast_ref::<LengthMismatch>())
        {
            return Some(*m);
        }
        current = e.source();
    }
    None
}

/// Wraps a [`ByteStream`] and fails it unless exactly `expected` bytes flow.
pub struct ExactLengthStream {
    inner: ByteStream,
    expected: u64,
    seen: u64,
    done: bool,
}

impl ExactLengthStream {
    pub fn new(inner: ByteStream, expected: u64) -> Self {
        Self {
            inner,
            expected,
            seen: 0,
            done: false,
        }
    }

    /// Boxes the guarded stream back into a [`ByteStream`].
    pub fn boxed(inner: ByteStream, expected: u64) -> ByteStream {
        Box::pin(Self::new(inner, expected))
    }

    fn mismatch(&mut self) -> io::Error {
        self.done = true;
        LengthMismatch {
            expected: self.expected,
            actual: self.seen,
        }
        .into()
    }
}

impl Stream for ExactLengthStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.seen = this.seen.saturating_add(chunk.len() as u64);
                if this.seen > this.expected {
                    return Poll::Ready(Some(Err(this.mismatch())));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if this.seen != this.expected {
                    return Poll::Ready(Some(Err(this.mismatch())));
                }
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{StreamExt, stream};

    fn chunks(parts: &[&'static [u8]]) -> ByteStream {
        let items: Vec<Result<Bytes, io::Error>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        Box::pin(stream::iter(items))
    }

    async fn collect(mut s: ExactLengthStream) -> Result<Vec<u8>, io::Error> {
        let mut out = Vec::new();
        while let Some(chunk) = s.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn exact_length_passes_through() {
        let s = ExactLengthStream::new(chunks(&[b"hello", b" world"]), 11);
        assert_eq!(collect(s).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn short_read_fails_at_end() {
        let s = ExactLengthStream::new(chunks(&[b"hello"]), 8);
        let err = collect(s).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(
            find_length_mismatch(&err),
            Some(LengthMismatch { expected: 8, actual: 5 })
        );
    }

    #[tokio::test]
    async fn long_read_fails_immediately() {
        let s = ExactLengthStream::new(chunks(&[b"abc", b"def", b"ghi"]), 4);
        let err = collect(s).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(
            find_length_mismatch(&err),
            Some(LengthMismatch { expected: 4, actual: 6 })
        );
    }

    #[tokio::test]
    async fn empty_stream_with_zero_expected() {
        let s = ExactLengthStream::new(chunks(&[]), 0);
        assert!(collect(s).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stream_ends_after_error() {
        let mut s = ExactLengthStream::new(chunks(&[b"ab"]), 3);
        assert!(s.next().await.unwrap().is_ok());
        assert!(s.next().await.unwrap().is_err());
        assert!(s.next().await.is_none());
    }

    #[test]
    fn finds_mismatch_through_wrapping_errors() {
        #[derive(Debug, thiserror::Error)]
        #[error("outer")]
        struct Outer(#[source] io::Error);

        let inner: io::Error = LengthMismatch { expected: 3, actual: 1 }.into();
        let outer = Outer(inner);
        assert_eq!(
            find_length_mismatch(&outer),
            Some(LengthMismatch { expected: 3, actual: 1 })
        );
    }

    #[test]
    fn unrelated_error_has_no_mismatch() {
        let err = io::Error::other("boom");
        assert!(find_length_mismatch(&err).is_none());
    }
}
