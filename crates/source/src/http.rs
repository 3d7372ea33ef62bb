//! Bucket exposed over HTTP: whole-object and `Range` GETs.

use deporelay_transfer::encode_path_segment;
use futures_util::TryStreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, RANGE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::stream::{ExactLengthStream, LengthMismatch};
use crate::{BoxFuture, ByteStream, ObjectReader, ObjectRef, OpenedObject, ReadError};

/// Reads objects from `{base_url}/{container}/{key}`.
pub struct HttpObjectReader {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpObjectReader {
    /// Creates a reader for an object endpoint, optionally authenticated
    /// with a bearer token.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ReadError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// URL of an object, every path segment escaped.
    pub fn object_url(&self, object: &ObjectRef) -> String {
        let key = object
            .key
            .split('/')
            .map(encode_path_segment)
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/{}",
            self.base_url,
            encode_path_segment(&object.container),
            key
        )
    }

    fn request(&self, method: Method, object: &ObjectRef) -> RequestBuilder {
        let req = self.http.request(method, self.object_url(object));
        match &self.token {
            Some(token) => req.header(AUTHORIZATION, format!("Bearer {token}")),
            None => req,
        }
    }

    async fn get(&self, object: &ObjectRef, range: Option<(u64, u64)>) -> Result<Response, ReadError> {
        let mut req = self.request(Method::GET, object);
        if let Some((start, end)) = range {
            req = req.header(RANGE, format!("bytes={start}-{end}"));
        }
        Ok(req.send().await?)
    }
}

/// Parses the `Content-Length` header.
///
/// Read from the headers directly: the body size hint is not reliable for
/// every response kind.
fn header_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Parses the complete length from `Content-Range: bytes a-b/N` or `bytes */N`.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    value.rsplit('/').next()?.trim().parse().ok()
}

async fn status_error(object: &ObjectRef, resp: Response) -> ReadError {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return ReadError::NotFound(object.to_string());
    }
    let body = resp.text().await.unwrap_or_default();
    ReadError::Status {
        status: status.as_u16(),
        body,
    }
}

fn body_stream(resp: Response, expected: u64) -> ByteStream {
    let stream: ByteStream = Box::pin(resp.bytes_stream().map_err(std::io::Error::other));
    ExactLengthStream::boxed(stream, expected)
}

impl ObjectReader for HttpObjectReader {
    fn stat<'a>(&'a self, object: &'a ObjectRef) -> BoxFuture<'a, Result<u64, ReadError>> {
        Box::pin(async move {
            let resp = self.request(Method::HEAD, object).send().await?;
            if !resp.status().is_success() {
                return Err(status_error(object, resp).await);
            }
            header_content_length(resp.headers())
                .ok_or_else(|| ReadError::UnknownSize(object.to_string()))
        })
    }

    fn open<'a>(&'a self, object: &'a ObjectRef) -> BoxFuture<'a, Result<OpenedObject, ReadError>> {
        Box::pin(async move {
            let resp = self.get(object, None).await?;
            if !resp.status().is_success() {
                return Err(status_error(object, resp).await);
            }
            let size = header_content_length(resp.headers())
                .ok_or_else(|| ReadError::UnknownSize(object.to_string()))?;
            debug!(object = %object, size, "opened source object");
            Ok(OpenedObject {
                size,
                stream: body_stream(resp, size),
            })
        })
    }

    fn open_range<'a>(
        &'a self,
        object: &'a ObjectRef,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, Result<ByteStream, ReadError>> {
        Box::pin(async move {
            if start > end {
                return Err(ReadError::InvalidRange {
                    start,
                    end,
                    size: 0,
                });
            }
            let len = end - start + 1;
            let resp = self.get(object, Some((start, end))).await?;

            match resp.status() {
                StatusCode::PARTIAL_CONTENT => {}
                // A server ignoring `Range` is only acceptable when the range is the whole object.
                StatusCode::OK if start == 0 => {}
                StatusCode::RANGE_NOT_SATISFIABLE => {
                    let size = content_range_total(resp.headers()).unwrap_or(0);
                    return Err(ReadError::InvalidRange { start, end, size });
                }
                s if s.is_success() => {
                    return Err(ReadError::Status {
                        status: s.as_u16(),
                        body: "unexpected status for range request".into(),
                    });
                }
                _ => return Err(status_error(object, resp).await),
            }

            if let Some(announced) = header_content_length(resp.headers())
                && announced != len
            {
                return Err(LengthMismatch {
                    expected: len,
                    actual: announced,
                }
                .into());
            }

            Ok(body_stream(resp, len))
        })
    }
}
