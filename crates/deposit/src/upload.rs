//! Chunked, range-addressed upload of one source object.
//!
//! The object is split into a [`TransferPlan`] and each range is sent as a
//! single PUT carrying `Content-Range: bytes {start}-{end}/{size}`. Ranges go
//! out strictly in order; the next one starts only after the archive has
//! acknowledged the previous one.

use std::time::Duration;

use deporelay_source::{ByteStream, ObjectReader, ObjectRef};
use deporelay_transfer::{
    ChunkRange, EMPTY_CONTENT_RANGE, SpeedCalculator, TransferAttempt, TransferPlan,
    encode_path_segment, format_bytes,
};
use reqwest::Body;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::{Error, UploadError, error_reason};

/// Destination and source of one upload.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Upload target link of the deposition.
    pub target: &'a str,
    /// Unescaped destination file name.
    pub file_name: &'a str,
    pub object: &'a ObjectRef,
    pub size: u64,
}

/// Progress after an acknowledged range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub bytes_sent: u64,
    pub total: u64,
    pub percent: f64,
    /// 0-based index of the range just acknowledged.
    pub range_index: usize,
    pub ranges: usize,
    /// Average throughput over the recent window, 0.0 until measurable.
    pub bytes_per_second: f64,
}

/// Result of a completed upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadSummary {
    pub bytes_sent: u64,
    /// Number of PUT requests acknowledged.
    pub ranges: usize,
    pub elapsed: Duration,
}

/// Builds the destination URL of a file on an upload target.
pub fn file_url(target: &str, file_name: &str) -> String {
    format!(
        "{}/{}",
        target.trim_end_matches('/'),
        encode_path_segment(file_name)
    )
}

/// Uploads source objects range by range.
pub struct ChunkedUploader<'a> {
    client: &'a Client,
    reader: &'a dyn ObjectReader,
    chunk_size: u64,
}

impl<'a> ChunkedUploader<'a> {
    pub fn new(client: &'a Client, reader: &'a dyn ObjectReader, chunk_size: u64) -> Self {
        Self {
            client,
            reader,
            chunk_size,
        }
    }

    /// Uploads `req.object` to `req.target`.
    ///
    /// `initial` is a stream over the whole object, typically the one
    /// obtained while reading its size. It is used for the first attempt of a
    /// single-range plan; every other attempt reopens its range from the
    /// reader.
    ///
    /// A non-success status on any range aborts the upload with an
    /// [`UploadError`]. Ranges already acknowledged stay on the archive.
    pub async fn upload<F>(
        &self,
        req: UploadRequest<'_>,
        initial: Option<ByteStream>,
        mut on_progress: F,
    ) -> Result<UploadSummary, Error>
    where
        F: FnMut(UploadProgress),
    {
        let plan = TransferPlan::new(req.size, self.chunk_size)?;
        let url = file_url(req.target, req.file_name);
        let mut attempt = TransferAttempt::new(req.size);
        attempt.start();

        info!(
            transfer_id = attempt.id(),
            file = req.file_name,
            size = %format_bytes(req.size),
            ranges = plan.len(),
            "starting upload"
        );

        if plan.is_empty() {
            drop(initial);
            let sent = self.put_empty(&url).await;
            attempt.finish();
            sent?;
            info!(transfer_id = attempt.id(), file = req.file_name, "uploaded empty file");
            on_progress(UploadProgress {
                bytes_sent: 0,
                total: 0,
                percent: attempt.percent(),
                range_index: 0,
                ranges: 1,
                bytes_per_second: 0.0,
            });
            return Ok(UploadSummary {
                bytes_sent: 0,
                ranges: 1,
                elapsed: attempt.elapsed(),
            });
        }

        let mut initial = if plan.len() == 1 { initial } else { None };
        let mut speed = SpeedCalculator::default();
        speed.record(0);

        for range in plan.ranges() {
            if let Err(e) = self.put_range(&req, &url, range, &mut initial).await {
                attempt.finish();
                warn!(
                    transfer_id = attempt.id(),
                    range = range.index,
                    bytes_sent = attempt.bytes_sent(),
                    elapsed_ms = attempt.elapsed().as_millis() as u64,
                    error = %e,
                    "upload aborted"
                );
                return Err(e);
            }

            attempt.confirm_range(range.len());
            speed.record(range.len());
            let bytes_per_second = speed.bytes_per_second();
            info!(
                transfer_id = attempt.id(),
                file = req.file_name,
                range = range.index + 1,
                ranges = plan.len(),
                bytes_sent = attempt.bytes_sent(),
                percent = %format!("{:.1}", attempt.percent()),
                speed = %format!("{}/s", format_bytes(bytes_per_second as u64)),
                "range acknowledged"
            );
            on_progress(UploadProgress {
                bytes_sent: attempt.bytes_sent(),
                total: req.size,
                percent: attempt.percent(),
                range_index: range.index,
                ranges: plan.len(),
                bytes_per_second,
            });
        }

        attempt.finish();
        Ok(UploadSummary {
            bytes_sent: attempt.bytes_sent(),
            ranges: attempt.range_index(),
            elapsed: attempt.elapsed(),
        })
    }

    async fn put_range(
        &self,
        req: &UploadRequest<'_>,
        url: &str,
        range: ChunkRange,
        initial: &mut Option<ByteStream>,
    ) -> Result<(), Error> {
        let content_range = range.content_range(req.size);
        let operation = format!("upload range {}", range.index + 1);

        let resp = self
            .client
            .transport()
            .send(&operation, |attempt| {
                let reused = initial.take();
                let reader = self.reader;
                let object = req.object;
                let (start, end) = (range.start, range.end);
                let builder = self
                    .client
                    .authorize(self.client.transport().http().put(url))
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .header(CONTENT_LENGTH, range.len())
                    .header(CONTENT_RANGE, content_range.as_str());
                async move {
                    let stream = match reused {
                        Some(stream) => stream,
                        None => {
                            debug!(object = %object, start, end, attempt, "opening range");
                            reader.open_range(object, start, end).await?
                        }
                    };
                    Ok(builder.body(Body::wrap_stream(stream)))
                }
            })
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError {
                status: status.as_u16(),
                reason: error_reason(&body),
                range: Some(range),
            }
            .into());
        }
        Ok(())
    }

    /// Sends the single zero-length PUT representing an empty object.
    async fn put_empty(&self, url: &str) -> Result<(), Error> {
        let resp = self
            .client
            .transport()
            .send("upload empty file", |_| {
                let req = self
                    .client
                    .authorize(self.client.transport().http().put(url))
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .header(CONTENT_LENGTH, 0u64)
                    .header(CONTENT_RANGE, EMPTY_CONTENT_RANGE)
                    .body(Body::from(Vec::<u8>::new()));
                async move { Ok(req) }
            })
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError {
                status: status.as_u16(),
                reason: error_reason(&body),
                range: None,
            }
            .into());
        }
        Ok(())
    }
}
