//! Transfer orchestrator.
//!
//! Runs one new-object trigger through the pipeline
//! `Idle → Reading → Provisioning → Uploading → Verifying → Succeeded | Failed`
//! and maps the result to a [`TransferOutcome`]. Progress and state changes
//! are published on an event channel; cancellation and an optional deadline
//! abort the pipeline at its next suspension point.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use chrono::Utc;
use deporelay_deposit::{ChunkedUploader, Client, IntegrityVerifier, UploadRequest};
use deporelay_source::{LengthMismatch, ObjectReader, ObjectRef, ReadError};
use deporelay_transfer::{decode_key, eta, file_name_from_key, format_bytes};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{CleanupPolicy, RelayConfig};
use crate::error::{RelayError, ValidationError};
use crate::types::{RelayEvent, TransferOutcome, TransferReport, TransferState};

/// Per-invocation state shared between the pipeline and its supervisor.
struct Invocation {
    object: String,
    state: Mutex<TransferState>,
    file_name: OnceLock<String>,
    deposition_id: OnceLock<u64>,
}

impl Invocation {
    fn new(object: &ObjectRef) -> Self {
        Self {
            object: object.to_string(),
            state: Mutex::new(TransferState::Idle),
            file_name: OnceLock::new(),
            deposition_id: OnceLock::new(),
        }
    }

    fn state(&self) -> TransferState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(TransferState::Failed)
    }
}

/// Relays new source objects into fresh depositions.
///
/// One orchestrator can serve any number of concurrent triggers: every
/// invocation creates its own deposition and shares nothing mutable.
pub struct TransferOrchestrator {
    config: RelayConfig,
    client: Client,
    reader: Arc<dyn ObjectReader>,
    events_tx: mpsc::Sender<RelayEvent>,
    events_rx: Option<mpsc::Receiver<RelayEvent>>,
    cancel: CancellationToken,
}

impl TransferOrchestrator {
    /// Creates an orchestrator reading sources through `reader`.
    pub fn new(config: RelayConfig, reader: Arc<dyn ObjectReader>) -> Result<Self, RelayError> {
        config.validate()?;
        let client = config.client()?;
        let (events_tx, events_rx) = mpsc::channel(256);
        Ok(Self {
            config,
            client,
            reader,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        })
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events are dropped rather than awaited when the receiver lags.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<RelayEvent>> {
        self.events_rx.take()
    }

    /// Returns a token that cancels every transfer run by this orchestrator.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Runs one transfer and reports its terminal outcome.
    ///
    /// Never fails: every error becomes a failed [`TransferOutcome`] with a
    /// status code and message.
    pub async fn run(&self, object: &ObjectRef) -> TransferOutcome {
        let started = Instant::now();
        let inv = Invocation::new(object);
        info!(object = %inv.object, "transfer triggered");

        let result = self.supervise(object, &inv).await;

        match result {
            Ok(report) => {
                self.enter(&inv, TransferState::Succeeded);
                self.emit(RelayEvent::Completed {
                    object: inv.object.clone(),
                    deposition_id: report.deposition_id,
                });
                let message = format!(
                    "uploaded {} ({}) to deposition {}",
                    report.file_name,
                    format_bytes(report.bytes),
                    report.deposition_id
                );
                info!(
                    object = %inv.object,
                    deposition_id = report.deposition_id,
                    bytes = report.bytes,
                    ranges = report.ranges,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "transfer succeeded"
                );
                TransferOutcome {
                    status: 200,
                    state: TransferState::Succeeded,
                    message,
                    error_kind: None,
                    failed_during: None,
                    object: inv.object.clone(),
                    file_name: Some(report.file_name),
                    deposition_id: Some(report.deposition_id),
                    bytes: Some(report.bytes),
                    view_url: report.view_url,
                    files: report.files,
                    cleaned_up: false,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    finished_at: Utc::now(),
                }
            }
            Err(e) => {
                let failed_during = inv.state();
                self.enter(&inv, TransferState::Failed);
                let status = e.status();
                let message = e.to_string();
                error!(
                    object = %inv.object,
                    status,
                    kind = e.kind(),
                    stage = %failed_during,
                    error = %message,
                    "transfer failed"
                );
                self.emit(RelayEvent::Failed {
                    object: inv.object.clone(),
                    status,
                    error: message.clone(),
                });

                let deposition_id = inv.deposition_id.get().copied();
                let cleaned_up = match deposition_id {
                    Some(id) => self.cleanup(id).await,
                    None => false,
                };

                TransferOutcome {
                    status,
                    state: TransferState::Failed,
                    message,
                    error_kind: Some(e.kind()),
                    failed_during: Some(failed_during),
                    object: inv.object.clone(),
                    file_name: inv.file_name.get().cloned(),
                    deposition_id,
                    bytes: None,
                    view_url: None,
                    files: Vec::new(),
                    cleaned_up,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    finished_at: Utc::now(),
                }
            }
        }
    }

    /// Runs the pipeline under cancellation and the configured deadline.
    async fn supervise(&self, object: &ObjectRef, inv: &Invocation) -> Result<TransferReport, RelayError> {
        let guarded = async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(RelayError::Cancelled),
                result = self.pipeline(object, inv) => result,
            }
        };

        match self.config.deadline() {
            Some(deadline) => tokio::time::timeout(deadline, guarded)
                .await
                .unwrap_or(Err(RelayError::Timeout(deadline))),
            None => guarded.await,
        }
    }

    async fn pipeline(&self, object: &ObjectRef, inv: &Invocation) -> Result<TransferReport, RelayError> {
        // Validated before any network activity. The key is decoded once:
        // the source is read under the decoded key and the file name is its
        // last segment.
        let key = decode_key(&object.key).map_err(ValidationError::from)?;
        let file_name = file_name_from_key(&key).map_err(ValidationError::from)?;
        let _ = inv.file_name.set(file_name.clone());
        let source = ObjectRef::new(object.container.clone(), key);

        self.enter(inv, TransferState::Reading);
        let size = self.reader.stat(&source).await.map_err(read_error)?;
        if size > self.config.max_file_size {
            return Err(ValidationError::TooLarge {
                object: inv.object.clone(),
                size,
                max: self.config.max_file_size,
            }
            .into());
        }
        debug!(object = %inv.object, source = %source, file = %file_name, size, "source sized");

        self.enter(inv, TransferState::Provisioning);
        let deposition = self.client.create_deposition().await?;
        let _ = inv.deposition_id.set(deposition.id);
        let target = deposition.upload_target()?.to_string();

        self.enter(inv, TransferState::Uploading);
        // Only a single-range upload streams the whole object; larger plans
        // read range by range.
        let initial = if size > 0 && size <= self.config.chunk_size {
            let opened = self.reader.open(&source).await.map_err(read_error)?;
            if opened.size != size {
                return Err(ReadError::Length(LengthMismatch {
                    expected: size,
                    actual: opened.size,
                })
                .into());
            }
            Some(opened.stream)
        } else {
            None
        };
        let uploader = ChunkedUploader::new(&self.client, self.reader.as_ref(), self.config.chunk_size);
        let request = UploadRequest {
            target: &target,
            file_name: &file_name,
            object: &source,
            size,
        };
        let summary = uploader
            .upload(request, initial, |p| {
                self.emit(RelayEvent::Progress {
                    object: inv.object.clone(),
                    bytes_sent: p.bytes_sent,
                    total: p.total,
                    percent: p.percent,
                    bytes_per_second: p.bytes_per_second,
                    eta: eta(p.total.saturating_sub(p.bytes_sent), p.bytes_per_second),
                });
            })
            .await?;

        self.enter(inv, TransferState::Verifying);
        let bytes = IntegrityVerifier::new(&self.client, self.config.verify_auth)
            .verify(&target, &file_name, size)
            .await?;

        // Verification is authoritative; the fetch only enriches the report.
        let files = match self.client.get_deposition(deposition.id).await {
            Ok(fetched) => fetched.files,
            Err(e) => {
                warn!(deposition_id = deposition.id, error = %e, "could not fetch deposition after upload");
                Vec::new()
            }
        };

        Ok(TransferReport {
            deposition_id: deposition.id,
            file_name,
            bytes,
            ranges: summary.ranges,
            view_url: deposition.links.html.clone(),
            files,
        })
    }

    /// Applies the cleanup policy to a deposition left by a failure.
    /// Returns `true` if it was deleted.
    ///
    /// The delete, retries included, is bounded by the request timeout: it
    /// may run after the deadline has already fired.
    async fn cleanup(&self, deposition_id: u64) -> bool {
        if self.config.cleanup != CleanupPolicy::Delete {
            info!(deposition_id, "leaving partial deposition in place");
            return false;
        }
        let bound = self.config.request_timeout();
        match tokio::time::timeout(bound, self.client.delete_deposition(deposition_id)).await {
            Ok(Ok(())) => {
                info!(deposition_id, "deleted partial deposition");
                true
            }
            Ok(Err(e)) => {
                warn!(deposition_id, error = %e, "failed to delete partial deposition");
                false
            }
            Err(_) => {
                warn!(
                    deposition_id,
                    timeout_secs = bound.as_secs(),
                    "gave up deleting partial deposition"
                );
                false
            }
        }
    }

    fn enter(&self, inv: &Invocation, state: TransferState) {
        if let Ok(mut current) = inv.state.lock() {
            debug!(object = %inv.object, from = %*current, to = %state, "state transition");
            *current = state;
        }
        self.emit(RelayEvent::StateChanged {
            object: inv.object.clone(),
            state,
        });
    }

    fn emit(&self, event: RelayEvent) {
        let _ = self.events_tx.try_send(event);
    }
}

/// An object whose size is unknown is unusable, not unreadable.
fn read_error(e: ReadError) -> RelayError {
    match e {
        ReadError::UnknownSize(what) => ValidationError::UnknownSize(what).into(),
        other => other.into(),
    }
}
