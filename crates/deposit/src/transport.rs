//! Outbound HTTP with bounded retry on transient network failures.

use std::future::Future;

use deporelay_source::{ReadError, find_length_mismatch};
use deporelay_transfer::{RetryPolicy, retry};
use reqwest::{RequestBuilder, Response};

use crate::error::Error;

/// Returns `true` for failures worth retrying: connection errors, timeouts
/// and connections dropped mid-request.
///
/// A received response is never a transport failure, whatever its status.
/// A request whose body failed because the source delivered the wrong
/// number of bytes is not transient either.
pub fn is_transient(err: &reqwest::Error) -> bool {
    if find_length_mismatch(err).is_some() {
        return false;
    }
    err.is_connect() || err.is_timeout() || err.is_request()
}

/// Sends requests through a shared `reqwest` client, retrying transient
/// failures per its [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryingTransport {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl RetryingTransport {
    /// Creates a transport. The underlying client sets no overall timeout;
    /// callers add per-request timeouts where a bound is wanted.
    pub fn new(policy: RetryPolicy) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, policy })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The underlying client, for building requests.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Sends the request produced by `build`, rebuilding it for every attempt.
    ///
    /// `build` receives the 1-based attempt number and may do async work
    /// (such as reopening a source stream) before returning the request.
    /// Errors from `build` are returned without retry.
    pub async fn send<F, Fut>(&self, operation: &str, mut build: F) -> Result<Response, Error>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<RequestBuilder, Error>>,
    {
        retry(&self.policy, operation, transient_error, |attempt| {
            let request = build(attempt);
            async move { execute(request.await?).await }
        })
        .await
    }
}

fn transient_error(err: &Error) -> bool {
    matches!(err, Error::Transport(e) if is_transient(e))
}

async fn execute(request: RequestBuilder) -> Result<Response, Error> {
    match request.send().await {
        Ok(resp) => Ok(resp),
        Err(e) => match find_length_mismatch(&e) {
            Some(mismatch) => Err(Error::Read(ReadError::Length(mismatch))),
            None => Err(Error::Transport(e)),
        },
    }
}
