//! Post-upload size verification.

use reqwest::header::{CONTENT_LENGTH, HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::Client;
use crate::error::{Error, VerificationError};
use crate::upload::file_url;

/// How the verification request authenticates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyAuth {
    /// `Authorization: Bearer` header, as for uploads.
    #[default]
    Bearer,
    /// `access_token` query parameter.
    Query,
}

/// Confirms an uploaded file's size with a metadata-only request.
pub struct IntegrityVerifier<'a> {
    client: &'a Client,
    auth: VerifyAuth,
}

impl<'a> IntegrityVerifier<'a> {
    pub fn new(client: &'a Client, auth: VerifyAuth) -> Self {
        Self { client, auth }
    }

    /// Sends `HEAD` to the file's upload path and compares the reported
    /// `Content-Length` with `expected`.
    ///
    /// Returns the confirmed size.
    pub async fn verify(&self, target: &str, file_name: &str, expected: u64) -> Result<u64, Error> {
        let url = file_url(target, file_name);

        let resp = self
            .client
            .transport()
            .send("verify upload", |_| {
                let mut req = self
                    .client
                    .transport()
                    .http()
                    .head(&url)
                    .timeout(self.client.request_timeout());
                req = match self.auth {
                    VerifyAuth::Bearer => self.client.authorize(req),
                    VerifyAuth::Query => req.query(&[("access_token", self.client.token())]),
                };
                async move { Ok(req) }
            })
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VerificationError::HeadFailed {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            }
            .into());
        }

        let actual =
            reported_size(resp.headers()).ok_or(VerificationError::MissingSize { expected })?;
        if actual != expected {
            warn!(file = file_name, expected, actual, "size mismatch after upload");
            return Err(VerificationError::SizeMismatch { expected, actual }.into());
        }

        info!(file = file_name, size = actual, "upload verified");
        Ok(actual)
    }
}

/// Size announced by a `HEAD` response.
///
/// Read from the header: a `HEAD` response has no body, so the body length
/// reported by the client is zero.
fn reported_size(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
