//! Deposition API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication. Every
//! request is sent through a [`RetryingTransport`].

use std::time::Duration;

use deporelay_transfer::RetryPolicy;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{RequestBuilder, Response};
use tracing::{debug, info};

use crate::error::{Error, ProvisionError, error_reason};
use crate::transport::RetryingTransport;
use crate::types::{CreateDeposition, Deposition};

pub const DEFAULT_COMMUNITY: &str = "cdrxiv";
pub const DEFAULT_UPLOAD_TYPE: &str = "dataset";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Deposition API client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Client {
    transport: RetryingTransport,
    base_url: String,
    token: String,
    bearer: HeaderValue,
    community: String,
    upload_type: String,
    request_timeout: Duration,
}

impl Client {
    /// Creates a client for the archive at `base_url`.
    pub fn new(base_url: impl Into<String>, token: &str) -> Result<Self, Error> {
        if token.trim().is_empty() {
            return Err(Error::InvalidToken);
        }
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| Error::InvalidToken)?;
        bearer.set_sensitive(true);

        Ok(Self {
            transport: RetryingTransport::new(RetryPolicy::default())?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.to_string(),
            bearer,
            community: DEFAULT_COMMUNITY.to_string(),
            upload_type: DEFAULT_UPLOAD_TYPE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.transport = self.transport.with_policy(policy);
        self
    }

    /// Community tag attached to every new deposition.
    pub fn with_community(mut self, community: impl Into<String>) -> Self {
        self.community = community.into();
        self
    }

    pub fn with_upload_type(mut self, upload_type: impl Into<String>) -> Self {
        self.upload_type = upload_type.into();
        self
    }

    /// Timeout for API calls and verification requests. Chunk uploads are
    /// never bounded by it.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &RetryingTransport {
        &self.transport
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Adds the bearer authorization header.
    pub(crate) fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, self.bearer.clone())
    }

    fn depositions_url(&self) -> String {
        format!("{}/api/deposit/depositions", self.base_url)
    }

    fn deposition_url(&self, id: u64) -> String {
        format!("{}/{id}", self.depositions_url())
    }

    /// Creates a new, empty deposition.
    ///
    /// Sends one creation request (plus transport-level retries). A
    /// non-success status is a [`ProvisionError`].
    pub async fn create_deposition(&self) -> Result<Deposition, Error> {
        let url = self.depositions_url();
        let payload = CreateDeposition::new(&self.upload_type, &self.community);

        let resp = self
            .transport
            .send("create deposition", |_| {
                let req = self
                    .authorize(self.transport.http().post(&url))
                    .timeout(self.request_timeout)
                    .json(&payload);
                async move { Ok(req) }
            })
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProvisionError {
                status: status.as_u16(),
                reason: error_reason(&body),
            }
            .into());
        }

        let body = resp.bytes().await?;
        let deposition: Deposition = serde_json::from_slice(&body)?;
        info!(
            deposition_id = deposition.id,
            upload_target = deposition.links.upload_target.as_deref().unwrap_or(""),
            "created deposition"
        );
        Ok(deposition)
    }

    /// Fetches a deposition by id.
    pub async fn get_deposition(&self, id: u64) -> Result<Deposition, Error> {
        let url = self.deposition_url(id);
        let resp = self
            .transport
            .send("get deposition", |_| {
                let req = self
                    .authorize(self.transport.http().get(&url))
                    .timeout(self.request_timeout);
                async move { Ok(req) }
            })
            .await?;

        let resp = api_success(resp).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Deletes an unpublished deposition and any files uploaded to it.
    pub async fn delete_deposition(&self, id: u64) -> Result<(), Error> {
        let url = self.deposition_url(id);
        let resp = self
            .transport
            .send("delete deposition", |_| {
                let req = self
                    .authorize(self.transport.http().delete(&url))
                    .timeout(self.request_timeout);
                async move { Ok(req) }
            })
            .await?;

        api_success(resp).await?;
        debug!(deposition_id = id, "deleted deposition");
        Ok(())
    }
}

async fn api_success(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        reason: error_reason(&body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockResponse, MockServer};
    use serde_json::json;

    fn created(server_url: &str) -> serde_json::Value {
        json!({
            "id": 42,
            "created": "2024-05-01T12:00:00+00:00",
            "links": {
                "bucket": format!("{server_url}/api/files/b-42"),
                "html": format!("{server_url}/deposit/42")
            },
            "files": [],
            "metadata": {},
            "submitted": false
        })
    }

    #[test]
    fn empty_token_rejected() {
        assert!(matches!(Client::new("http://a", ""), Err(Error::InvalidToken)));
        assert!(matches!(Client::new("http://a", "  "), Err(Error::InvalidToken)));
    }

    #[test]
    fn token_with_newline_rejected() {
        assert!(matches!(
            Client::new("http://a", "abc\ndef"),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = Client::new("https://archive.test/", "t").unwrap();
        assert_eq!(client.base_url(), "https://archive.test");
        assert_eq!(
            client.deposition_url(5),
            "https://archive.test/api/deposit/depositions/5"
        );
    }

    #[tokio::test]
    async fn create_deposition_posts_metadata() {
        let server = MockServer::start(|req| {
            let base = format!("http://{}", req.header("host").unwrap_or_default());
            MockResponse::json(201, &created(&base))
        })
        .await;
        let client = Client::new(server.base_url(), "secret")
            .unwrap()
            .with_community("testcomm");

        let dep = client.create_deposition().await.unwrap();
        assert_eq!(dep.id, 42);
        assert_eq!(
            dep.upload_target().unwrap(),
            server.url("/api/files/b-42")
        );

        let reqs = server.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, "POST");
        assert_eq!(reqs[0].path, "/api/deposit/depositions");
        assert_eq!(reqs[0].header("authorization"), Some("Bearer secret"));
        let body: serde_json::Value = serde_json::from_slice(&reqs[0].body).unwrap();
        assert_eq!(
            body,
            json!({"metadata": {"upload_type": "dataset", "communities": [{"identifier": "testcomm"}]}})
        );
    }

    #[tokio::test]
    async fn create_deposition_server_error_is_provision_error() {
        let server = MockServer::start(|_| {
            MockResponse::json(500, &json!({"status": 500, "message": "Internal error."}))
        })
        .await;
        let client = Client::new(server.base_url(), "secret").unwrap();

        match client.create_deposition().await {
            Err(Error::Provision(e)) => {
                assert_eq!(e.status, 500);
                assert_eq!(e.reason, "Internal error.");
            }
            other => panic!("expected provision error, got {other:?}"),
        }
        // Statuses are not retried.
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn create_deposition_bad_json() {
        let server = MockServer::start(|_| MockResponse::status(201).with_body("not json")).await;
        let client = Client::new(server.base_url(), "secret").unwrap();
        assert!(matches!(client.create_deposition().await, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn get_deposition_by_id() {
        let server = MockServer::start(|req| {
            let base = format!("http://{}", req.header("host").unwrap_or_default());
            let mut body = created(&base);
            body["files"] = json!([{"id": "f", "filename": "a.bin", "filesize": 10}]);
            MockResponse::json(200, &body)
        })
        .await;
        let client = Client::new(server.base_url(), "secret").unwrap();

        let dep = client.get_deposition(42).await.unwrap();
        assert_eq!(dep.files[0].filesize, 10);
        assert_eq!(server.requests()[0].path, "/api/deposit/depositions/42");
    }

    #[tokio::test]
    async fn get_deposition_not_found_is_api_error() {
        let server = MockServer::start(|_| {
            MockResponse::json(404, &json!({"status": 404, "message": "PID does not exist."}))
        })
        .await;
        let client = Client::new(server.base_url(), "secret").unwrap();

        assert!(matches!(
            client.get_deposition(9).await,
            Err(Error::Api { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn delete_deposition_sends_delete() {
        let server = MockServer::start(|_| MockResponse::status(204)).await;
        let client = Client::new(server.base_url(), "secret").unwrap();

        client.delete_deposition(42).await.unwrap();
        let reqs = server.requests();
        assert_eq!(reqs[0].method, "DELETE");
        assert_eq!(reqs[0].path, "/api/deposit/depositions/42");
    }
}
