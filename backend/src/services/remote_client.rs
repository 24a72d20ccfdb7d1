//! HTTP client used by proxy repositories.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};

use crate::error::{AppError, Result};
use crate::models::repository::RemoteRepository;

/// Streaming response body.
pub type RemoteBody = BoxStream<'static, Result<Bytes>>;

/// Outcome of a remote GET.
pub enum RemoteResponse {
    Found(RemoteBody),
    NotFound,
}

/// Remote repository access. Retries, if any, are the implementation's
/// business; callers issue exactly one `get` per fetch.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// GET `path` relative to the remote base URL.
    ///
    /// Connection failures and unexpected statuses map to
    /// `AppError::Transport`, elapsed timeouts to `AppError::Timeout`.
    async fn get(
        &self,
        remote: &RemoteRepository,
        path: &str,
        timeout: Duration,
    ) -> Result<RemoteResponse>;
}

/// Build the remote URL for a relative path.
pub fn build_upstream_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}

/// `reqwest`-backed client sharing one connection pool.
pub struct HttpRemoteClient {
    http_client: Client,
}

impl HttpRemoteClient {
    pub fn new() -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("artifact-depot-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

fn map_reqwest_error(url: &str, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(format!("Remote fetch timed out: {}", url))
    } else {
        AppError::Transport(format!("Failed to fetch {}: {}", url, e))
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn get(
        &self,
        remote: &RemoteRepository,
        path: &str,
        timeout: Duration,
    ) -> Result<RemoteResponse> {
        let url = build_upstream_url(&remote.url, path);
        tracing::info!(url = %url, "Fetching artifact from remote");

        let mut request = self.http_client.get(&url).timeout(timeout);
        if let Some(username) = &remote.username {
            request = request.basic_auth(username, remote.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_reqwest_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            tracing::debug!(url = %url, status = status.as_u16(), "Remote does not have artifact");
            return Ok(RemoteResponse::NotFound);
        }
        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "Remote returned error status {}: {}",
                status, url
            )));
        }

        let body = response
            .bytes_stream()
            .map_err(move |e| map_reqwest_error(&url, e))
            .boxed();
        Ok(RemoteResponse::Found(body))
    }
}
