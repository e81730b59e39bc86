//! HTTP object storage client.

use super::ObjectStore;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("ampere/", env!("CARGO_PKG_VERSION"));

/// Bucket served over HTTP, read with `GET {base_url}/{bucket}/{path}`.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    token: Option<String>,
}

impl HttpStore {
    /// Create a client for one bucket.
    ///
    /// # Arguments
    /// * `base_url` - Storage service URL, with or without a trailing slash
    /// * `bucket` - Bucket holding the artifacts
    /// * `token` - Optional bearer token
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: &str,
        bucket: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        if base_url.is_empty() || bucket.is_empty() {
            return Err(StoreError::Config(
                "base_url and bucket must not be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            token,
        })
    }

    /// URL of an object.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

/// Map an unsuccessful HTTP status onto the store error taxonomy.
pub(crate) fn classify_status(path: &str, status: StatusCode) -> StoreError {
    let path = path.to_string();
    let reason = format!("HTTP {status}");
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound { path },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::PermissionDenied { path, reason }
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Transient { path, reason }
        }
        s if s.is_server_error() => StoreError::Transient { path, reason },
        _ => StoreError::Request { path, reason },
    }
}

fn classify_transport(path: &str, error: &reqwest::Error) -> StoreError {
    let path = path.to_string();
    let reason = error.to_string();
    if error.is_timeout() || error.is_connect() || error.is_body() {
        StoreError::Transient { path, reason }
    } else {
        StoreError::Request { path, reason }
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        let url = self.url(path);
        debug!(%url, "GET object");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(path, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(path, status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport(path, &e))?;
        Ok(body.to_vec())
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.base_url, self.bucket)
    }
}
