//! The upstream listing API and its reqwest client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use thiserror::Error;
use tracing::{debug, warn};

use super::model::{UpstreamErrorBody, UpstreamPage};
use super::query::ListQuery;

pub const DEFAULT_UPSTREAM_ORIGIN: &str = "https://suitmedia-backend.suitdev.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const USER_AGENT: &str = "Suitmedia-Ideas-App/1.0";

const LISTING_PATH: &str = "/api/ideas";

/// Ways a single upstream call can fail.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream did not respond in time")]
    Timeout,

    #[error("upstream unreachable: {0}")]
    Unavailable(String),

    #[error("upstream returned HTTP {status}")]
    Http { status: u16, message: Option<String> },

    #[error("malformed upstream response: {0}")]
    Format(String),

    #[error("upstream request failed: {0}")]
    Other(String),
}

impl UpstreamError {
    /// Classifies a transport-level reqwest failure.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_connect() {
            UpstreamError::Unavailable(e.to_string())
        } else if e.is_decode() {
            UpstreamError::Format(e.to_string())
        } else {
            UpstreamError::Other(e.to_string())
        }
    }
}

/// Anything that can produce one page of upstream ideas.
#[async_trait]
pub trait IdeasSource: Send + Sync {
    /// Fetches one page. Exactly one outbound attempt; no retry.
    async fn fetch_page(&self, query: &ListQuery) -> Result<UpstreamPage, UpstreamError>;

    /// Origin used to absolutize relative image URLs in this source's payloads.
    fn origin(&self) -> &str;
}

/// reqwest-backed client for `GET {origin}/api/ideas`.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    origin: String,
}

impl UpstreamClient {
    /// Builds a client for `origin` with the given request timeout.
    ///
    /// # Errors
    /// Returns [`UpstreamError::Other`] if the HTTP client cannot be created.
    pub fn new(origin: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Other(format!("failed to create HTTP client: {e}")))?;

        let origin: String = origin.into();
        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_owned(),
        })
    }

    async fn error_from_status(status: reqwest::StatusCode, response: reqwest::Response) -> UpstreamError {
        let message = match response.bytes().await {
            Ok(body) => serde_json::from_slice::<UpstreamErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.is_empty()),
            Err(_) => None,
        };

        UpstreamError::Http {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl IdeasSource for UpstreamClient {
    async fn fetch_page(&self, query: &ListQuery) -> Result<UpstreamPage, UpstreamError> {
        let url = format!("{}{LISTING_PATH}", self.origin);
        let params = [
            ("page[number]", query.page_number.to_string()),
            ("page[size]", query.page_size.to_string()),
            ("append[]", "small_image".to_owned()),
            ("append[]", "medium_image".to_owned()),
            ("sort", query.sort.as_str().to_owned()),
        ];

        debug!(%url, page = query.page_number, size = query.page_size, sort = %query.sort, "calling upstream");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "failed to reach upstream");
                UpstreamError::from_reqwest(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "upstream returned an error status");
            return Err(Self::error_from_status(status, response).await);
        }

        let body = response.bytes().await.map_err(|e| {
            warn!(error = %e, "failed to read upstream body");
            UpstreamError::from_reqwest(&e)
        })?;

        serde_json::from_slice::<UpstreamPage>(&body).map_err(|e| {
            warn!(error = %e, "upstream body is not a listing page");
            UpstreamError::Format(e.to_string())
        })
    }

    fn origin(&self) -> &str {
        &self.origin
    }
}
