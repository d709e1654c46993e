//! M2X API client (https://api-m2x.att.com/v2 by default).
//! Authenticates with the feed's API key in the `X-M2X-KEY` header.

use async_trait::async_trait;
use std::time::Duration;

use super::request::{is_relative_segment, ApiRequest, ApiResponse};

pub const DEFAULT_ENDPOINT: &str = "https://api-m2x.att.com/v2";

const API_KEY_HEADER: &str = "X-M2X-KEY";
const USER_AGENT: &str = concat!("m2x-node/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("m2x request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("m2x request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid m2x request: {0}")]
    Invalid(String),
}

impl ClientError {
    /// Status reported downstream when no API response is available.
    pub fn status_code(&self) -> u16 {
        match self {
            ClientError::Timeout(_) => 504,
            ClientError::Request(_) | ClientError::Invalid(_) => 500,
        }
    }
}

/// Sends a bound request to the API. Implementations hold only static credentials,
/// so one client is shared across all in-flight invocations.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError>;
}

/// Client for the M2X HTTP API.
#[derive(Clone)]
pub struct M2xClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl M2xClient {
    pub fn new(api_key: impl Into<String>, endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Self {
            endpoint,
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Endpoint URL with the request's path segments appended (each percent-encoded).
    /// Dot and blank segments are refused rather than normalized away.
    fn url(&self, request: &ApiRequest) -> Result<reqwest::Url, ClientError> {
        if let Some(bad) = request.segments.iter().find(|s| is_relative_segment(s)) {
            return Err(ClientError::Invalid(format!(
                "{:?} is not a valid path segment in {}",
                bad,
                request.path()
            )));
        }
        let mut url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| ClientError::Invalid(format!("bad endpoint {}: {}", self.endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Invalid(format!("endpoint {} cannot take a path", self.endpoint))
            })?
            .pop_if_empty()
            .extend(&request.segments);
        Ok(url)
    }
}

impl std::fmt::Debug for M2xClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("M2xClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ApiClient for M2xClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = self.url(&request)?;
        log::debug!("m2x: {} {}", request.verb, url);
        let mut builder = self
            .client
            .request(request.verb.as_method(), url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::USER_AGENT, USER_AGENT);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        let res = builder.send().await?;
        let status = res.status().as_u16();
        let raw = res.text().await?;
        Ok(ApiResponse::new(status, raw))
    }
}
