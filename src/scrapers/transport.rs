use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::debug;

/// Fetches response bodies. Shared read-only by every concurrent fetch.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the body of a successful response.
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// `reqwest`-backed transport, built once per pipeline run.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &ScoutConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-GB,en;q=0.9"),
        );

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(url, status));
        }

        response
            .text()
            .await
            .map_err(|e| ScoutError::TransientNetwork {
                url: url.to_string(),
                reason: format!("failed to read response body: {e}"),
            })
    }
}

fn classify_send_error(url: &str, error: reqwest::Error) -> ScoutError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        ScoutError::TransientNetwork {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        ScoutError::Http(error)
    }
}

/// 5xx and 429 are worth another attempt; other statuses are final.
pub fn classify_status(url: &str, status: StatusCode) -> ScoutError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ScoutError::TransientNetwork {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        }
    } else {
        ScoutError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        }
    }
}
