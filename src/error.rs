use thiserror::Error;

/// Errors raised while searching and scraping a marketplace.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("No location matches for '{location}'")]
    UnresolvedLocation { location: String },

    #[error("Transient network failure for {url}: {reason}")]
    TransientNetwork { url: String, reason: String },

    #[error("Request to {url} failed with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Unexpected response shape from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("Page {url} carries no embedded listing data")]
    ContentShape { url: String },

    #[error("Request to {url} did not complete before the run deadline")]
    Timeout { url: String },

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScoutError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScoutError::TransientNetwork { .. })
    }

    /// Short machine-readable name used in run annotations.
    pub fn kind(&self) -> FailureKind {
        match self {
            ScoutError::UnresolvedLocation { .. } => FailureKind::UnresolvedLocation,
            ScoutError::TransientNetwork { .. } => FailureKind::TransientNetwork,
            ScoutError::Http(_) => FailureKind::HttpClient,
            ScoutError::HttpStatus { .. } => FailureKind::HttpStatus,
            ScoutError::MalformedResponse { .. } | ScoutError::Json(_) => {
                FailureKind::MalformedResponse
            }
            ScoutError::ContentShape { .. } => FailureKind::ContentShape,
            ScoutError::Timeout { .. } => FailureKind::Timeout,
            ScoutError::InvalidQuery(_) => FailureKind::InvalidQuery,
            ScoutError::Io(_) => FailureKind::Io,
        }
    }
}

/// Failure classification recorded in result annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnresolvedLocation,
    TransientNetwork,
    /// Client-side request failure that was not retried
    HttpClient,
    HttpStatus,
    MalformedResponse,
    ContentShape,
    Timeout,
    InvalidQuery,
    Io,
}

pub type Result<T> = std::result::Result<T, ScoutError>;
