use crate::error::{Result, ScoutError};
use crate::scrapers::retry::RetryPolicy;
use crate::scrapers::transport::Transport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};
use url::{form_urlencoded, Url};

/// Marketplace location reference, e.g. `POSTCODE^4203018`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationIdentifier {
    pub kind: String,
    pub id: String,
}

impl fmt::Display for LocationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}^{}", self.kind, self.id)
    }
}

#[derive(Deserialize)]
struct TypeaheadResponse {
    matches: Option<Vec<TypeaheadMatch>>,
}

#[derive(Deserialize)]
struct TypeaheadMatch {
    #[serde(rename = "type")]
    kind: String,
    id: serde_json::Value,
}

/// Resolves free-text locations through the type-ahead endpoint.
///
/// Results are cached per normalized location for the lifetime of the
/// resolver. The engine owns one, so every run of a pipeline shares it.
pub struct LocationResolver {
    endpoint: Url,
    retry: RetryPolicy,
    cache: Mutex<HashMap<String, LocationIdentifier>>,
}

impl LocationResolver {
    pub fn new(endpoint: Url, retry: RetryPolicy) -> Self {
        Self {
            endpoint,
            retry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `text` to the first type-ahead match.
    ///
    /// Ambiguous inputs are not disambiguated: whatever the provider ranks
    /// first wins.
    pub async fn resolve(
        &self,
        transport: &dyn Transport,
        text: &str,
    ) -> Result<LocationIdentifier> {
        let token = normalize_location(text);
        if token.is_empty() {
            return Err(ScoutError::InvalidQuery("location was not provided".into()));
        }

        if let Some(hit) = self.cached(&token) {
            debug!("Location '{}' resolved from cache: {}", text, hit);
            return Ok(hit);
        }

        let url = self.lookup_url(&token);
        let target = url.as_str();
        let body = self
            .retry
            .run("location lookup", ScoutError::is_retryable, move || {
                transport.get_text(target)
            })
            .await?;

        let location = parse_first_match(&url, &body, text)?;
        info!("Resolved location '{}' to {}", text, location);

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token, location.clone());
        Ok(location)
    }

    fn cached(&self, token: &str) -> Option<LocationIdentifier> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }

    fn lookup_url(&self, token: &str) -> String {
        let mut url = self.endpoint.clone();
        url.set_query(Some(&format!("query={token}")));
        url.to_string()
    }
}

/// Lowercase `text` and collapse every run of whitespace or punctuation into
/// a single `+`, e.g. `"SY3 9EB"` becomes `"sy3+9eb"`.
pub fn normalize_location(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| form_urlencoded::byte_serialize(part.to_lowercase().as_bytes()).collect())
        .collect::<Vec<String>>()
        .join("+")
}

fn parse_first_match(url: &str, body: &str, text: &str) -> Result<LocationIdentifier> {
    let response: TypeaheadResponse =
        serde_json::from_str(body).map_err(|e| ScoutError::MalformedResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let matches = response.matches.ok_or_else(|| ScoutError::MalformedResponse {
        url: url.to_string(),
        reason: "missing 'matches' array".into(),
    })?;

    let first = matches
        .into_iter()
        .next()
        .ok_or_else(|| ScoutError::UnresolvedLocation {
            location: text.to_string(),
        })?;

    let id = match first.id {
        serde_json::Value::String(id) => id,
        serde_json::Value::Number(id) => id.to_string(),
        other => {
            return Err(ScoutError::MalformedResponse {
                url: url.to_string(),
                reason: format!("unexpected location id {other}"),
            })
        }
    };

    Ok(LocationIdentifier {
        kind: first.kind,
        id,
    })
}
