use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::scrapers::retry::{within_deadline, RetryPolicy};
use crate::scrapers::transport::Transport;
use futures::stream::{FuturesUnordered, StreamExt};
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Name of the client-side data model assigned in listing pages.
pub const PAGE_MODEL_MARKER: &str = "PAGE_MODEL";

/// JSON data model embedded in a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailPayload {
    pub page_model: Value,
}

impl DetailPayload {
    pub fn property_data(&self) -> Option<&Value> {
        self.page_model.get("propertyData")
    }

    pub fn analytics(&self) -> Option<&Value> {
        self.page_model
            .get("analyticsInfo")
            .and_then(|info| info.get("analyticsProperty"))
    }
}

pub type DetailOutcome = Result<DetailPayload>;

/// Fetches listing pages concurrently, never more than `max_in_flight` at once.
pub struct ListingDetailFetcher<'a> {
    transport: &'a dyn Transport,
    max_in_flight: usize,
    retry: RetryPolicy,
}

impl<'a> ListingDetailFetcher<'a> {
    pub fn new(transport: &'a dyn Transport, config: &ScoutConfig) -> Self {
        Self {
            transport,
            max_in_flight: config.max_concurrent_details.max(1),
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Fetch and extract every URL. Failures are kept per URL; one bad page
    /// never aborts the batch.
    pub async fn fetch_details(
        &self,
        urls: &[String],
        deadline: Option<Instant>,
    ) -> HashMap<String, DetailOutcome> {
        info!(
            "Fetching {} detail pages ({} in flight max)",
            urls.len(),
            self.max_in_flight
        );

        let mut pending = FuturesUnordered::new();
        let mut results = HashMap::with_capacity(urls.len());

        for url in urls {
            pending.push(self.fetch_one(url, deadline));

            while pending.len() >= self.max_in_flight {
                if let Some((url, outcome)) = pending.next().await {
                    results.insert(url, outcome);
                }
            }
        }

        while let Some((url, outcome)) = pending.next().await {
            results.insert(url, outcome);
        }

        let failed = results.values().filter(|r| r.is_err()).count();
        info!(
            "Detail pages done: {} extracted, {} failed",
            results.len() - failed,
            failed
        );
        results
    }

    async fn fetch_one(&self, url: &str, deadline: Option<Instant>) -> (String, DetailOutcome) {
        let transport = self.transport;
        let attempt = self
            .retry
            .run("detail page", ScoutError::is_retryable, move || {
                transport.get_text(url)
            });

        let outcome = within_deadline(deadline, url, attempt)
            .await
            .and_then(|html| extract_page_model(url, &html));

        match &outcome {
            Ok(_) => debug!("Extracted page model from {}", url),
            Err(e) => warn!("Detail page {} degraded: {}", url, e),
        }
        (url.to_string(), outcome)
    }
}

/// Locate the page-model assignment and decode its JSON object.
///
/// Scripts that merely reference the model are skipped, as are candidates
/// that fail to decode. A page without any assignment is not a listing page
/// and yields [`ScoutError::ContentShape`]; assignments that never decode
/// yield [`ScoutError::MalformedResponse`].
pub fn extract_page_model(url: &str, html: &str) -> DetailOutcome {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").expect("valid selector");
    let mut decode_error = None;

    for script in document.select(&selector) {
        let text = script.text().collect::<String>();

        for object in assigned_objects(&text) {
            match serde_json::from_str::<Value>(object) {
                Ok(page_model) => return Ok(DetailPayload { page_model }),
                Err(e) => {
                    debug!("Skipping undecodable page model candidate in {}: {}", url, e);
                    decode_error = Some(e);
                }
            }
        }
    }

    match decode_error {
        Some(e) => Err(ScoutError::MalformedResponse {
            url: url.to_string(),
            reason: format!("page model is not valid JSON: {e}"),
        }),
        None => Err(ScoutError::ContentShape {
            url: url.to_string(),
        }),
    }
}

/// Objects assigned to the marker in `script`, e.g. `window.PAGE_MODEL = {..}`.
fn assigned_objects(script: &str) -> impl Iterator<Item = &str> {
    script
        .match_indices(PAGE_MODEL_MARKER)
        .filter_map(move |(at, marker)| {
            let rest = script[at + marker.len()..].trim_start();
            let value = rest.strip_prefix('=')?;
            if value.starts_with('=') {
                return None;
            }
            first_json_object(value)
        })
}

/// Slice of the first balanced `{...}` in `text`.
///
/// Braces inside JSON strings are ignored. Text before the opening brace and
/// after the matching close is left alone. Returns `None` when there is no
/// opening brace or the object never closes.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
