use super::location::LocationIdentifier;
use super::url_builder::build_search_url;
use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::models::{CoverageShortfall, PageFailure};
use crate::scrapers::retry::{within_deadline, RetryPolicy};
use crate::scrapers::transport::Transport;
use crate::scrapers::types::SearchQuery;
use serde_json::Value;
use std::collections::HashSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Lightweight listing entry returned by the search API.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSummary {
    pub id: String,
    /// Canonical detail page URL
    pub url: String,
    pub raw: Value,
}

/// One parsed search API response.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// `None` when the page omits `resultCount`
    pub result_count: Option<u64>,
    pub entries: Vec<SearchSummary>,
}

/// Merged output of all search pages for one query.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub reported_total: u64,
    pub summaries: Vec<SearchSummary>,
    pub failed_pages: Vec<PageFailure>,
    pub duplicates_dropped: usize,
    pub shortfall: Option<CoverageShortfall>,
}

/// Walks the search API page by page.
///
/// Pages are fetched strictly in order: how far to go is decided from the
/// total reported by the previous page.
pub struct PaginatedSearchFetcher<'a> {
    transport: &'a dyn Transport,
    search_api: &'a Url,
    site: &'a Url,
    page_size: usize,
    max_offset: usize,
    retry: RetryPolicy,
}

impl<'a> PaginatedSearchFetcher<'a> {
    pub fn new(transport: &'a dyn Transport, config: &'a ScoutConfig) -> Self {
        Self {
            transport,
            search_api: &config.endpoints.search_api,
            site: &config.endpoints.site,
            page_size: config.page_size.max(1),
            max_offset: config.max_page_offset,
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Fetch every reachable page for `query`.
    ///
    /// Failure of the first page fails the whole search. Later pages that
    /// still fail after retries are recorded and counted as shortfall.
    pub async fn fetch_all(
        &self,
        query: &SearchQuery,
        location: &LocationIdentifier,
        deadline: Option<Instant>,
    ) -> Result<SearchOutcome> {
        let mut outcome = SearchOutcome::default();
        let mut merger = Merger::default();

        let first_size = self.page_size.min(self.max_offset.max(1));
        let first = self.fetch_page(query, location, 0, first_size, deadline).await?;
        let mut total = first
            .result_count
            .unwrap_or(first.entries.len() as u64);
        merger.absorb(first.entries);

        info!(
            total_results = total,
            "Search API reports {} matches for {}", total, query
        );

        let mut offset = self.page_size;
        loop {
            if offset as u64 >= total {
                break;
            }
            if offset >= self.max_offset {
                warn!(
                    offset,
                    ceiling = self.max_offset,
                    "Offset ceiling reached, remaining matches are unreachable"
                );
                break;
            }
            if limit_reached(query.limit, merger.len()) {
                debug!("Result limit reached after {} entries", merger.len());
                break;
            }

            let size = self.page_size.min(self.max_offset - offset);
            match self.fetch_page(query, location, offset, size, deadline).await {
                Ok(page) => {
                    match page.result_count {
                        Some(count) => total = count,
                        None => debug!(offset, "Page carries no resultCount, keeping {}", total),
                    }
                    merger.absorb(page.entries);
                }
                Err(e) => {
                    warn!(offset, "Search page failed after retries: {}", e);
                    outcome.failed_pages.push(PageFailure {
                        offset,
                        reason: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
            offset += self.page_size;
        }

        outcome.reported_total = total;
        outcome.duplicates_dropped = merger.duplicates;

        let retrieved = merger.len() as u64;
        if retrieved < total && !limit_reached(query.limit, merger.len()) {
            let shortfall = CoverageShortfall {
                total_results: total,
                retrieved,
                beyond_ceiling: total.saturating_sub(self.max_offset as u64),
                failed_offsets: outcome.failed_pages.iter().map(|p| p.offset).collect(),
            };
            warn!(
                "{} total results but only {} could be retrieved",
                total, retrieved
            );
            outcome.shortfall = Some(shortfall);
        }

        let mut summaries = merger.entries;
        if let Some(limit) = query.limit {
            summaries.truncate(limit);
        }
        outcome.summaries = summaries;

        Ok(outcome)
    }

    async fn fetch_page(
        &self,
        query: &SearchQuery,
        location: &LocationIdentifier,
        offset: usize,
        size: usize,
        deadline: Option<Instant>,
    ) -> Result<SearchPage> {
        let url = build_search_url(self.search_api, query, location, offset, size);
        debug!(offset, size, "Fetching search page");

        let (transport, site, target) = (self.transport, self.site, url.as_str());
        let attempt = self.retry.run("search page", retry_search_page, move || async move {
            let body = transport.get_text(target).await?;
            parse_search_page(target, &body, site)
        });
        within_deadline(deadline, &url, attempt).await
    }
}

fn retry_search_page(error: &ScoutError) -> bool {
    error.is_retryable() || matches!(error, ScoutError::MalformedResponse { .. })
}

fn limit_reached(limit: Option<usize>, collected: usize) -> bool {
    limit.is_some_and(|limit| collected >= limit)
}

/// Order-preserving dedup by listing id and by detail URL.
#[derive(Default)]
struct Merger {
    entries: Vec<SearchSummary>,
    ids: HashSet<String>,
    urls: HashSet<String>,
    duplicates: usize,
}

impl Merger {
    fn absorb(&mut self, entries: Vec<SearchSummary>) {
        for entry in entries {
            if self.ids.contains(&entry.id) || self.urls.contains(&entry.url) {
                self.duplicates += 1;
                continue;
            }
            self.ids.insert(entry.id.clone());
            self.urls.insert(entry.url.clone());
            self.entries.push(entry);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Validate and parse one search API response body.
pub fn parse_search_page(url: &str, body: &str, site: &Url) -> Result<SearchPage> {
    let malformed = |reason: String| ScoutError::MalformedResponse {
        url: url.to_string(),
        reason,
    };

    let json: Value = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    let properties = json
        .get("properties")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing 'properties' array".into()))?;

    let mut entries = Vec::with_capacity(properties.len());
    for property in properties {
        match summary_from(property, site) {
            Some(summary) => entries.push(summary),
            None => debug!("Skipping search entry without an id: {}", property),
        }
    }

    let result_count = json.get("resultCount").and_then(parse_count);

    Ok(SearchPage {
        result_count,
        entries,
    })
}

/// `resultCount` arrives as a comma-formatted string ("1,234").
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

fn summary_from(property: &Value, site: &Url) -> Option<SearchSummary> {
    let id = match property.get("id")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return None,
    };

    let path = property
        .get("propertyUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("/properties/{id}"));
    let mut url = site.join(&path).ok()?;
    url.set_fragment(None);

    Some(SearchSummary {
        id,
        url: url.to_string(),
        raw: property.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing::MockTransport;
    use crate::scrapers::types::TransactionKind;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> ScoutConfig {
        ScoutConfig {
            retry_delay: Duration::ZERO,
            ..ScoutConfig::default()
        }
    }

    fn location() -> LocationIdentifier {
        LocationIdentifier {
            kind: "REGION".into(),
            id: "61320".into(),
        }
    }

    fn query_param(url: &str, key: &str) -> usize {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.parse().unwrap())
            .unwrap()
    }

    fn comma_formatted(n: u64) -> String {
        let digits = n.to_string();
        let mut out = String::new();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    }

    /// Serves `total` listings with ids `0..total`, honoring index and page size.
    fn listing_api(total: u64) -> MockTransport {
        MockTransport::new().route_fn("/api/_search", move |url| {
            let index = query_param(url, "index") as u64;
            let size = query_param(url, "numberOfPropertiesPerPage") as u64;
            let properties: Vec<Value> = (index..(index + size).min(total))
                .map(|id| json!({"id": id, "propertyUrl": format!("/properties/{id}#/?channel=RES_BUY")}))
                .collect();
            Ok(json!({"resultCount": comma_formatted(total), "properties": properties}).to_string())
        })
    }

    fn offsets(transport: &MockTransport) -> Vec<usize> {
        transport
            .requests()
            .iter()
            .map(|url| query_param(url, "index"))
            .collect()
    }

    #[tokio::test]
    async fn three_pages_cover_twelve_hundred() {
        let transport = listing_api(1200);
        let config = config();
        let fetcher = PaginatedSearchFetcher::new(&transport, &config);
        let query = SearchQuery::new("kent", TransactionKind::Buy);

        let outcome = fetcher.fetch_all(&query, &location(), None).await.unwrap();

        assert_eq!(offsets(&transport), vec![0, 499, 998]);
        assert_eq!(outcome.summaries.len(), 1200);
        assert!(outcome.shortfall.is_none());
    }

    #[tokio::test]
    async fn matches_past_the_ceiling_are_reported() {
        let transport = listing_api(1300);
        let config = config();
        let fetcher = PaginatedSearchFetcher::new(&transport, &config);
        let query = SearchQuery::new("kent", TransactionKind::Buy);

        let outcome = fetcher.fetch_all(&query, &location(), None).await.unwrap();

        assert_eq!(offsets(&transport), vec![0, 499, 998]);
        assert!(transport
            .requests()
            .iter()
            .all(|url| query_param(url, "index") <= 1247));
        let shortfall = outcome.shortfall.expect("shortfall recorded");
        assert_eq!(shortfall.total_results, 1300);
        assert_eq!(shortfall.beyond_ceiling, 53);
        assert!(shortfall.missing() >= 1300 - 1247);
    }

    #[tokio::test]
    async fn single_page_results_issue_one_request() {
        let transport = listing_api(42);
        let config = config();
        let fetcher = PaginatedSearchFetcher::new(&transport, &config);
        let query = SearchQuery::new("kent", TransactionKind::Buy);

        let outcome = fetcher.fetch_all(&query, &location(), None).await.unwrap();
        assert_eq!(transport.request_count(), 1);
        assert_eq!(outcome.reported_total, 42);
        assert_eq!(outcome.summaries.len(), 42);
    }

    #[tokio::test]
    async fn overlapping_pages_are_deduplicated() {
        let transport = MockTransport::new()
            .route(
                "index=0&",
                r#"{"resultCount":"3","properties":[
                    {"id":11111,"propertyUrl":"/properties/11111"},
                    {"id":12345,"propertyUrl":"/properties/12345"}]}"#,
            )
            .route(
                "index=2&",
                r#"{"resultCount":"3","properties":[
                    {"id":12345,"propertyUrl":"/properties/12345#/?channel=RES_BUY"},
                    {"id":67890,"propertyUrl":"/properties/67890"}]}"#,
            );
        let config = ScoutConfig {
            page_size: 2,
            ..config()
        };
        let fetcher = PaginatedSearchFetcher::new(&transport, &config);
        let query = SearchQuery::new("kent", TransactionKind::Buy);

        let outcome = fetcher.fetch_all(&query, &location(), None).await.unwrap();

        let ids: Vec<&str> = outcome.summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["11111", "12345", "67890"]);
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(
            outcome.summaries[1].url,
            "https://www.rightmove.co.uk/properties/12345"
        );
    }

    #[tokio::test]
    async fn malformed_page_is_retried_then_recorded() {
        let transport = MockTransport::new()
            .route(
                "index=0&",
                r#"{"resultCount":"4","properties":[{"id":1},{"id":2}]}"#,
            )
            .route("index=2&", r#"{"error":"busy"}"#);
        let config = ScoutConfig {
            page_size: 2,
            ..config()
        };
        let fetcher = PaginatedSearchFetcher::new(&transport, &config);
        let query = SearchQuery::new("kent", TransactionKind::Buy);

        let outcome = fetcher.fetch_all(&query, &location(), None).await.unwrap();

        assert_eq!(transport.request_count(), 1 + 3);
        assert_eq!(outcome.summaries.len(), 2);
        assert_eq!(outcome.failed_pages.len(), 1);
        assert_eq!(outcome.failed_pages[0].offset, 2);
        let shortfall = outcome.shortfall.unwrap();
        assert_eq!(shortfall.failed_offsets, vec![2]);
        assert_eq!(shortfall.missing(), 2);
    }

    #[tokio::test]
    async fn first_page_failure_fails_the_search() {
        let transport = MockTransport::new().route("/api/_search", "<html>maintenance</html>");
        let config = config();
        let fetcher = PaginatedSearchFetcher::new(&transport, &config);
        let query = SearchQuery::new("kent", TransactionKind::Buy);

        let err = fetcher.fetch_all(&query, &location(), None).await.unwrap_err();
        assert!(matches!(err, ScoutError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn limit_stops_pagination_without_shortfall() {
        let transport = listing_api(1200);
        let config = config();
        let fetcher = PaginatedSearchFetcher::new(&transport, &config);
        let query = SearchQuery::new("kent", TransactionKind::Buy).with_limit(10);

        let outcome = fetcher.fetch_all(&query, &location(), None).await.unwrap();
        assert_eq!(transport.request_count(), 1);
        assert_eq!(outcome.summaries.len(), 10);
        assert!(outcome.shortfall.is_none());
    }

    #[tokio::test]
    async fn page_without_count_keeps_the_reported_total() {
        let transport = MockTransport::new()
            .route(
                "index=0&",
                r#"{"resultCount":"6","properties":[{"id":1},{"id":2}]}"#,
            )
            .route("index=2&", r#"{"properties":[{"id":3},{"id":4}]}"#)
            .route(
                "index=4&",
                r#"{"resultCount":"6","properties":[{"id":5},{"id":6}]}"#,
            );
        let config = ScoutConfig {
            page_size: 2,
            ..config()
        };
        let fetcher = PaginatedSearchFetcher::new(&transport, &config);
        let query = SearchQuery::new("kent", TransactionKind::Buy);

        let outcome = fetcher.fetch_all(&query, &location(), None).await.unwrap();

        assert_eq!(offsets(&transport), vec![0, 2, 4]);
        assert_eq!(outcome.reported_total, 6);
        assert_eq!(outcome.summaries.len(), 6);
        assert!(outcome.shortfall.is_none());
    }

    #[tokio::test]
    async fn shortfall_survives_a_page_without_count() {
        let transport = MockTransport::new()
            .route(
                "index=0&",
                r#"{"resultCount":"6","properties":[{"id":1},{"id":2}]}"#,
            )
            .route("index=2&", r#"{"properties":[{"id":3},{"id":4}]}"#)
            .route("index=4&", r#"{"error":"busy"}"#);
        let config = ScoutConfig {
            page_size: 2,
            ..config()
        };
        let fetcher = PaginatedSearchFetcher::new(&transport, &config);
        let query = SearchQuery::new("kent", TransactionKind::Buy);

        let outcome = fetcher.fetch_all(&query, &location(), None).await.unwrap();

        assert_eq!(outcome.reported_total, 6);
        assert_eq!(outcome.summaries.len(), 4);
        let shortfall = outcome.shortfall.expect("shortfall recorded");
        assert_eq!(shortfall.missing(), 2);
        assert_eq!(shortfall.failed_offsets, vec![4]);
    }

    #[test]
    fn missing_count_is_left_unset() {
        let site = Url::parse("https://www.rightmove.co.uk/").unwrap();
        let page = parse_search_page("https://example.test", r#"{"properties":[{"id":1}]}"#, &site)
            .unwrap();
        assert_eq!(page.result_count, None);
        assert_eq!(page.entries.len(), 1);
    }

    #[test]
    fn result_count_accepts_numbers_and_strings() {
        assert_eq!(parse_count(&json!("1,234")), Some(1234));
        assert_eq!(parse_count(&json!(87)), Some(87));
        assert_eq!(parse_count(&json!(null)), None);
    }
}
