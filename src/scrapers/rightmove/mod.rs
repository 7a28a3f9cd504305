//! Rightmove search engine.
//!
//! A run resolves the free-text location, walks the paginated search API,
//! fetches every listing page with bounded concurrency and merges both levels
//! into flat records.

pub mod details;
pub mod location;
pub mod normalize;
pub mod search;
pub mod url_builder;

pub use details::{extract_page_model, first_json_object, DetailPayload, ListingDetailFetcher};
pub use location::{normalize_location, LocationIdentifier, LocationResolver};
pub use normalize::RecordNormalizer;
pub use search::{PaginatedSearchFetcher, SearchOutcome, SearchSummary};
pub use url_builder::build_search_url;

use crate::config::ScoutConfig;
use crate::error::Result;
use crate::models::{EngineResult, EngineStatus, ListingFailure, Source};
use crate::scrapers::retry::{within_deadline, RetryPolicy};
use crate::scrapers::traits::{RunContext, SearchEngine};
use crate::scrapers::types::SearchQuery;
use async_trait::async_trait;
use tracing::{info, warn};

pub struct RightmoveScraper {
    config: ScoutConfig,
    resolver: LocationResolver,
}

impl RightmoveScraper {
    pub fn new(config: ScoutConfig) -> Self {
        let resolver = LocationResolver::new(
            config.endpoints.typeahead.clone(),
            RetryPolicy::from_config(&config),
        );
        Self { config, resolver }
    }
}

#[async_trait]
impl SearchEngine for RightmoveScraper {
    async fn search(&self, query: &SearchQuery, ctx: &RunContext<'_>) -> Result<EngineResult> {
        let location = within_deadline(
            ctx.deadline,
            self.config.endpoints.typeahead.as_str(),
            self.resolver.resolve(ctx.transport, &query.location),
        )
        .await?;

        let searcher = PaginatedSearchFetcher::new(ctx.transport, &self.config);
        let outcome = searcher.fetch_all(query, &location, ctx.deadline).await?;

        let mut result = EngineResult::with_status(EngineStatus::Completed);
        result.counts.reported_total = outcome.reported_total;
        result.counts.summaries = outcome.summaries.len();
        result.counts.duplicates_dropped = outcome.duplicates_dropped;
        result.coverage_shortfall = outcome.shortfall;
        result.failed_pages = outcome.failed_pages;

        if outcome.summaries.is_empty() {
            info!("No listings found for {}", query);
            result.status = EngineStatus::Empty;
            return Ok(result);
        }

        let urls: Vec<String> = outcome.summaries.iter().map(|s| s.url.clone()).collect();
        let details = ListingDetailFetcher::new(ctx.transport, &self.config)
            .fetch_details(&urls, ctx.deadline)
            .await;

        let normalizer = RecordNormalizer::new(ctx.scraped_at);
        for summary in &outcome.summaries {
            let listing = match details.get(&summary.url) {
                Some(Ok(detail)) => {
                    result.counts.details_fetched += 1;
                    normalizer.normalize(summary, Some(detail))
                }
                Some(Err(e)) => {
                    result.counts.details_failed += 1;
                    result.degraded_listings.push(ListingFailure {
                        listing_id: summary.id.clone(),
                        url: summary.url.clone(),
                        reason: e.kind(),
                        message: e.to_string(),
                    });
                    normalizer.summary_only(summary, e)
                }
                None => {
                    warn!("No detail outcome recorded for {}", summary.url);
                    normalizer.normalize(summary, None)
                }
            };
            result.push(listing);
        }

        info!(
            "{}: {} listings ({} enriched, {} summary only)",
            self.source_name(),
            result.listings.len(),
            result.counts.details_fetched,
            result.counts.details_failed
        );
        Ok(result)
    }

    fn source_name(&self) -> &'static str {
        Source::Rightmove.name()
    }
}
