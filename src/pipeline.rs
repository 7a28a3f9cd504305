use crate::config::ScoutConfig;
use crate::error::Result;
use crate::models::{EngineResult, EngineStatus, SearchResultSet};
use crate::scrapers::{HttpTransport, RightmoveScraper, RunContext, SearchEngine, Transport};
use crate::scrapers::types::SearchQuery;
use crate::storage::ResultSink;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Runs a query through every configured engine and collects the results.
pub struct SearchPipeline {
    config: ScoutConfig,
    engines: Vec<Box<dyn SearchEngine>>,
    transport: Option<Arc<dyn Transport>>,
}

impl SearchPipeline {
    /// Pipeline with the default engine set.
    pub fn new(config: ScoutConfig) -> Self {
        let engines: Vec<Box<dyn SearchEngine>> =
            vec![Box::new(RightmoveScraper::new(config.clone()))];
        Self {
            config,
            engines,
            transport: None,
        }
    }

    pub fn with_engines(mut self, engines: Vec<Box<dyn SearchEngine>>) -> Self {
        self.engines = engines;
        self
    }

    /// Use `transport` instead of building an HTTP client per run.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Run `query` against all engines.
    ///
    /// Only an invalid query or a client that cannot be built fail the run.
    /// Engine errors are recorded under the engine's name and the remaining
    /// engines still run.
    pub async fn run(&self, query: &SearchQuery) -> Result<SearchResultSet> {
        query.validate()?;

        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(HttpTransport::new(&self.config)?),
        };

        let started = Utc::now();
        let ctx = RunContext {
            transport: transport.as_ref(),
            deadline: self.config.run_deadline.map(|limit| Instant::now() + limit),
            scraped_at: started,
        };

        let mut results = SearchResultSet::new(query.clone(), started);
        for engine in &self.engines {
            let name = engine.source_name();
            info!(engine = name, "Searching {}", query);

            let result = match engine.search(query, &ctx).await {
                Ok(result) => {
                    match &result.status {
                        EngineStatus::Empty => warn!(engine = name, "No results found"),
                        _ => info!(
                            engine = name,
                            "Collected {} listings ({} reported)",
                            result.listings.len(),
                            result.counts.reported_total
                        ),
                    }
                    if let Some(shortfall) = &result.coverage_shortfall {
                        warn!(
                            engine = name,
                            "Coverage shortfall: {} of {} matches not retrieved",
                            shortfall.missing(),
                            shortfall.total_results
                        );
                    }
                    result
                }
                Err(e) => {
                    error!(engine = name, "Search failed: {}", e);
                    EngineResult::failed(e.kind(), e.to_string())
                }
            };
            results.search_results.insert(name.to_string(), result);
        }

        Ok(results)
    }

    /// [`run`](Self::run), then hand the result set to `sink`.
    pub async fn run_and_persist(
        &self,
        query: &SearchQuery,
        sink: &dyn ResultSink,
    ) -> Result<SearchResultSet> {
        let results = self.run(query).await?;
        sink.save(&results).await?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, ScoutError};
    use crate::scrapers::testing::MockTransport;
    use crate::scrapers::types::TransactionKind;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedEngine {
        name: &'static str,
        outcome: fn() -> Result<EngineResult>,
    }

    #[async_trait]
    impl SearchEngine for FixedEngine {
        async fn search(&self, _: &SearchQuery, _: &RunContext<'_>) -> Result<EngineResult> {
            (self.outcome)()
        }

        fn source_name(&self) -> &'static str {
            self.name
        }
    }

    fn pipeline(engines: Vec<Box<dyn SearchEngine>>) -> SearchPipeline {
        let config = ScoutConfig {
            retry_delay: Duration::ZERO,
            ..ScoutConfig::default()
        };
        SearchPipeline::new(config)
            .with_engines(engines)
            .with_transport(Arc::new(MockTransport::new()))
    }

    #[tokio::test]
    async fn failing_engine_does_not_stop_the_others() {
        let pipeline = pipeline(vec![
            Box::new(FixedEngine {
                name: "Broken",
                outcome: || {
                    Err(ScoutError::UnresolvedLocation {
                        location: "Atlantis".into(),
                    })
                },
            }),
            Box::new(FixedEngine {
                name: "Quiet",
                outcome: || Ok(EngineResult::with_status(EngineStatus::Empty)),
            }),
        ]);
        let query = SearchQuery::new("Atlantis", TransactionKind::Buy);

        let results = pipeline.run(&query).await.unwrap();

        assert_eq!(results.version, "1.0");
        assert_eq!(results.search_params, query);
        assert_eq!(
            results.search_results["Broken"].status,
            EngineStatus::Failed {
                reason: FailureKind::UnresolvedLocation,
                message: "No location matches for 'Atlantis'".into(),
            }
        );
        assert_eq!(results.search_results["Quiet"].status, EngineStatus::Empty);
    }

    #[tokio::test]
    async fn invalid_query_is_rejected_before_any_request() {
        let pipeline = pipeline(Vec::new());
        let query = SearchQuery::new("  ", TransactionKind::Buy);

        let err = pipeline.run(&query).await.unwrap_err();
        assert!(matches!(err, ScoutError::InvalidQuery(_)));
    }
}
