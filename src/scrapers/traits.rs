use crate::error::Result;
use crate::models::EngineResult;
use crate::scrapers::transport::Transport;
use crate::scrapers::types::SearchQuery;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Per-run state shared by every engine.
pub struct RunContext<'a> {
    pub transport: &'a dyn Transport,
    /// Network calls still pending at this instant fail with a timeout
    pub deadline: Option<Instant>,
    pub scraped_at: DateTime<Utc>,
}

/// Common trait for all listing search engines.
/// New marketplaces plug into the pipeline by implementing this.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Run `query` against the marketplace.
    ///
    /// Partial problems (failed pages, degraded listings) are recorded inside
    /// the returned [`EngineResult`]; `Err` means nothing usable came back.
    async fn search(&self, query: &SearchQuery, ctx: &RunContext<'_>) -> Result<EngineResult>;

    /// Key the engine's results are stored under
    fn source_name(&self) -> &'static str;
}
