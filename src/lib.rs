//! Search-and-scrape pipeline for the Rightmove property marketplace.
//!
//! A [`SearchQuery`] goes through location resolution, paginated search,
//! concurrent detail-page extraction and normalization, and comes out as a
//! [`SearchResultSet`] of flat [`ListingRecord`]s plus their media, room and
//! nearby-place side tables.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod scrapers;
pub mod storage;

pub use config::ScoutConfig;
pub use error::{FailureKind, Result, ScoutError};
pub use models::{EngineResult, EngineStatus, ListingRecord, SearchResultSet};
pub use pipeline::SearchPipeline;
pub use scrapers::types::{SearchQuery, TransactionKind};
pub use scrapers::{SearchEngine, Transport};
pub use storage::{JsonStore, ResultSink};
