use crate::error::FailureKind;
use crate::scrapers::types::SearchQuery;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written into every result set.
pub const SCHEMA_VERSION: &str = "1.0";

/// Source of the property listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Source {
    Rightmove,
}

impl Source {
    pub fn name(self) -> &'static str {
        match self {
            Source::Rightmove => "Rightmove",
        }
    }
}

/// How much of a listing could be extracted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Enrichment {
    /// Summary merged with the detail page
    Detail,
    /// Fields come from the search summary only. `reason` is set when the
    /// detail page was attempted and failed.
    SummaryOnly {
        reason: Option<FailureKind>,
        message: Option<String>,
    },
}

/// Ongoing costs published on the detail page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LivingCosts {
    pub council_tax_exempt: Option<bool>,
    pub council_tax_included: Option<bool>,
    pub council_tax_band: Option<String>,
    pub annual_ground_rent: Option<f64>,
    pub ground_rent_review_period_years: Option<u32>,
    pub ground_rent_percentage_increase: Option<f64>,
    pub annual_service_charge: Option<f64>,
    pub domestic_rates: Option<f64>,
}

/// Utility and material information, each as the provider's display strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UtilityFeatures {
    pub electricity: Vec<String>,
    pub broadband: Vec<String>,
    pub water: Vec<String>,
    pub sewerage: Vec<String>,
    pub heating: Vec<String>,
    pub accessibility: Vec<String>,
    pub parking: Vec<String>,
    pub garden: Vec<String>,
    pub risks: Vec<String>,
    pub obligations: Vec<String>,
}

/// Flat, normalized listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub source: Source,
    pub id: String,
    pub url: String,

    pub transaction_type: Option<String>,
    pub property_type: Option<String>,
    pub property_sub_type: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub display_size: Option<String>,

    pub price: Option<f64>,
    pub currency: Option<String>,
    pub price_frequency: Option<String>,
    pub display_price: Option<String>,
    pub price_qualifier: Option<String>,
    pub price_per_sq_ft: Option<String>,
    pub fees_apply: Option<bool>,
    pub fees_apply_text: Option<String>,

    pub address: Option<String>,
    pub postcode: Option<String>,
    pub outcode: Option<String>,
    pub incode: Option<String>,
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub summary: Option<String>,
    pub description: Option<String>,
    pub key_features: Vec<String>,
    pub tenure_type: Option<String>,
    pub years_remaining_on_lease: Option<u32>,
    pub letting_type: Option<String>,
    pub pre_owned: Option<String>,

    pub agent_name: Option<String>,
    pub agent_telephone: Option<String>,

    pub first_visible_date: Option<String>,
    pub added: Option<String>,
    pub listing_update_reason: Option<String>,
    pub listing_update_date: Option<String>,

    pub auction: Option<bool>,
    pub auction_only: Option<bool>,
    pub let_agreed: Option<bool>,
    pub sold_stc: Option<bool>,
    pub retirement: Option<bool>,
    pub shared_ownership: Option<bool>,
    pub business_for_sale: Option<bool>,
    pub commercial: Option<bool>,
    pub development: Option<bool>,
    pub residential: Option<bool>,
    pub students: Option<bool>,

    pub living_costs: LivingCosts,
    pub utilities: UtilityFeatures,

    pub enrichment: Enrichment,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Floorplan,
    VirtualTour,
    Brochure,
    EpcGraph,
}

/// One image, floorplan, tour, brochure or EPC graph of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    pub listing_id: String,
    pub kind: MediaKind,
    pub position: usize,
    pub url: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomRecord {
    pub listing_id: String,
    pub position: usize,
    pub name: Option<String>,
    pub description: Option<String>,
    pub width: Option<f64>,
    pub length: Option<f64>,
    pub unit: Option<String>,
    pub dimension: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InterestPointKind {
    Station,
    Airport,
}

/// Nearby station or airport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterestPoint {
    pub listing_id: String,
    pub kind: InterestPointKind,
    pub position: usize,
    pub name: Option<String>,
    pub distance: Option<f64>,
    pub unit: Option<String>,
}

/// A listing plus the side-table rows that reference it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedListing {
    pub record: ListingRecord,
    pub media: Vec<MediaItem>,
    pub rooms: Vec<RoomRecord>,
    pub interest_points: Vec<InterestPoint>,
}

/// Matches the search API reported but pagination could not reach.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageShortfall {
    pub total_results: u64,
    pub retrieved: u64,
    /// Entries at or beyond the provider's offset ceiling
    pub beyond_ceiling: u64,
    /// Offsets of pages that still failed after retries
    pub failed_offsets: Vec<usize>,
}

impl CoverageShortfall {
    pub fn missing(&self) -> u64 {
        self.total_results.saturating_sub(self.retrieved)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageFailure {
    pub offset: usize,
    pub reason: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingFailure {
    pub listing_id: String,
    pub url: String,
    pub reason: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineStatus {
    Completed,
    /// Search succeeded but matched nothing
    Empty,
    Failed { reason: FailureKind, message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineCounts {
    pub reported_total: u64,
    pub summaries: usize,
    pub duplicates_dropped: usize,
    pub details_fetched: usize,
    pub details_failed: usize,
}

/// Everything one search engine produced in a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineResult {
    pub status: EngineStatus,
    pub counts: EngineCounts,
    pub listings: Vec<ListingRecord>,
    pub media: Vec<MediaItem>,
    pub rooms: Vec<RoomRecord>,
    pub interest_points: Vec<InterestPoint>,
    pub coverage_shortfall: Option<CoverageShortfall>,
    pub failed_pages: Vec<PageFailure>,
    pub degraded_listings: Vec<ListingFailure>,
}

impl EngineResult {
    pub fn failed(reason: FailureKind, message: String) -> Self {
        Self::with_status(EngineStatus::Failed { reason, message })
    }

    pub fn with_status(status: EngineStatus) -> Self {
        Self {
            status,
            counts: EngineCounts::default(),
            listings: Vec::new(),
            media: Vec::new(),
            rooms: Vec::new(),
            interest_points: Vec::new(),
            coverage_shortfall: None,
            failed_pages: Vec::new(),
            degraded_listings: Vec::new(),
        }
    }

    pub fn push(&mut self, listing: NormalizedListing) {
        self.listings.push(listing.record);
        self.media.extend(listing.media);
        self.rooms.extend(listing.rooms);
        self.interest_points.extend(listing.interest_points);
    }
}

/// Unit handed to persistence: run metadata plus per-engine results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResultSet {
    pub version: String,
    pub search_params: SearchQuery,
    pub search_date: DateTime<Utc>,
    pub search_results: BTreeMap<String, EngineResult>,
}

impl SearchResultSet {
    pub fn new(search_params: SearchQuery, search_date: DateTime<Utc>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            search_params,
            search_date,
            search_results: BTreeMap::new(),
        }
    }

    pub fn listing_count(&self) -> usize {
        self.search_results.values().map(|r| r.listings.len()).sum()
    }

    pub fn listings(&self) -> impl Iterator<Item = &ListingRecord> {
        self.search_results.values().flat_map(|r| r.listings.iter())
    }
}
