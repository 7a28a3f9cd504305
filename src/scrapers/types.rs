use crate::error::{Result, ScoutError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Highest bedroom count the marketplace filters on.
pub const MAX_BEDROOMS: u32 = 10;

/// Buy or rent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[default]
    Buy,
    Rent,
}

impl TransactionKind {
    /// Value of the `channel` search parameter.
    pub fn channel(self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Rent => "RENT",
        }
    }
}

/// Property types accepted by the `propertyTypes` filter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    Bungalow,
    Detached,
    Flat,
    Land,
    ParkHome,
    SemiDetached,
    Terraced,
}

impl PropertyType {
    pub fn token(self) -> &'static str {
        match self {
            PropertyType::Bungalow => "bungalow",
            PropertyType::Detached => "detached",
            PropertyType::Flat => "flat",
            PropertyType::Land => "land",
            PropertyType::ParkHome => "park-home",
            PropertyType::SemiDetached => "semi-detached",
            PropertyType::Terraced => "terraced",
        }
    }
}

/// Features accepted by the `mustHave` filter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum MustHave {
    Garden,
    Parking,
    NewHome,
    Retirement,
    SharedOwnership,
    Auction,
}

impl MustHave {
    pub fn token(self) -> &'static str {
        match self {
            MustHave::Garden => "garden",
            MustHave::Parking => "parking",
            MustHave::NewHome => "newHome",
            MustHave::Retirement => "retirement",
            MustHave::SharedOwnership => "sharedOwnership",
            MustHave::Auction => "auction",
        }
    }
}

/// Listing kinds accepted by the `dontShow` filter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum DontShow {
    NewHome,
    Retirement,
    SharedOwnership,
}

impl DontShow {
    pub fn token(self) -> &'static str {
        match self {
            DontShow::NewHome => "newHome",
            DontShow::Retirement => "retirement",
            DontShow::SharedOwnership => "sharedOwnership",
        }
    }
}

/// `maxDaysSinceAdded` only accepts these values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u32", into = "u32")]
pub enum RecencyWindow {
    OneDay,
    ThreeDays,
    SevenDays,
    FourteenDays,
}

impl RecencyWindow {
    pub fn days(self) -> u32 {
        match self {
            RecencyWindow::OneDay => 1,
            RecencyWindow::ThreeDays => 3,
            RecencyWindow::SevenDays => 7,
            RecencyWindow::FourteenDays => 14,
        }
    }
}

impl TryFrom<u32> for RecencyWindow {
    type Error = String;

    fn try_from(days: u32) -> std::result::Result<Self, Self::Error> {
        match days {
            1 => Ok(RecencyWindow::OneDay),
            3 => Ok(RecencyWindow::ThreeDays),
            7 => Ok(RecencyWindow::SevenDays),
            14 => Ok(RecencyWindow::FourteenDays),
            other => Err(format!(
                "recency window must be one of 1, 3, 7, 14 days (got {other})"
            )),
        }
    }
}

impl From<RecencyWindow> for u32 {
    fn from(window: RecencyWindow) -> Self {
        window.days()
    }
}

/// Search parameters for one run.
///
/// Bedroom bounds use `Some(0)` for studios; `None` leaves the bound unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchQuery {
    /// Free text: town, region, postcode or station
    pub location: String,
    pub transaction: TransactionKind,
    /// Search radius in miles
    pub radius: Option<f64>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub min_bedrooms: Option<u32>,
    pub max_bedrooms: Option<u32>,
    pub property_types: BTreeSet<PropertyType>,
    pub max_days_since_added: Option<RecencyWindow>,
    /// Include sold-subject-to-contract listings
    pub include_sstc: bool,
    pub must_have: BTreeSet<MustHave>,
    pub dont_show: BTreeSet<DontShow>,
    /// Maximum number of listings to return
    pub limit: Option<usize>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            location: "London".to_string(),
            transaction: TransactionKind::Buy,
            radius: Some(1.0),
            min_price: None,
            max_price: None,
            min_bedrooms: None,
            max_bedrooms: None,
            property_types: BTreeSet::new(),
            max_days_since_added: None,
            include_sstc: false,
            must_have: BTreeSet::new(),
            dont_show: BTreeSet::new(),
            limit: None,
        }
    }
}

impl SearchQuery {
    pub fn new(location: impl Into<String>, transaction: TransactionKind) -> Self {
        Self {
            location: location.into(),
            transaction,
            radius: None,
            ..Self::default()
        }
    }

    pub fn with_radius(mut self, miles: f64) -> Self {
        self.radius = Some(miles);
        self
    }

    pub fn with_price_range(mut self, min: Option<u64>, max: Option<u64>) -> Result<Self> {
        check_bounds("price", min, max)?;
        self.min_price = min;
        self.max_price = max;
        Ok(self)
    }

    pub fn with_bedrooms(mut self, min: Option<u32>, max: Option<u32>) -> Result<Self> {
        check_bounds("bedrooms", min, max)?;
        self.min_bedrooms = min;
        self.max_bedrooms = max;
        Ok(self)
    }

    pub fn with_property_types(mut self, types: impl IntoIterator<Item = PropertyType>) -> Self {
        self.property_types = types.into_iter().collect();
        self
    }

    pub fn with_must_have(mut self, features: impl IntoIterator<Item = MustHave>) -> Self {
        self.must_have = features.into_iter().collect();
        self
    }

    pub fn with_dont_show(mut self, kinds: impl IntoIterator<Item = DontShow>) -> Self {
        self.dont_show = kinds.into_iter().collect();
        self
    }

    pub fn with_max_days_since_added(mut self, window: RecencyWindow) -> Self {
        self.max_days_since_added = Some(window);
        self
    }

    pub fn with_sstc(mut self, include: bool) -> Self {
        self.include_sstc = include;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject queries the search API cannot express.
    ///
    /// Queries loaded from files bypass the builder methods, so the pipeline
    /// calls this before any network traffic.
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            return Err(ScoutError::InvalidQuery("location was not provided".into()));
        }
        check_bounds("price", self.min_price, self.max_price)?;
        check_bounds("bedrooms", self.min_bedrooms, self.max_bedrooms)?;
        for bound in [self.min_bedrooms, self.max_bedrooms].into_iter().flatten() {
            if bound > MAX_BEDROOMS {
                return Err(ScoutError::InvalidQuery(format!(
                    "bedrooms must be at most {MAX_BEDROOMS} (got {bound})"
                )));
            }
        }
        if let Some(radius) = self.radius {
            if !radius.is_finite() || radius < 0.0 {
                return Err(ScoutError::InvalidQuery(format!(
                    "radius must be a non-negative number of miles (got {radius})"
                )));
            }
        }
        if self.limit == Some(0) {
            return Err(ScoutError::InvalidQuery("limit must be positive".into()));
        }
        Ok(())
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.transaction {
            TransactionKind::Buy => "for sale",
            TransactionKind::Rent => "to rent",
        };
        write!(f, "properties {verb} in {}", self.location)
    }
}

fn check_bounds<T: PartialOrd + fmt::Display>(
    name: &str,
    min: Option<T>,
    max: Option<T>,
) -> Result<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(ScoutError::InvalidQuery(format!(
            "minimum {name} {min} exceeds maximum {max}"
        ))),
        _ => Ok(()),
    }
}
