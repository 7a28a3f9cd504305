use super::details::DetailPayload;
use super::search::SearchSummary;
use crate::error::ScoutError;
use crate::models::{
    Enrichment, InterestPoint, InterestPointKind, ListingRecord, LivingCosts, MediaItem,
    MediaKind, NormalizedListing, RoomRecord, Source, UtilityFeatures,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

static NULL: Value = Value::Null;

/// Defensive lookups over loosely shaped JSON. Missing keys, wrong types and
/// nulls all collapse to `Value::Null`, so chains like
/// `data.at("features").at("water")` never fail.
trait Lookup {
    fn at(&self, key: &str) -> &Value;
    fn first(&self) -> &Value;
    fn items(&self) -> &[Value];
    fn text(&self) -> Option<String>;
    fn number(&self) -> Option<f64>;
    fn count(&self) -> Option<u32>;
    fn flag(&self) -> Option<bool>;
}

impl Lookup for Value {
    fn at(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }

    fn first(&self) -> &Value {
        self.items().first().unwrap_or(&NULL)
    }

    fn items(&self) -> &[Value] {
        self.as_array().map(Vec::as_slice).unwrap_or(&[])
    }

    fn text(&self) -> Option<String> {
        match self {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect::<String>()
                .parse()
                .ok(),
            _ => None,
        }
    }

    fn count(&self) -> Option<u32> {
        match self {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn flag(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Maps search summaries and detail pages onto [`ListingRecord`].
///
/// Where a field exists on both levels the detail page wins.
pub struct RecordNormalizer {
    scraped_at: DateTime<Utc>,
}

impl RecordNormalizer {
    pub fn new(scraped_at: DateTime<Utc>) -> Self {
        Self { scraped_at }
    }

    /// Listing built only from the summary because the detail page failed.
    pub fn summary_only(&self, summary: &SearchSummary, failure: &ScoutError) -> NormalizedListing {
        let mut listing = self.normalize(summary, None);
        listing.record.enrichment = Enrichment::SummaryOnly {
            reason: Some(failure.kind()),
            message: Some(failure.to_string()),
        };
        listing
    }

    pub fn normalize(
        &self,
        summary: &SearchSummary,
        detail: Option<&DetailPayload>,
    ) -> NormalizedListing {
        let s = &summary.raw;
        let pd = detail.and_then(DetailPayload::property_data).unwrap_or(&NULL);
        let an = detail.and_then(DetailPayload::analytics).unwrap_or(&NULL);
        let id = summary.id.clone();

        let summary_price = s.at("price");
        let summary_display = summary_price.at("displayPrices").first();
        let address = pd.at("address");
        let prices = pd.at("prices");

        let record = ListingRecord {
            source: Source::Rightmove,
            id: id.clone(),
            url: summary.url.clone(),

            transaction_type: pd
                .at("transactionType")
                .text()
                .or_else(|| s.at("transactionType").text()),
            property_type: an.at("propertyType").text(),
            property_sub_type: an
                .at("propertySubType")
                .text()
                .or_else(|| pd.at("propertySubType").text())
                .or_else(|| s.at("propertySubType").text()),
            bedrooms: pd
                .at("bedrooms")
                .count()
                .or_else(|| an.at("beds").count())
                .or_else(|| s.at("bedrooms").count()),
            bathrooms: pd
                .at("bathrooms")
                .count()
                .or_else(|| s.at("bathrooms").count()),
            display_size: s.at("displaySize").text(),

            price: an.at("price").number().or_else(|| summary_price.at("amount").number()),
            currency: summary_price.at("currencyCode").text(),
            price_frequency: summary_price.at("frequency").text(),
            display_price: prices
                .at("primaryPrice")
                .text()
                .or_else(|| summary_display.at("displayPrice").text()),
            price_qualifier: prices
                .at("displayPriceQualifier")
                .text()
                .or_else(|| an.at("priceQualifier").text())
                .or_else(|| summary_display.at("displayPriceQualifier").text()),
            price_per_sq_ft: prices.at("pricePerSqFt").text(),
            fees_apply: pd.at("feesApply").flag().or_else(|| s.at("feesApply").flag()),
            fees_apply_text: pd
                .at("feesApplyText")
                .text()
                .or_else(|| s.at("feesApplyText").text()),

            address: address
                .at("displayAddress")
                .text()
                .or_else(|| s.at("displayAddress").text()),
            postcode: an.at("postcode").text().or_else(|| {
                let outcode = address.at("outcode").text()?;
                let incode = address.at("incode").text()?;
                Some(format!("{outcode} {incode}"))
            }),
            outcode: address.at("outcode").text(),
            incode: address.at("incode").text(),
            country_code: address
                .at("countryCode")
                .text()
                .or_else(|| s.at("countryCode").text()),
            latitude: pd
                .at("location")
                .at("latitude")
                .number()
                .or_else(|| s.at("location").at("latitude").number()),
            longitude: pd
                .at("location")
                .at("longitude")
                .number()
                .or_else(|| s.at("location").at("longitude").number()),

            summary: s.at("summary").text(),
            description: pd.at("text").at("description").text(),
            key_features: pd.at("keyFeatures").items().iter().filter_map(display_text).collect(),
            tenure_type: pd.at("tenure").at("tenureType").text(),
            years_remaining_on_lease: pd.at("tenure").at("yearsRemainingOnLease").count(),
            letting_type: an.at("lettingType").text(),
            pre_owned: an.at("preOwned").text(),

            agent_name: pd
                .at("customer")
                .at("branchDisplayName")
                .text()
                .or_else(|| s.at("customer").at("branchDisplayName").text()),
            agent_telephone: pd
                .at("contactInfo")
                .at("telephoneNumbers")
                .at("localNumber")
                .text()
                .or_else(|| s.at("customer").at("contactTelephone").text()),

            first_visible_date: s.at("firstVisibleDate").text(),
            added: an.at("added").text(),
            listing_update_reason: pd
                .at("listingHistory")
                .at("listingUpdateReason")
                .text()
                .or_else(|| s.at("listingUpdate").at("listingUpdateReason").text()),
            listing_update_date: s.at("listingUpdate").at("listingUpdateDate").text(),

            auction: pd.at("auction").flag().or_else(|| s.at("auction").flag()),
            auction_only: an.at("auctionOnly").flag(),
            let_agreed: an.at("letAgreed").flag(),
            sold_stc: an.at("soldSTC").flag(),
            retirement: an.at("retirement").flag(),
            shared_ownership: pd.at("sharedOwnership").at("sharedOwnership").flag(),
            business_for_sale: an.at("businessForSale").flag(),
            commercial: pd.at("commercial").flag().or_else(|| s.at("commercial").flag()),
            development: pd.at("development").flag().or_else(|| s.at("development").flag()),
            residential: s.at("residential").flag(),
            students: s.at("students").flag(),

            living_costs: living_costs(pd.at("livingCosts")),
            utilities: utility_features(pd.at("features")),

            enrichment: match detail {
                Some(_) => Enrichment::Detail,
                None => Enrichment::SummaryOnly {
                    reason: None,
                    message: None,
                },
            },
            scraped_at: self.scraped_at,
        };

        NormalizedListing {
            media: media(&id, pd, s),
            rooms: rooms(&id, pd.at("rooms")),
            interest_points: interest_points(&id, pd),
            record,
        }
    }
}

fn living_costs(costs: &Value) -> LivingCosts {
    LivingCosts {
        council_tax_exempt: costs.at("councilTaxExempt").flag(),
        council_tax_included: costs.at("councilTaxIncluded").flag(),
        council_tax_band: costs.at("councilTaxBand").text(),
        annual_ground_rent: costs.at("annualGroundRent").number(),
        ground_rent_review_period_years: costs.at("groundRentReviewPeriodInYears").count(),
        ground_rent_percentage_increase: costs.at("groundRentPercentageIncrease").number(),
        annual_service_charge: costs.at("annualServiceCharge").number(),
        domestic_rates: costs.at("domesticRates").number(),
    }
}

fn utility_features(features: &Value) -> UtilityFeatures {
    UtilityFeatures {
        electricity: display_strings(features.at("electricity")),
        broadband: display_strings(features.at("broadband")),
        water: display_strings(features.at("water")),
        sewerage: display_strings(features.at("sewerage")),
        heating: display_strings(features.at("heating")),
        accessibility: display_strings(features.at("accessibility")),
        parking: display_strings(features.at("parking")),
        garden: display_strings(features.at("garden")),
        risks: display_strings(features.at("risks")),
        obligations: display_strings(features.at("obligations")),
    }
}

/// Feature entries are plain strings or `{displayText: ..}` objects.
fn display_text(value: &Value) -> Option<String> {
    value
        .text()
        .or_else(|| value.at("displayText").text())
        .or_else(|| value.at("text").text())
}

fn display_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(display_text).collect(),
        Value::Object(fields) => fields
            .iter()
            .filter_map(|(key, field)| match field {
                Value::Bool(b) => Some(format!("{key}: {b}")),
                other => other.text().map(|text| format!("{key}: {text}")),
            })
            .collect(),
        other => other.text().into_iter().collect(),
    }
}

fn media(listing_id: &str, pd: &Value, summary: &Value) -> Vec<MediaItem> {
    let mut items = Vec::new();

    let detail_images = pd.at("images").items();
    let images = if detail_images.is_empty() {
        summary.at("propertyImages").at("images").items()
    } else {
        detail_images
    };

    let groups = [
        (MediaKind::Image, images),
        (MediaKind::Floorplan, pd.at("floorplans").items()),
        (MediaKind::VirtualTour, pd.at("virtualTours").items()),
        (MediaKind::Brochure, pd.at("brochures").items()),
        (MediaKind::EpcGraph, pd.at("epcGraphs").items()),
    ];

    for (kind, entries) in groups {
        let urls = entries.iter().filter_map(|entry| {
            // search summaries carry a relative `url` next to the absolute `srcUrl`
            let url = entry
                .at("srcUrl")
                .text()
                .or_else(|| entry.at("url").text())?;
            Some((url, entry.at("caption").text()))
        });
        for (position, (url, caption)) in urls.enumerate() {
            items.push(MediaItem {
                listing_id: listing_id.to_string(),
                kind,
                position,
                url,
                caption,
            });
        }
    }
    items
}

fn rooms(listing_id: &str, rooms: &Value) -> Vec<RoomRecord> {
    rooms
        .items()
        .iter()
        .enumerate()
        .map(|(position, room)| RoomRecord {
            listing_id: listing_id.to_string(),
            position,
            name: room.at("name").text(),
            description: room.at("description").text(),
            width: room.at("width").number(),
            length: room.at("length").number(),
            unit: room.at("unit").text(),
            dimension: room.at("dimension").text(),
        })
        .collect()
}

fn interest_points(listing_id: &str, pd: &Value) -> Vec<InterestPoint> {
    let groups = [
        (InterestPointKind::Station, pd.at("nearestStations").items()),
        (InterestPointKind::Airport, pd.at("nearestAirports").items()),
    ];

    groups
        .into_iter()
        .flat_map(|(kind, entries)| {
            entries
                .iter()
                .enumerate()
                .map(move |(position, point)| InterestPoint {
                    listing_id: listing_id.to_string(),
                    kind,
                    position,
                    name: point.at("name").text(),
                    distance: point.at("distance").number(),
                    unit: point.at("unit").text(),
                })
        })
        .collect()
}
