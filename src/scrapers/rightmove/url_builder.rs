use super::location::LocationIdentifier;
use crate::scrapers::types::SearchQuery;
use url::Url;

/// `sortType` the search API is queried with.
const SORT_TYPE: &str = "2";

/// Compose the search API request for one page.
///
/// Only filters present in `query` are emitted. List filters are sent as one
/// comma-joined value (`%2C` once encoded). The view, unit and currency
/// parameters are fixed. Validation is the caller's job: the builder trusts
/// `query` to be valid.
pub fn build_search_url(
    search_api: &Url,
    query: &SearchQuery,
    location: &LocationIdentifier,
    index: usize,
    page_size: usize,
) -> String {
    let mut url = search_api.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.append_pair("locationIdentifier", &location.to_string());
        pairs.append_pair("channel", query.transaction.channel());
        pairs.append_pair("sortType", SORT_TYPE);

        if let Some(radius) = query.radius {
            pairs.append_pair("radius", &radius.to_string());
        }
        if let Some(min_price) = query.min_price {
            pairs.append_pair("minPrice", &min_price.to_string());
        }
        if let Some(max_price) = query.max_price {
            pairs.append_pair("maxPrice", &max_price.to_string());
        }
        if let Some(min_bedrooms) = query.min_bedrooms {
            pairs.append_pair("minBedrooms", &min_bedrooms.to_string());
        }
        if let Some(max_bedrooms) = query.max_bedrooms {
            pairs.append_pair("maxBedrooms", &max_bedrooms.to_string());
        }
        if !query.property_types.is_empty() {
            pairs.append_pair(
                "propertyTypes",
                &join_tokens(query.property_types.iter().map(|t| t.token())),
            );
        }
        if let Some(window) = query.max_days_since_added {
            pairs.append_pair("maxDaysSinceAdded", &window.days().to_string());
        }
        if query.include_sstc {
            pairs.append_pair("includeSSTC", "true");
        }
        if !query.must_have.is_empty() {
            pairs.append_pair(
                "mustHave",
                &join_tokens(query.must_have.iter().map(|f| f.token())),
            );
        }
        if !query.dont_show.is_empty() {
            pairs.append_pair(
                "dontShow",
                &join_tokens(query.dont_show.iter().map(|k| k.token())),
            );
        }

        pairs.append_pair("index", &index.to_string());
        pairs.append_pair("numberOfPropertiesPerPage", &page_size.to_string());
        pairs.append_pair("viewType", "LIST");
        pairs.append_pair("areaSizeUnit", "sqft");
        pairs.append_pair("currencyCode", "GBP");
        pairs.append_pair("isFetching", "false");
    }
    url.into()
}

fn join_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    tokens.collect::<Vec<_>>().join(",")
}
