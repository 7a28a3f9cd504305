use async_trait::async_trait;
use rightmove_scout::{Result, ScoutError, Transport};
use std::sync::Mutex;

/// Serves fixed bodies by URL substring; the first matching route wins.
#[derive(Default)]
pub struct FixtureTransport {
    routes: Vec<(String, String)>,
    requests: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn route(mut self, pattern: &str, body: impl Into<String>) -> Self {
        self.routes.push((pattern.to_string(), body.into()));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        self.routes
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| ScoutError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
    }
}

pub const TYPEAHEAD_SY3: &str =
    r#"{"matches":[{"type":"POSTCODE","id":"4203018","displayName":"SY3 9EB"}]}"#;

pub fn search_page(total: &str, ids: &[u64]) -> String {
    let properties: Vec<String> = ids
        .iter()
        .map(|id| {
            format!(
                r#"{{"id":{id},"bedrooms":2,"bathrooms":1,"displayAddress":"{id} Abbey Foregate, Shrewsbury",
                    "location":{{"latitude":52.70713,"longitude":-2.73982}},
                    "price":{{"amount":250000,"currencyCode":"GBP","frequency":"not specified",
                              "displayPrices":[{{"displayPrice":"£250,000","displayPriceQualifier":""}}]}},
                    "propertyUrl":"/properties/{id}#/?channel=RES_BUY","transactionType":"buy"}}"#
            )
        })
        .collect();
    format!(
        r#"{{"resultCount":"{total}","properties":[{}]}}"#,
        properties.join(",")
    )
}

pub fn detail_page(id: u64, price: f64) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>Listing {id}</title></head><body>
        <script>
            window.PAGE_MODEL = {{
                "propertyData": {{
                    "id": "{id}",
                    "bedrooms": 3,
                    "text": {{"description": "Victorian semi with a walled garden."}},
                    "prices": {{"primaryPrice": "£{price}", "displayPriceQualifier": "Offers Over"}},
                    "address": {{"displayAddress": "Abbey Foregate, Shrewsbury SY3 9EB", "outcode": "SY3", "incode": "9EB"}},
                    "floorplans": [{{"url": "https://media.example/{id}/floorplan.png", "caption": "Ground floor"}}],
                    "rooms": [{{"name": "Kitchen", "width": 3.35, "length": 4.2, "unit": "m"}}],
                    "nearestStations": [{{"name": "Shrewsbury", "distance": 0.75, "unit": "miles"}}],
                    "location": {{"latitude": 52.707131, "longitude": -2.739823}}
                }},
                "analyticsInfo": {{"analyticsProperty": {{"postcode": "SY3 9EB", "price": {price}, "propertyType": "Houses"}}}}
            }}
        </script></body></html>"#
    )
}
