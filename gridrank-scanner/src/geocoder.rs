use crate::client::{USER_AGENT, join_endpoint};
use crate::error::{Result, ScanError};
use crate::result::Coordinate;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Address keys consulted, most specific settlement first.
const LOCALITY_KEYS: [&str; 6] = ["town", "city", "village", "hamlet", "suburb", "municipality"];

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a coordinate to a locality name, if it has one.
    async fn reverse(&self, at: Coordinate) -> Result<Option<String>>;

    /// Resolve a place name to a coordinate.
    async fn forward(&self, query: &str) -> Result<Option<Coordinate>>;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

/// Client for Nominatim-compatible geocoding servers.
#[derive(Clone)]
pub struct NominatimGeocoder {
    client: Client,
    reverse_url: Url,
    search_url: Url,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            reverse_url: join_endpoint(base_url, "reverse")?,
            search_url: join_endpoint(base_url, "search")?,
        })
    }
}

pub fn pick_locality(address: &HashMap<String, String>) -> Option<String> {
    LOCALITY_KEYS
        .iter()
        .filter_map(|key| address.get(*key))
        .map(|name| name.trim())
        .find(|name| !name.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, at: Coordinate) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.reverse_url.clone())
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", at.latitude.to_string()),
                ("lon", at.longitude.to_string()),
                ("zoom", "14".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        // Nominatim answers {"error": "..."} with 200 for open water etc.
        let parsed: ReverseResponse = response
            .json()
            .await
            .map_err(|e| ScanError::ParseError(format!("reverse geocode: {}", e)))?;

        let locality = pick_locality(&parsed.address);
        debug!(
            "Reverse geocoded {:.5},{:.5} -> {:?}",
            at.latitude, at.longitude, locality
        );
        Ok(locality)
    }

    async fn forward(&self, query: &str) -> Result<Option<Coordinate>> {
        let response = self
            .client
            .get(self.search_url.clone())
            .query(&[("format", "jsonv2"), ("q", query), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let hits: Vec<SearchHit> = response
            .json()
            .await
            .map_err(|e| ScanError::ParseError(format!("forward geocode: {}", e)))?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let latitude = hit
            .lat
            .parse::<f64>()
            .map_err(|e| ScanError::ParseError(format!("latitude '{}': {}", hit.lat, e)))?;
        let longitude = hit
            .lon
            .parse::<f64>()
            .map_err(|e| ScanError::ParseError(format!("longitude '{}': {}", hit.lon, e)))?;

        Ok(Some(Coordinate::new(latitude, longitude)))
    }
}
