//! Address geocoding
//!
//! Thin client for the Nominatim search endpoint, used for one-off address
//! checks before a site import. Lookups are spaced at least one second
//! apart by a sleeping throttle; that spacing is the provider's usage
//! policy, not a tunable.

use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Nominatim search endpoint.
const NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

/// Minimum spacing between successive lookups, per the usage policy.
const MIN_CALL_INTERVAL: Duration = Duration::from_secs(1);

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failures a lookup can produce. Geocoding is a standalone collaborator,
/// so its errors stay out of the workflow taxonomy.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Connection, TLS, or timeout failure.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider returned no match for the address.
    #[error("no results found for the provided address")]
    NoResults,
}

/// First match for a free-text address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub latitude: String,
    pub longitude: String,
    pub display_name: String,
}

/// Rate-limited Nominatim client.
pub struct GeocodeClient {
    http: reqwest::Client,
    endpoint: String,
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl GeocodeClient {
    pub fn new() -> Result<Self, GeocodeError> {
        Self::for_endpoint(NOMINATIM_ENDPOINT)
    }

    /// Point the client at a different endpoint. Intended for test servers.
    pub fn for_endpoint(endpoint: &str) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mistctl/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            min_interval: MIN_CALL_INTERVAL,
            last_call: None,
        })
    }

    /// Shrink the call spacing. Intended for tests only; the public
    /// endpoint requires the full one-second interval.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Look up a free-text US address, returning the provider's first match.
    pub async fn lookup(&mut self, address: &str) -> Result<GeocodeResult, GeocodeError> {
        self.pace().await;
        let result = self.lookup_once(address).await;
        self.last_call = Some(Instant::now());
        result
    }

    /// Sleep out the remainder of the spacing interval since the last call.
    async fn pace(&self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
    }

    async fn lookup_once(&self, address: &str) -> Result<GeocodeResult, GeocodeError> {
        let url = format!(
            "{}?q={}&format=json&addressdetails=1&limit=1&countrycodes=us",
            self.endpoint,
            urlencoding::encode(address)
        );
        debug!("geocoding lookup: {url}");

        let payload: Vec<serde_json::Value> = self.http.get(&url).send().await?.json().await?;
        result_from_payload(&payload)
    }
}

/// Extract the first match from the provider's response array. Anything
/// short of a first element with both coordinates counts as no results.
fn result_from_payload(payload: &[serde_json::Value]) -> Result<GeocodeResult, GeocodeError> {
    let first = payload.first().ok_or(GeocodeError::NoResults)?;
    let latitude = first
        .get("lat")
        .and_then(|v| v.as_str())
        .ok_or(GeocodeError::NoResults)?;
    let longitude = first
        .get("lon")
        .and_then(|v| v.as_str())
        .ok_or(GeocodeError::NoResults)?;
    let display_name = first
        .get("display_name")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    Ok(GeocodeResult {
        latitude: latitude.to_string(),
        longitude: longitude.to_string(),
        display_name: display_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_match_is_extracted() {
        let payload = vec![json!({
            "lat": "40.7128",
            "lon": "-74.0060",
            "display_name": "New York, USA",
        })];

        let result = result_from_payload(&payload).unwrap();
        assert_eq!(result.latitude, "40.7128");
        assert_eq!(result.longitude, "-74.0060");
        assert_eq!(result.display_name, "New York, USA");
    }

    #[test]
    fn empty_array_means_no_results() {
        assert!(matches!(
            result_from_payload(&[]),
            Err(GeocodeError::NoResults)
        ));
    }

    #[test]
    fn missing_coordinates_mean_no_results() {
        let payload = vec![json!({ "display_name": "somewhere" })];
        assert!(matches!(
            result_from_payload(&payload),
            Err(GeocodeError::NoResults)
        ));
    }

    #[test]
    fn display_name_is_best_effort() {
        let payload = vec![json!({ "lat": "1.0", "lon": "2.0" })];
        let result = result_from_payload(&payload).unwrap();
        assert_eq!(result.display_name, "");
    }
}
