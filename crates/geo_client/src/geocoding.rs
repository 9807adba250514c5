//! City-name geocoding via the Open-Meteo geocoding API.

use common::{Coordinates, Error, Place};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct GeocodingResponse {
    #[serde(default)]
    pub results: Vec<GeocodingResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingResult {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
}

impl GeocodingResponse {
    /// First match, or `LocationUnavailable` when the search came back empty.
    pub fn first_place(self, query: &str) -> Result<Place, Error> {
        let hit = self.results.into_iter().next().ok_or_else(|| {
            Error::LocationUnavailable(format!("Could not find coordinates for '{query}'"))
        })?;

        Ok(Place {
            name: hit.name,
            country: hit.country,
            coordinates: Coordinates::new(hit.latitude, hit.longitude),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GeocodingClient {
    client: reqwest::Client,
    url: String,
}

impl GeocodingClient {
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("aqi-advisor/0.1")
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Http(format!("failed to build geocoding client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn search(&self, name: &str) -> Result<Place, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::LocationUnavailable("empty city name".into()));
        }

        debug!("Geocoding '{}' via {}", name, self.url);

        let resp = self
            .client
            .get(&self.url)
            .query(&[
                ("name", name),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("geocoding request for '{name}': {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status,
                body: body.chars().take(500).collect(),
            });
        }

        let payload: GeocodingResponse = resp
            .json()
            .await
            .map_err(|e| Error::Http(format!("geocoding JSON for '{name}': {e}")))?;

        payload.first_place(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_result_becomes_place() {
        let parsed: GeocodingResponse = serde_json::from_str(
            r#"{"results": [
                {"id": 2950159, "name": "Berlin", "latitude": 52.52437, "longitude": 13.41053,
                 "country": "Germany", "timezone": "Europe/Berlin"},
                {"id": 5083330, "name": "Berlin", "latitude": 44.46867, "longitude": -71.18508,
                 "country": "United States"}
            ], "generationtime_ms": 0.7}"#,
        )
        .expect("response should deserialize");

        let place = parsed.first_place("Berlin").expect("has a match");
        assert_eq!(place.country.as_deref(), Some("Germany"));
        assert!((place.coordinates.lat - 52.52437).abs() < 1e-9);
    }

    #[test]
    fn test_no_results_is_location_unavailable() {
        let parsed: GeocodingResponse =
            serde_json::from_str(r#"{"generationtime_ms": 0.3}"#).expect("valid");
        assert!(matches!(
            parsed.first_place("Atlantis"),
            Err(Error::LocationUnavailable(_))
        ));
    }
}
