//! Location lookups.
//!
//! Resolves the caller's approximate coordinates and public IP via an
//! IP-geolocation endpoint, and geocodes city names for ad-hoc queries.

pub mod geocoding;

pub use geocoding::GeocodingClient;

use async_trait::async_trait;
use common::{Coordinates, Error, ResolvedLocation};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const GEOLOCATION_FIELDS: &str = "latitude,longitude,city,ip,success,message";

/// Resolves the caller's network vantage point. Never cached.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn resolve(&self) -> Result<ResolvedLocation, Error>;
}

/// Response from `ipwho.is`.
#[derive(Debug, Deserialize)]
pub struct IpWhoIsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

impl IpWhoIsResponse {
    /// Validate the lookup and convert it to a `ResolvedLocation`.
    pub fn into_location(self) -> Result<ResolvedLocation, Error> {
        if !self.success {
            return Err(Error::LocationUnavailable(
                self.message
                    .unwrap_or_else(|| "Failed to resolve IP location".to_string()),
            ));
        }

        let (Some(lat), Some(lon)) = (self.latitude, self.longitude) else {
            return Err(Error::LocationUnavailable(
                "geolocation response carried no coordinates".into(),
            ));
        };
        if !lat.is_finite() || !lon.is_finite() {
            return Err(Error::LocationUnavailable(format!(
                "geolocation returned invalid coordinates ({lat},{lon})"
            )));
        }

        let partition_key = self
            .ip
            .filter(|ip| !ip.trim().is_empty())
            .ok_or_else(|| {
                Error::LocationUnavailable("geolocation response carried no IP".into())
            })?;

        Ok(ResolvedLocation {
            coordinates: Coordinates::new(lat, lon),
            partition_key,
            city: self.city.filter(|c| !c.is_empty()),
        })
    }
}

/// `ipwho.is` client.
#[derive(Debug, Clone)]
pub struct IpWhoIsClient {
    client: reqwest::Client,
    url: String,
}

impl IpWhoIsClient {
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("aqi-advisor/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(format!("failed to build geolocation client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LocationResolver for IpWhoIsClient {
    async fn resolve(&self) -> Result<ResolvedLocation, Error> {
        debug!("Resolving IP location: {}", self.url);

        let resp = self
            .client
            .get(&self.url)
            .query(&[("fields", GEOLOCATION_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::LocationUnavailable(format!("IP geolocation failed: {e}")))?;

        let payload: IpWhoIsResponse = resp.json().await.map_err(|e| {
            Error::LocationUnavailable(format!("IP geolocation returned invalid JSON: {e}"))
        })?;

        let location = payload.into_location()?;
        info!(
            "Resolved location: city={} lat={:.4} lon={:.4}",
            location.city.as_deref().unwrap_or("unknown"),
            location.coordinates.lat,
            location.coordinates.lon
        );
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_lookup_maps_to_location() {
        let parsed: IpWhoIsResponse = serde_json::from_str(
            r#"{"latitude": 40.7128, "longitude": -74.006, "city": "New York",
                "ip": "203.0.113.7", "success": true}"#,
        )
        .expect("response should deserialize");

        let location = parsed.into_location().expect("lookup should succeed");
        assert_eq!(location.partition_key, "203.0.113.7");
        assert_eq!(location.city.as_deref(), Some("New York"));
        assert!((location.coordinates.lon + 74.006).abs() < 1e-9);
    }

    #[test]
    fn test_reported_failure_is_location_unavailable() {
        let parsed: IpWhoIsResponse =
            serde_json::from_str(r#"{"success": false, "message": "Reserved range"}"#)
                .expect("response should deserialize");

        match parsed.into_location() {
            Err(Error::LocationUnavailable(msg)) => assert_eq!(msg, "Reserved range"),
            other => panic!("expected LocationUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_coordinates_is_location_unavailable() {
        let parsed: IpWhoIsResponse =
            serde_json::from_str(r#"{"success": true, "ip": "203.0.113.7", "latitude": 1.0}"#)
                .expect("response should deserialize");

        assert!(matches!(
            parsed.into_location(),
            Err(Error::LocationUnavailable(_))
        ));
    }
}
