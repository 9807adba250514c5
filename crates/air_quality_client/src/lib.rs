//! Open-Meteo air-quality client.
//!
//! Fetches current and hourly pollutant values for a coordinate pair and
//! normalizes them into a `PollutantReading`. A pollutant's value is the
//! explicit current field when present, otherwise the latest non-null entry
//! of its hourly series (scanning from the end backward).

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use common::{Coordinates, Error, PollutantReading};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const CURRENT_FIELDS: &str =
    "us_aqi,pm2_5,pm10,ozone,nitrogen_dioxide,sulphur_dioxide,carbon_monoxide";
const HOURLY_FIELDS: &str =
    "us_aqi,pm2_5,pm10,ozone,nitrogen_dioxide,sulphur_dioxide,carbon_monoxide";

/// A source of current pollutant readings.
#[async_trait]
pub trait AirQualitySource: Send + Sync {
    async fn fetch(&self, coordinates: Coordinates) -> Result<PollutantReading, Error>;
}

// ── Open-Meteo response types ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct AirQualityResponse {
    #[serde(default)]
    pub utc_offset_seconds: i32,
    #[serde(default)]
    pub current: Option<CurrentValues>,
    #[serde(default)]
    pub hourly: Option<HourlySeries>,
}

/// The `current` block. Every value may be missing or null.
#[derive(Debug, Default, Deserialize)]
pub struct CurrentValues {
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub us_aqi: Option<f64>,
    #[serde(default)]
    pub pm2_5: Option<f64>,
    #[serde(default)]
    pub pm10: Option<f64>,
    #[serde(default)]
    pub ozone: Option<f64>,
    #[serde(default)]
    pub nitrogen_dioxide: Option<f64>,
    #[serde(default)]
    pub sulphur_dioxide: Option<f64>,
    #[serde(default)]
    pub carbon_monoxide: Option<f64>,
}

/// The `hourly` block: parallel arrays aligned to `time`.
#[derive(Debug, Default, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub us_aqi: Vec<Option<f64>>,
    #[serde(default)]
    pub pm2_5: Vec<Option<f64>>,
    #[serde(default)]
    pub pm10: Vec<Option<f64>>,
    #[serde(default)]
    pub ozone: Vec<Option<f64>>,
    #[serde(default)]
    pub nitrogen_dioxide: Vec<Option<f64>>,
    #[serde(default)]
    pub sulphur_dioxide: Vec<Option<f64>>,
    #[serde(default)]
    pub carbon_monoxide: Vec<Option<f64>>,
}

// ── Normalization ─────────────────────────────────────────────────────

/// Latest non-null finite value of a series, with its index.
pub fn latest_non_null(series: &[Option<f64>]) -> Option<(usize, f64)> {
    series
        .iter()
        .enumerate()
        .rev()
        .find_map(|(i, v)| v.filter(|v| v.is_finite()).map(|v| (i, v)))
}

/// Prefer the explicit current value; fall back to the hourly backward scan.
fn resolve_value(current: Option<f64>, hourly: Option<&[Option<f64>]>) -> Option<f64> {
    current
        .filter(|v| v.is_finite())
        .or_else(|| hourly.and_then(latest_non_null).map(|(_, v)| v))
}

fn parse_local_time(raw: &str, utc_offset_seconds: i32) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").ok()?;
    let offset = FixedOffset::east_opt(utc_offset_seconds)?;
    naive
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert a raw response into a reading. Fails with `NoDataAvailable`
/// when no AQI value is obtainable from either path.
pub fn normalize(response: &AirQualityResponse) -> Result<PollutantReading, Error> {
    let current = response.current.as_ref();
    let hourly = response.hourly.as_ref();
    let offset = response.utc_offset_seconds;

    let (aqi, observed_at) = match current.and_then(|c| c.us_aqi).filter(|v| v.is_finite()) {
        Some(aqi) => (
            aqi,
            current
                .and_then(|c| c.time.as_deref())
                .and_then(|t| parse_local_time(t, offset)),
        ),
        None => {
            let (idx, aqi) = hourly
                .and_then(|h| latest_non_null(&h.us_aqi))
                .ok_or_else(|| {
                    Error::NoDataAvailable(
                        "response has neither a current nor an hourly AQI value".into(),
                    )
                })?;
            let observed_at = hourly
                .and_then(|h| h.time.get(idx))
                .and_then(|t| parse_local_time(t, offset));
            (aqi, observed_at)
        }
    };

    Ok(PollutantReading {
        aqi: aqi.round() as i64,
        pm25: resolve_value(
            current.and_then(|c| c.pm2_5),
            hourly.map(|h| h.pm2_5.as_slice()),
        ),
        pm10: resolve_value(
            current.and_then(|c| c.pm10),
            hourly.map(|h| h.pm10.as_slice()),
        ),
        o3: resolve_value(
            current.and_then(|c| c.ozone),
            hourly.map(|h| h.ozone.as_slice()),
        ),
        no2: resolve_value(
            current.and_then(|c| c.nitrogen_dioxide),
            hourly.map(|h| h.nitrogen_dioxide.as_slice()),
        ),
        so2: resolve_value(
            current.and_then(|c| c.sulphur_dioxide),
            hourly.map(|h| h.sulphur_dioxide.as_slice()),
        ),
        co: resolve_value(
            current.and_then(|c| c.carbon_monoxide),
            hourly.map(|h| h.carbon_monoxide.as_slice()),
        ),
        observed_at,
    })
}

// ── Client ────────────────────────────────────────────────────────────

/// Open-Meteo air-quality API client.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    url: String,
    timezone: String,
}

impl OpenMeteoClient {
    pub fn new(
        url: impl Into<String>,
        timeout_ms: u64,
        timezone: impl Into<String>,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("aqi-advisor/0.1")
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| Error::Http(format!("failed to build air-quality client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            timezone: timezone.into(),
        })
    }

    /// Fetch the raw response for a coordinate pair.
    pub async fn fetch_raw(&self, coordinates: Coordinates) -> Result<AirQualityResponse, Error> {
        let Coordinates { lat, lon } = coordinates;
        let query = [
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("timezone", self.timezone.clone()),
        ];

        debug!("Fetching air quality: {} lat={} lon={}", self.url, lat, lon);

        let resp = self
            .client
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("air-quality fetch for ({lat},{lon})"))
                } else {
                    Error::Http(format!("HTTP error for ({lat},{lon}): {e}"))
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status,
                body: body.chars().take(500).collect(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading body for ({lat},{lon}): {e}")))?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl AirQualitySource for OpenMeteoClient {
    #[instrument(skip(self))]
    async fn fetch(&self, coordinates: Coordinates) -> Result<PollutantReading, Error> {
        let raw = self.fetch_raw(coordinates).await?;
        let reading = normalize(&raw)?;
        debug!(
            "Normalized reading: aqi={} pm25={:?} observed_at={:?}",
            reading.aqi, reading.pm25, reading.observed_at
        );
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> &'static str {
        r#"{
            "latitude": 52.5,
            "longitude": 13.4,
            "utc_offset_seconds": 3600,
            "timezone": "Europe/Berlin",
            "current": {"time": "2026-02-13T10:00", "interval": 3600, "us_aqi": 57,
                        "pm2_5": 14.2, "pm10": 20.1, "ozone": 41.0,
                        "nitrogen_dioxide": 18.3, "sulphur_dioxide": 2.1, "carbon_monoxide": 210.0},
            "hourly": {
                "time": ["2026-02-13T08:00", "2026-02-13T09:00", "2026-02-13T10:00"],
                "us_aqi": [50, 55, 57],
                "pm2_5": [11.0, 12.5, 14.2]
            }
        }"#
    }

    #[test]
    fn test_current_values_are_preferred() {
        let parsed: AirQualityResponse =
            serde_json::from_str(sample_response()).expect("response should deserialize");
        let reading = normalize(&parsed).expect("reading should build");

        assert_eq!(reading.aqi, 57);
        assert_eq!(reading.pm25, Some(14.2));
        assert_eq!(reading.co, Some(210.0));
        let observed = reading.observed_at.expect("time should parse");
        assert_eq!(observed.to_rfc3339(), "2026-02-13T09:00:00+00:00");
    }

    #[test]
    fn test_backward_scan_takes_latest_non_null() {
        let parsed: AirQualityResponse = serde_json::from_str(
            r#"{"current": {"us_aqi": 40},
                "hourly": {"time": ["a", "b", "c"], "pm2_5": [12.0, null, null]}}"#,
        )
        .expect("response should deserialize");

        let reading = normalize(&parsed).expect("reading should build");
        assert_eq!(reading.pm25, Some(12.0));
        assert_eq!(reading.pm10, None);
    }

    #[test]
    fn test_latest_non_null_scans_from_end() {
        let series = [Some(1.0), Some(2.0), None];
        assert_eq!(latest_non_null(&series), Some((1, 2.0)));
        assert_eq!(latest_non_null(&[None, None]), None);
        assert_eq!(latest_non_null(&[]), None);
    }

    #[test]
    fn test_aqi_falls_back_to_hourly_series() {
        let parsed: AirQualityResponse = serde_json::from_str(
            r#"{"utc_offset_seconds": 0,
                "current": {"time": "2026-02-13T10:00"},
                "hourly": {"time": ["2026-02-13T08:00", "2026-02-13T09:00", "2026-02-13T10:00"],
                           "us_aqi": [61.4, 63.0, null]}}"#,
        )
        .expect("response should deserialize");

        let reading = normalize(&parsed).expect("reading should build");
        assert_eq!(reading.aqi, 63);
        let observed = reading.observed_at.expect("hourly time should parse");
        assert_eq!(observed.to_rfc3339(), "2026-02-13T09:00:00+00:00");
    }

    #[test]
    fn test_no_aqi_anywhere_is_no_data() {
        let parsed: AirQualityResponse = serde_json::from_str(
            r#"{"current": {"pm2_5": 9.0},
                "hourly": {"time": ["a", "b"], "us_aqi": [null, null], "pm2_5": [1.0, 2.0]}}"#,
        )
        .expect("response should deserialize");

        assert!(matches!(normalize(&parsed), Err(Error::NoDataAvailable(_))));
    }

    #[test]
    fn test_empty_body_is_no_data() {
        let parsed: AirQualityResponse = serde_json::from_str("{}").expect("valid");
        assert!(matches!(normalize(&parsed), Err(Error::NoDataAvailable(_))));
    }
}
