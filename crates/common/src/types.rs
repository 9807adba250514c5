//! Domain types shared across the advisor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Location Types ────────────────────────────────────────────────────

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Result of resolving the caller's network vantage point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    /// Public IP of the caller; scopes cached readings.
    pub partition_key: String,
    #[serde(default)]
    pub city: Option<String>,
}

/// A geocoded place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    pub coordinates: Coordinates,
}

// ── Air Quality Types ─────────────────────────────────────────────────

/// One point-in-time air-quality measurement. `aqi` is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutantReading {
    /// US AQI.
    pub aqi: i64,
    #[serde(default)]
    pub pm25: Option<f64>,
    #[serde(default)]
    pub pm10: Option<f64>,
    #[serde(default)]
    pub o3: Option<f64>,
    #[serde(default)]
    pub no2: Option<f64>,
    #[serde(default)]
    pub so2: Option<f64>,
    #[serde(default)]
    pub co: Option<f64>,
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

impl PollutantReading {
    pub fn category(&self) -> AqiCategory {
        AqiCategory::from_aqi(self.aqi)
    }
}

/// US AQI severity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn from_aqi(aqi: i64) -> Self {
        match aqi {
            i64::MIN..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

/// Severity band from a PM2.5 concentration in µg/m³ (EPA breakpoints).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pm25Category {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl Pm25Category {
    pub fn from_pm25(pm25: f64) -> Self {
        if pm25 <= 12.0 {
            Pm25Category::Good
        } else if pm25 <= 35.4 {
            Pm25Category::Moderate
        } else if pm25 <= 55.4 {
            Pm25Category::UnhealthyForSensitiveGroups
        } else if pm25 <= 150.4 {
            Pm25Category::Unhealthy
        } else if pm25 <= 250.4 {
            Pm25Category::VeryUnhealthy
        } else {
            Pm25Category::Hazardous
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Pm25Category::Good => "Good",
            Pm25Category::Moderate => "Moderate",
            Pm25Category::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Pm25Category::Unhealthy => "Unhealthy",
            Pm25Category::VeryUnhealthy => "Very Unhealthy",
            Pm25Category::Hazardous => "Hazardous",
        }
    }
}

// ── Profile Types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// A self-reported health condition, owned by the external profile store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCondition {
    pub name: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ── Advisory Types ────────────────────────────────────────────────────

/// Max recommendations shown to a user.
pub const MAX_DISPLAYED_RECOMMENDATIONS: usize = 5;
/// Max characters per displayed recommendation.
pub const MAX_RECOMMENDATION_CHARS: usize = 220;

/// Validated output of advisory generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub safe_to_go_out: bool,
    pub risk_summary: String,
    pub recommendations: Vec<String>,
}

impl Advisory {
    /// First five recommendations, each truncated on a char boundary.
    pub fn display_recommendations(&self) -> Vec<String> {
        self.recommendations
            .iter()
            .take(MAX_DISPLAYED_RECOMMENDATIONS)
            .map(|r| r.chars().take(MAX_RECOMMENDATION_CHARS).collect())
            .collect()
    }

    pub fn verdict(&self) -> &'static str {
        if self.safe_to_go_out {
            "Safe to go out"
        } else {
            "Not recommended to go out"
        }
    }
}
