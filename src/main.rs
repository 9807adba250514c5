//! aqi-advisor: outdoor air-quality advisories for wherever you are.
//!
//! Single-binary Tokio application that:
//! 1. Resolves the caller's location from their public IP
//! 2. Fetches (or reuses a cached) pollutant reading for it
//! 3. Asks a generative model whether it is safe to go outside

mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use advisory::{
    AdvisoryReport, ConditionStore, JsonConditionStore, JsonFileStore, RefreshOrchestrator,
    ResultCache, StaticConditions,
};
use air_quality_client::{AirQualitySource, OpenMeteoClient};
use common::{AppConfig, Coordinates, PollutantReading, Pm25Category};
use geo_client::{GeocodingClient, IpWhoIsClient, LocationResolver};
use llm_client::{AdvisoryGenerator, GeminiClient};

/// Air-quality advisor
#[derive(Parser)]
#[command(
    name = "aqi-advisor",
    about = "AI air-quality advisor keyed by your IP location"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a go-outside advisory for the current location.
    Advise {
        /// Ignore any cached reading and fetch a live one.
        #[arg(long)]
        force: bool,

        /// Print the final snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the current pollutant reading without caching or generating.
    Reading {
        /// Look up a city by name instead of using the IP location.
        #[arg(long)]
        city: Option<String>,
    },

    /// Print the location resolved from the public IP.
    Locate,

    /// Drop the cached reading for the current location.
    ClearCache {
        /// Drop every cached reading instead.
        #[arg(long)]
        all: bool,
    },
}

const DEFAULT_LOG_FILTER: &str =
    "aqi_advisor=info,advisory=info,geo_client=info,air_quality_client=info,llm_client=info";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, cfg).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command, cfg: AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Advise { force, json } => advise(&cfg, force, json).await,
        Command::Reading { city } => reading(&cfg, city.as_deref()).await,
        Command::Locate => locate(&cfg).await,
        Command::ClearCache { all } => clear_cache(&cfg, all).await,
    }
}

fn open_cache(cfg: &AppConfig) -> anyhow::Result<Arc<ResultCache>> {
    let store = JsonFileStore::open(&cfg.cache.path)
        .with_context(|| format!("opening cache store at {}", cfg.cache.path))?;
    Ok(Arc::new(ResultCache::new(Arc::new(store))))
}

fn condition_store(cfg: &AppConfig) -> Arc<dyn ConditionStore> {
    match cfg.profile.conditions_path.as_deref() {
        Some(path) => Arc::new(JsonConditionStore::new(path)),
        None => Arc::new(StaticConditions::default()),
    }
}

async fn advise(cfg: &AppConfig, force: bool, json: bool) -> anyhow::Result<()> {
    let api_key = config::require_api_key(cfg)?;

    let resolver = IpWhoIsClient::new(cfg.endpoints.geolocation_url.clone())?;
    let source = OpenMeteoClient::new(
        cfg.endpoints.air_quality_url.clone(),
        cfg.air_quality.timeout_ms,
        cfg.air_quality.timezone.clone(),
    )?;
    let transport = GeminiClient::new(
        api_key.to_string(),
        cfg.endpoints.generative_base_url.clone(),
        cfg.generation.timeout_secs,
    )?;
    let generator = AdvisoryGenerator::new(Arc::new(transport), cfg.generation.models.clone());

    info!(
        "Models: {:?}, cache: {}",
        generator.models(),
        cfg.cache.path
    );

    let orchestrator = RefreshOrchestrator::new(
        Arc::new(resolver),
        Arc::new(source),
        open_cache(cfg)?,
        Arc::new(generator),
    )
    .with_conditions(condition_store(cfg), cfg.profile.user_id.clone());

    let outcome = if force {
        orchestrator.force_refresh().await
    } else {
        orchestrator.refresh().await
    };

    if json {
        let snapshot = orchestrator.snapshot().await;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        outcome?;
        return Ok(());
    }

    print_report(&outcome?);
    Ok(())
}

fn print_report(report: &AdvisoryReport) {
    let location = &report.location;
    let place = location.city.as_deref().unwrap_or("Unknown location");
    let cached = if report.from_cache { " (cached)" } else { "" };
    let coordinates = format_coordinates(location.coordinates);

    println!("📍 {} ({})", place, coordinates);
    println!(
        "🌫️  AQI {} ({}){}",
        report.reading.aqi,
        report.reading.category().label(),
        cached
    );
    println!();
    println!("{}", report.advisory.verdict());
    println!("{}", report.advisory.risk_summary);
    for rec in report.advisory.display_recommendations() {
        println!("  • {}", rec);
    }
}

fn format_coordinates(coordinates: Coordinates) -> String {
    format!("{:.4}, {:.4}", coordinates.lat, coordinates.lon)
}

fn print_reading(reading: &PollutantReading) {
    println!("AQI:   {} ({})", reading.aqi, reading.category().label());
    match reading.pm25 {
        Some(pm25) => println!(
            "PM2.5: {} µg/m³ ({})",
            pm25,
            Pm25Category::from_pm25(pm25).label()
        ),
        None => println!("PM2.5: n/a"),
    }
    for (label, value) in [
        ("PM10", reading.pm10),
        ("O3", reading.o3),
        ("NO2", reading.no2),
        ("SO2", reading.so2),
        ("CO", reading.co),
    ] {
        match value {
            Some(v) => println!("{:<6} {}", format!("{label}:"), v),
            None => println!("{:<6} n/a", format!("{label}:")),
        }
    }
    if let Some(observed_at) = reading.observed_at {
        println!("Observed at {}", observed_at.to_rfc3339());
    }
}

async fn reading(cfg: &AppConfig, city: Option<&str>) -> anyhow::Result<()> {
    let (label, coordinates) = match city {
        Some(name) => {
            let geocoder = GeocodingClient::new(cfg.endpoints.geocoding_url.clone())?;
            let place = geocoder.search(name).await?;
            let label = match place.country {
                Some(ref country) => format!("{}, {}", place.name, country),
                None => place.name.clone(),
            };
            (label, place.coordinates)
        }
        None => {
            let resolver = IpWhoIsClient::new(cfg.endpoints.geolocation_url.clone())?;
            let location = resolver.resolve().await?;
            let label = location
                .city
                .unwrap_or_else(|| "Unknown location".to_string());
            (label, location.coordinates)
        }
    };

    let source = OpenMeteoClient::new(
        cfg.endpoints.air_quality_url.clone(),
        cfg.air_quality.timeout_ms,
        cfg.air_quality.timezone.clone(),
    )?;
    let reading = source.fetch(coordinates).await?;

    println!("📍 {} ({})", label, format_coordinates(coordinates));
    print_reading(&reading);
    Ok(())
}

async fn locate(cfg: &AppConfig) -> anyhow::Result<()> {
    let resolver = IpWhoIsClient::new(cfg.endpoints.geolocation_url.clone())?;
    let location = resolver.resolve().await?;

    println!("IP:          {}", location.partition_key);
    println!(
        "City:        {}",
        location.city.as_deref().unwrap_or("unknown")
    );
    println!("Coordinates: {}", format_coordinates(location.coordinates));
    Ok(())
}

async fn clear_cache(cfg: &AppConfig, all: bool) -> anyhow::Result<()> {
    let cache = open_cache(cfg)?;

    if all {
        let removed = cache.invalidate_all()?;
        println!("Removed {} cached reading(s)", removed);
        return Ok(());
    }

    let resolver = IpWhoIsClient::new(cfg.endpoints.geolocation_url.clone())?;
    let location = resolver.resolve().await?;
    cache.invalidate(&location.partition_key)?;
    println!("Cleared cached reading for {}", location.partition_key);
    Ok(())
}
