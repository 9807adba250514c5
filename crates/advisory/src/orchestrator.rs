//! Refresh pipeline: resolve → cache check → (fetch → store)? → prompt → generate.
//!
//! Runs are not deduplicated. Overlapping calls each execute the full
//! pipeline and the last one to finish owns the visible snapshot.

use crate::cache::ResultCache;
use crate::conditions::{ConditionStore, StaticConditions};
use crate::prompt::build_prompt;
use air_quality_client::AirQualitySource;
use common::{Advisory, Error, HealthCondition, PollutantReading, ResolvedLocation};
use geo_client::LocationResolver;
use llm_client::AdvisoryGenerator;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Resolving,
    Fetching,
    Caching,
    Prompting,
    Generating,
    Done,
    Failed,
}

/// What a consuming surface renders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshSnapshot {
    pub stage: Stage,
    pub location: Option<ResolvedLocation>,
    pub reading: Option<PollutantReading>,
    pub from_cache: bool,
    pub advisory: Option<Advisory>,
    pub error: Option<String>,
}

/// Result of one successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryReport {
    pub location: ResolvedLocation,
    pub reading: PollutantReading,
    pub from_cache: bool,
    pub advisory: Advisory,
}

pub struct RefreshOrchestrator {
    resolver: Arc<dyn LocationResolver>,
    source: Arc<dyn AirQualitySource>,
    cache: Arc<ResultCache>,
    generator: Arc<AdvisoryGenerator>,
    conditions: Arc<dyn ConditionStore>,
    user_id: Option<String>,
    location: RwLock<Option<ResolvedLocation>>,
    state: RwLock<RefreshSnapshot>,
}

impl RefreshOrchestrator {
    pub fn new(
        resolver: Arc<dyn LocationResolver>,
        source: Arc<dyn AirQualitySource>,
        cache: Arc<ResultCache>,
        generator: Arc<AdvisoryGenerator>,
    ) -> Self {
        Self {
            resolver,
            source,
            cache,
            generator,
            conditions: Arc::new(StaticConditions::default()),
            user_id: None,
            location: RwLock::new(None),
            state: RwLock::new(RefreshSnapshot::default()),
        }
    }

    /// Consult `store` for `user_id`'s conditions when prompting.
    pub fn with_conditions(
        mut self,
        store: Arc<dyn ConditionStore>,
        user_id: Option<String>,
    ) -> Self {
        self.conditions = store;
        self.user_id = user_id;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub async fn snapshot(&self) -> RefreshSnapshot {
        self.state.read().await.clone()
    }

    /// Advisory for the current location, reusing a valid cached reading.
    pub async fn refresh(&self) -> Result<AdvisoryReport, Error> {
        self.run(false).await
    }

    /// Advisory from a live reading; the cached entry is dropped first.
    pub async fn force_refresh(&self) -> Result<AdvisoryReport, Error> {
        self.run(true).await
    }

    /// Re-resolve the caller's location, replacing any known one.
    pub async fn resolve_location(&self) -> Result<ResolvedLocation, Error> {
        let location = self.resolver.resolve().await?;
        info!(
            "Location resolved: city={} partition={}",
            location.city.as_deref().unwrap_or("unknown"),
            location.partition_key
        );
        *self.location.write().await = Some(location.clone());
        self.state.write().await.location = Some(location.clone());
        Ok(location)
    }

    async fn run(&self, force: bool) -> Result<AdvisoryReport, Error> {
        {
            let mut state = self.state.write().await;
            state.advisory = None;
            state.error = None;
            state.from_cache = false;
        }

        match self.execute(force).await {
            Ok(report) => {
                let mut state = self.state.write().await;
                state.stage = Stage::Done;
                state.location = Some(report.location.clone());
                state.reading = Some(report.reading.clone());
                state.from_cache = report.from_cache;
                state.advisory = Some(report.advisory.clone());
                info!(
                    "Advisory ready: aqi={} from_cache={} safe_to_go_out={}",
                    report.reading.aqi, report.from_cache, report.advisory.safe_to_go_out
                );
                Ok(report)
            }
            Err(e) => {
                let mut state = self.state.write().await;
                warn!("Refresh failed during {:?}: {}", state.stage, e);
                state.stage = Stage::Failed;
                state.advisory = None;
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(&self, force: bool) -> Result<AdvisoryReport, Error> {
        self.set_stage(Stage::Resolving).await;
        let location = self.known_location().await?;
        let key = location.partition_key.as_str();

        let cached = if force {
            if let Err(e) = self.cache.invalidate(key) {
                warn!("Could not invalidate cache for {}: {}", key, e);
            }
            None
        } else {
            self.cache.get(key)
        };

        let (reading, from_cache) = match cached {
            Some(entry) => {
                info!("Cache hit for {} (stored_at={})", key, entry.stored_at);
                (entry.reading, true)
            }
            None => (self.fetch_and_store(&location).await?, false),
        };

        {
            let mut state = self.state.write().await;
            state.reading = Some(reading.clone());
            state.from_cache = from_cache;
        }

        self.set_stage(Stage::Prompting).await;
        let conditions = self.load_conditions().await;
        let prompt = build_prompt(location.coordinates, &reading, &conditions);

        self.set_stage(Stage::Generating).await;
        let advisory = self.generator.generate(&prompt).await?;

        Ok(AdvisoryReport {
            location,
            reading,
            from_cache,
            advisory,
        })
    }

    async fn known_location(&self) -> Result<ResolvedLocation, Error> {
        if let Some(location) = self.location.read().await.clone() {
            return Ok(location);
        }
        self.resolve_location().await
    }

    async fn fetch_and_store(
        &self,
        location: &ResolvedLocation,
    ) -> Result<PollutantReading, Error> {
        let key = location.partition_key.as_str();

        self.set_stage(Stage::Fetching).await;
        let reading = self.source.fetch(location.coordinates).await?;

        self.set_stage(Stage::Caching).await;
        if let Err(e) = self.cache.put(key, &reading, location.coordinates) {
            warn!("Failed to cache reading for {}: {}", key, e);
        }
        Ok(reading)
    }

    async fn load_conditions(&self) -> Vec<HealthCondition> {
        let Some(user_id) = self.user_id.as_deref() else {
            return Vec::new();
        };
        match self.conditions.list_conditions(user_id).await {
            Ok(conditions) => conditions,
            Err(e) => {
                warn!("Failed to load health conditions for {}: {}", user_id, e);
                Vec::new()
            }
        }
    }

    async fn set_stage(&self, stage: Stage) {
        debug!("Stage -> {:?}", stage);
        self.state.write().await.stage = stage;
    }
}
