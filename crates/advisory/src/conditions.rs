//! Read-only access to a user's self-reported health conditions.

use async_trait::async_trait;
use common::{Error, HealthCondition};
use serde::Deserialize;
use std::path::PathBuf;

#[async_trait]
pub trait ConditionStore: Send + Sync {
    async fn list_conditions(&self, user_id: &str) -> Result<Vec<HealthCondition>, Error>;
}

/// Fixed list, returned for every user.
#[derive(Debug, Clone, Default)]
pub struct StaticConditions(pub Vec<HealthCondition>);

#[async_trait]
impl ConditionStore for StaticConditions {
    async fn list_conditions(&self, _user_id: &str) -> Result<Vec<HealthCondition>, Error> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ConditionRecord {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(flatten)]
    condition: HealthCondition,
}

/// JSON file holding an array of conditions. Records carrying a `user_id`
/// only apply to that user; records without one apply to everyone.
#[derive(Debug, Clone)]
pub struct JsonConditionStore {
    path: PathBuf,
}

impl JsonConditionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConditionStore for JsonConditionStore {
    async fn list_conditions(&self, user_id: &str) -> Result<Vec<HealthCondition>, Error> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Storage(format!("read conditions {}: {e}", self.path.display()))
        })?;
        let records: Vec<ConditionRecord> = serde_json::from_str(&raw)?;

        Ok(records
            .into_iter()
            .filter(|r| r.user_id.as_deref().map_or(true, |owner| owner == user_id))
            .map(|r| r.condition)
            .collect())
    }
}
