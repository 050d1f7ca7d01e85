//! Scenario catalog: immutable historical tick sequences battles replay.

use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::db::Repository;
use crate::domain::{Scenario, ScenarioId};

/// Lookup and selection over the scenario table. Scenarios never change after
/// insert, so callers may snapshot ticks freely.
pub struct ScenarioStore {
    repo: Arc<Repository>,
}

impl ScenarioStore {
    pub fn new(repo: Arc<Repository>) -> Self {
        ScenarioStore { repo }
    }

    pub async fn get(&self, id: &ScenarioId) -> Result<Option<Scenario>, sqlx::Error> {
        self.repo.get_scenario(id).await
    }

    pub async fn list(&self) -> Result<Vec<Scenario>, sqlx::Error> {
        self.repo.list_scenarios().await
    }

    pub async fn insert(&self, scenario: &Scenario) -> Result<(), sqlx::Error> {
        self.repo.insert_scenario(scenario).await
    }

    /// Pick a scenario id uniformly at random, None when the catalog is empty.
    pub async fn random_id(&self) -> Result<Option<ScenarioId>, sqlx::Error> {
        let ids = self.repo.list_scenario_ids().await?;
        Ok(ids.choose(&mut rand::thread_rng()).cloned())
    }
}
