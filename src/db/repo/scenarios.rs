//! Scenario storage and lookup.

use chrono::Utc;
use sqlx::Row;
use tracing::warn;

use crate::domain::{Scenario, ScenarioId, ScenarioMetadata, Tick};

use super::Repository;

impl Repository {
    /// Insert a scenario (seed/import path). Scenarios are immutable; a
    /// conflicting id is an error rather than an overwrite.
    pub async fn insert_scenario(&self, scenario: &Scenario) -> Result<(), sqlx::Error> {
        let ticks_json = serde_json::to_string(&scenario.ticks)
            .map_err(|e| sqlx::Error::Protocol(format!("failed to encode ticks: {}", e)))?;
        let metadata_json = scenario
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| sqlx::Error::Protocol(format!("failed to encode metadata: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO scenarios (id, asset, timeframe, ticks, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(scenario.id.as_str())
        .bind(&scenario.asset)
        .bind(&scenario.timeframe)
        .bind(ticks_json)
        .bind(metadata_json)
        .bind(Utc::now().timestamp_millis())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_scenario(&self, id: &ScenarioId) -> Result<Option<Scenario>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, asset, timeframe, ticks, metadata FROM scenarios WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| scenario_from_row(&row)))
    }

    /// All scenario ids, for random selection.
    pub async fn list_scenario_ids(&self) -> Result<Vec<ScenarioId>, sqlx::Error> {
        let rows = sqlx::query("SELECT id FROM scenarios ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;
        Ok(rows
            .iter()
            .map(|row| ScenarioId::new(row.get("id")))
            .collect())
    }

    pub async fn list_scenarios(&self) -> Result<Vec<Scenario>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, asset, timeframe, ticks, metadata FROM scenarios ORDER BY created_at DESC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(scenario_from_row).collect())
    }
}

fn scenario_from_row(row: &sqlx::sqlite::SqliteRow) -> Scenario {
    let id: String = row.get("id");
    let ticks_json: String = row.get("ticks");
    let ticks: Vec<Tick> = serde_json::from_str(&ticks_json).unwrap_or_else(|e| {
        warn!(scenario_id = %id, error = %e, "Failed to decode scenario ticks, treating as empty");
        Vec::new()
    });

    let metadata = row
        .get::<Option<String>, _>("metadata")
        .and_then(|json| match serde_json::from_str::<ScenarioMetadata>(&json) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(scenario_id = %id, error = %e, "Failed to decode scenario metadata, dropping");
                None
            }
        });

    Scenario {
        id: ScenarioId::new(id),
        asset: row.get("asset"),
        timeframe: row.get("timeframe"),
        ticks,
        metadata,
    }
}
