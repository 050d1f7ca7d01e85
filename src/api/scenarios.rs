//! Scenario catalog endpoint. Summaries only: tick data never leaves the
//! server until a battle over it has finished.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::domain::{Scenario, ScenarioId, ScenarioMetadata};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    pub id: ScenarioId,
    pub asset: String,
    pub timeframe: String,
    pub tick_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ScenarioMetadata>,
}

impl From<Scenario> for ScenarioSummary {
    fn from(scenario: Scenario) -> Self {
        ScenarioSummary {
            tick_count: scenario.tick_count(),
            id: scenario.id,
            asset: scenario.asset,
            timeframe: scenario.timeframe,
            metadata: scenario.metadata,
        }
    }
}

pub async fn list_scenarios(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScenarioSummary>>, AppError> {
    let scenarios = state
        .scenarios
        .list()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(
        scenarios.into_iter().map(ScenarioSummary::from).collect(),
    ))
}

pub async fn get_scenario(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScenarioSummary>, AppError> {
    let scenario = state
        .scenarios
        .get(&ScenarioId::new(id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Scenario not found".to_string()))?;
    Ok(Json(ScenarioSummary::from(scenario)))
}

/// Import a full scenario, ticks included. Returns only the summary; ticks go
/// in but never come back out through the catalog.
pub async fn import_scenario(
    State(state): State<AppState>,
    Json(scenario): Json<Scenario>,
) -> Result<(StatusCode, Json<ScenarioSummary>), AppError> {
    if scenario.ticks.is_empty() {
        return Err(AppError::BadRequest(
            "Scenario must have at least one tick".to_string(),
        ));
    }
    state
        .scenarios
        .insert(&scenario)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(ScenarioSummary::from(scenario))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Tick;

    #[test]
    fn test_summary_never_exposes_ticks() {
        let summary = ScenarioSummary::from(Scenario {
            id: ScenarioId::new("scn-1".to_string()),
            asset: "BTC".to_string(),
            timeframe: "1m".to_string(),
            ticks: vec![Tick::new(0, 1.0, 1.0, 1.0, 1.0, 1.0)],
            metadata: None,
        });

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("ticks").is_none());
        assert_eq!(json["tickCount"], 1);
    }
}
