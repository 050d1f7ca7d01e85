//! Points endpoints: own total and the leaderboard.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::identity::CallerId;
use crate::api::AppState;
use crate::domain::UserId;
use crate::error::AppError;

const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;
const MAX_LEADERBOARD_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsSummary {
    pub user_id: UserId,
    pub total_points: i64,
}

pub async fn my_points(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<PointsSummary>, AppError> {
    let total_points = state
        .points
        .total(&caller.0)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(PointsSummary {
        user_id: caller.0,
        total_points,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<Vec<PointsSummary>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);
    let entries = state
        .points
        .leaderboard(limit)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(
        entries
            .into_iter()
            .map(|entry| PointsSummary {
                user_id: entry.user_id,
                total_points: entry.total_points,
            })
            .collect(),
    ))
}
