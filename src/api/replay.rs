//! Replay endpoint for finished battles.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::AppState;
use crate::domain::BattleId;
use crate::error::AppError;
use crate::replay::ReplayData;

pub async fn get_replay(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReplayData>, AppError> {
    let replay = state.replays.build(&BattleId::new(id)).await?;
    Ok(Json(replay))
}
