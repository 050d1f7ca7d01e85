//! Battle lifecycle endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::api::identity::CallerId;
use crate::api::AppState;
use crate::domain::{
    Battle, BattleId, BattleStatus, ParticipantSide, ScenarioId, UserId,
};
use crate::error::AppError;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_id: UserId,
    pub side: ParticipantSide,
}

/// Public shape of a battle. The scenario id and fairness salt appear only
/// once the battle is finished; before that only the hash commitment is
/// visible.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleView {
    pub id: BattleId,
    pub status: BattleStatus,
    pub commit_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<ScenarioId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reveal_salt: Option<String>,
    pub tick_interval_ms: Option<i64>,
    pub total_ticks: Option<i64>,
    pub starting_balance: f64,
    pub current_tick_index: i64,
    pub participants: Vec<ParticipantView>,
    pub created_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<Battle> for BattleView {
    fn from(battle: Battle) -> Self {
        let finished = battle.status == BattleStatus::Finished;
        BattleView {
            id: battle.id,
            status: battle.status,
            commit_hash: battle.commit_hash,
            scenario_id: finished.then_some(battle.scenario_id),
            reveal_salt: finished.then_some(battle.reveal_salt),
            tick_interval_ms: battle.tick_interval_ms,
            total_ticks: battle.total_ticks,
            starting_balance: battle.starting_balance,
            current_tick_index: battle.current_tick_index,
            participants: battle
                .participants
                .into_iter()
                .map(|p| ParticipantView {
                    user_id: p.user_id,
                    side: p.side,
                })
                .collect(),
            created_at: battle.created_at,
            matched_at: battle.matched_at,
            started_at: battle.started_at,
            finished_at: battle.finished_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBattleRequest {
    pub scenario_id: Option<ScenarioId>,
    pub starting_balance: Option<f64>,
}

pub async fn create_battle(
    State(state): State<AppState>,
    caller: CallerId,
    Json(request): Json<CreateBattleRequest>,
) -> Result<(StatusCode, Json<BattleView>), AppError> {
    let battle = state
        .battles
        .create_battle(&caller.0, request.scenario_id, request.starting_balance)
        .await?;
    Ok((StatusCode::CREATED, Json(battle.into())))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBattlesQuery {
    pub status: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_battles(
    State(state): State<AppState>,
    Query(params): Query<ListBattlesQuery>,
) -> Result<Json<Vec<BattleView>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            BattleStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown status: {}", s)))
        })
        .transpose()?;
    let user_id = params.user_id.map(UserId::new);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let battles = state
        .battles
        .list_battles(status, user_id.as_ref(), limit)
        .await?;
    Ok(Json(battles.into_iter().map(BattleView::from).collect()))
}

pub async fn get_battle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BattleView>, AppError> {
    let battle = state.battles.get_battle(&BattleId::new(id)).await?;
    Ok(Json(battle.into()))
}

/// Join a waiting battle. On success the session is started in the
/// background; clients follow along on the stream endpoint.
pub async fn join_battle(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<String>,
) -> Result<Json<BattleView>, AppError> {
    let battle_id = BattleId::new(id);
    let battle = state.battles.join_battle(&battle_id, &caller.0).await?;

    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.start_battle(&battle_id).await {
            error!(battle_id = %battle_id, error = %e, "Failed to start battle");
        }
    });

    Ok(Json(battle.into()))
}

pub async fn cancel_battle(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<String>,
) -> Result<Json<BattleView>, AppError> {
    let battle = state
        .battles
        .cancel_battle(&BattleId::new(id), &caller.0)
        .await?;
    Ok(Json(battle.into()))
}
