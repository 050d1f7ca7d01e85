pub mod actions;
pub mod battles;
pub mod health;
pub mod identity;
pub mod points;
pub mod replay;
pub mod scenarios;
pub mod stream;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::battles::BattleService;
use crate::bus::BattleBus;
use crate::engine::BattleEngine;
use crate::points::PointsService;
use crate::replay::ReplayService;
use crate::scenario::ScenarioStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BattleEngine>,
    pub battles: Arc<BattleService>,
    pub scenarios: Arc<ScenarioStore>,
    pub replays: Arc<ReplayService>,
    pub points: Arc<PointsService>,
    pub bus: Arc<dyn BattleBus>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/battles",
            post(battles::create_battle).get(battles::list_battles),
        )
        .route("/v1/battles/:id", get(battles::get_battle))
        .route("/v1/battles/:id/join", post(battles::join_battle))
        .route("/v1/battles/:id/cancel", post(battles::cancel_battle))
        .route("/v1/battles/:id/actions", post(actions::submit_action))
        .route("/v1/battles/:id/reconnect", get(stream::reconnect))
        .route("/v1/battles/:id/stream", get(stream::stream_battle))
        .route("/v1/battles/:id/replay", get(replay::get_replay))
        .route(
            "/v1/scenarios",
            get(scenarios::list_scenarios).post(scenarios::import_scenario),
        )
        .route("/v1/scenarios/:id", get(scenarios::get_scenario))
        .route("/v1/points/me", get(points::my_points))
        .route("/v1/points/leaderboard", get(points::leaderboard))
        .layer(cors)
        .with_state(state)
}
