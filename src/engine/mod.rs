//! Battle session engine: authoritative state, tick streaming, action
//! processing, settlement, and reconnection.

use std::sync::Arc;

use thiserror::Error;

use crate::bus::BattleBus;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::db::Repository;
use crate::domain::BattleId;
use crate::error::AppError;
use crate::points::PointsService;
use crate::scenario::ScenarioStore;

pub mod actions;
pub mod ledger;
pub mod reconnect;
pub mod registry;
pub mod scheduler;
pub mod settlement;
#[cfg(test)]
pub(crate) mod testutil;

pub use ledger::PlayerState;
pub use reconnect::ReconnectionState;
pub use registry::{BattleRuntime, SessionRegistry};
pub use scheduler::{TickStep, TickTasks};

/// Engine-level error. Precondition violations map one-to-one onto the
/// distinguishable rejection reasons the API returns.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("battle is not running")]
    NotRunning,
    #[error("not a participant in this battle")]
    NotParticipant,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("duplicate action for this tick")]
    DuplicateAction,
    #[error("action cooldown active")]
    CooldownActive,
    #[error("no price data available")]
    NoPriceData,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotRunning => AppError::NotRunning,
            EngineError::NotParticipant => AppError::Forbidden,
            EngineError::RateLimited => AppError::RateLimited,
            EngineError::DuplicateAction => AppError::DuplicateAction,
            EngineError::CooldownActive => AppError::CooldownActive,
            EngineError::NoPriceData => AppError::BadRequest("No price data available".to_string()),
            EngineError::NotFound(msg) => AppError::NotFound(msg),
            EngineError::InvalidState(msg) => AppError::BadRequest(msg),
            EngineError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// The battle session engine. One instance owns the registry of all live
/// sessions and their tick tasks; everything else reaches it through its
/// collaborator boundaries (persistence, cache, bus, scenarios, points).
pub struct BattleEngine {
    registry: SessionRegistry,
    tasks: TickTasks,
    repo: Arc<Repository>,
    scenarios: Arc<ScenarioStore>,
    points: Arc<PointsService>,
    bus: Arc<dyn BattleBus>,
    cache: Arc<TtlCache>,
    config: Config,
}

impl BattleEngine {
    pub fn new(
        repo: Arc<Repository>,
        scenarios: Arc<ScenarioStore>,
        points: Arc<PointsService>,
        bus: Arc<dyn BattleBus>,
        cache: Arc<TtlCache>,
        config: Config,
    ) -> Self {
        BattleEngine {
            registry: SessionRegistry::new(),
            tasks: TickTasks::new(),
            repo,
            scenarios,
            points,
            bus,
            cache,
            config,
        }
    }

    /// Whether a battle currently has live runtime state.
    pub fn is_active(&self, battle_id: &BattleId) -> bool {
        self.registry.contains(battle_id)
    }

    /// Number of live sessions.
    pub fn active_count(&self) -> usize {
        self.registry.active_count()
    }

    /// Current authoritative tick index, if the session is live.
    pub fn current_tick_index(&self, battle_id: &BattleId) -> Option<i64> {
        self.registry
            .with_session(battle_id, |rt| rt.current_tick_index)
    }

    /// A player's runtime ledger state, if the session is live.
    pub fn player_state(
        &self,
        battle_id: &BattleId,
        user_id: &crate::domain::UserId,
    ) -> Option<PlayerState> {
        self.registry
            .with_session(battle_id, |rt| rt.players.get(user_id).cloned())
            .flatten()
    }

    pub(crate) fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub(crate) fn tasks(&self) -> &TickTasks {
        &self.tasks
    }

    pub(crate) fn repo(&self) -> &Repository {
        &self.repo
    }

    pub(crate) fn scenarios(&self) -> &ScenarioStore {
        &self.scenarios
    }

    pub(crate) fn points(&self) -> &PointsService {
        &self.points
    }

    pub(crate) fn bus(&self) -> &dyn BattleBus {
        self.bus.as_ref()
    }

    pub(crate) fn cache(&self) -> &TtlCache {
        &self.cache
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn tick_window_key(battle_id: &BattleId) -> String {
        format!("tick_window:{}", battle_id)
    }

    pub(crate) fn last_tick_key(battle_id: &BattleId) -> String {
        format!("last_tick:{}", battle_id)
    }
}
