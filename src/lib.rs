pub mod api;
pub mod battles;
pub mod bus;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fairness;
pub mod points;
pub mod replay;
pub mod scenario;

pub use battles::{BattleService, BattleServiceError};
pub use bus::{BattleBus, InProcessBus};
pub use cache::TtlCache;
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    ActionRecord, ActionType, Battle, BattleId, BattleMessage, BattleResult, BattleStatus,
    Participant, ParticipantSide, PositionSide, Scenario, ScenarioId, Tick, UserId,
};
pub use engine::{BattleEngine, EngineError, ReconnectionState, TickStep};
pub use error::AppError;
pub use points::{PointsAward, PointsService};
pub use replay::{ReplayData, ReplayService};
pub use scenario::ScenarioStore;
