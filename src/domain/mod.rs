//! Domain types for the battle session engine.
//!
//! This module provides:
//! - Identifier newtypes and small enums (status, sides, action types)
//! - Tick and Scenario data
//! - Persistent battle records (battle, participant, action, result)
//! - The closed set of broadcast message variants

pub mod battle;
pub mod message;
pub mod primitives;
pub mod scenario;
pub mod tick;

pub use battle::{ActionRecord, Battle, BattleResult, Participant};
pub use message::{BattleMessage, PlayerPnl, ResultUpdate, StateUpdate, TickUpdate};
pub use primitives::{
    ActionType, BattleId, BattleStatus, ParticipantSide, PositionSide, ScenarioId, UserId,
};
pub use scenario::{Difficulty, Scenario, ScenarioMetadata};
pub use tick::Tick;
