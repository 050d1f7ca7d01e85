//! Broadcast payloads published on a battle's channels.
//!
//! A closed set of tagged variants so consumers can handle each case
//! exhaustively instead of sniffing a loose object shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BattleId, BattleStatus, PositionSide, ScenarioId, Tick, UserId};

/// Per-player slice of a tick broadcast: PnL percent and open position only,
/// never the ledger internals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPnl {
    pub user_id: UserId,
    /// (realized + unrealized) / startingBalance * 100.
    pub pnl_percent: f64,
    pub position: PositionSide,
    pub side: String,
}

/// Tick broadcast payload, also the unit stored in the reconnection window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickUpdate {
    pub battle_id: BattleId,
    pub tick: Tick,
    pub current_index: i64,
    pub total_ticks: i64,
    /// Whole seconds until the last tick, for display.
    pub time_remaining: i64,
    pub players: Vec<PlayerPnl>,
}

/// Status-change broadcast (countdown steps included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub battle_id: BattleId,
    pub status: BattleStatus,
    /// Seconds left in the pre-start countdown, if counting down.
    pub countdown: Option<i64>,
    pub message: String,
}

/// Final-result broadcast, including the fairness reveal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultUpdate {
    pub battle_id: BattleId,
    pub winner_user_id: Option<UserId>,
    pub is_draw: bool,
    pub pnl_a: f64,
    pub pnl_b: f64,
    pub points_a: i64,
    pub points_b: i64,
    /// Revealed only here, after outcomes are fixed.
    pub scenario_id: ScenarioId,
    pub reveal_salt: String,
    pub finalized_at: DateTime<Utc>,
}

/// Everything a battle can publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BattleMessage {
    Tick(TickUpdate),
    State(StateUpdate),
    Result(ResultUpdate),
}

impl BattleMessage {
    /// The battle this message belongs to.
    pub fn battle_id(&self) -> &BattleId {
        match self {
            BattleMessage::Tick(t) => &t.battle_id,
            BattleMessage::State(s) => &s.battle_id,
            BattleMessage::Result(r) => &r.battle_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_tagged() {
        let msg = BattleMessage::State(StateUpdate {
            battle_id: BattleId::new("b1".to_string()),
            status: BattleStatus::Matched,
            countdown: Some(3),
            message: "Battle starts in 3...".to_string(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "state");
        assert_eq!(json["countdown"], 3);
        assert_eq!(json["status"], "MATCHED");
    }

    #[test]
    fn test_tick_update_round_trip() {
        let msg = BattleMessage::Tick(TickUpdate {
            battle_id: BattleId::new("b1".to_string()),
            tick: Tick::new(0, 1.0, 2.0, 0.5, 1.5, 9.0),
            current_index: 4,
            total_ticks: 30,
            time_remaining: 125,
            players: vec![PlayerPnl {
                user_id: UserId::new("alice".to_string()),
                pnl_percent: 0.5,
                position: PositionSide::Long,
                side: "A".to_string(),
            }],
        });
        let json = serde_json::to_string(&msg).unwrap();
        let back: BattleMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
