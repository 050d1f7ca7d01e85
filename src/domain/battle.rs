//! Persistent battle records: the battle row, participants, the append-only
//! action log, and the final result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActionType, BattleId, BattleStatus, ParticipantSide, ScenarioId, UserId};

/// A battle row as persisted. The fairness salt lives here but is only
/// exposed through the result/replay views once the battle has finished.
#[derive(Debug, Clone, PartialEq)]
pub struct Battle {
    pub id: BattleId,
    pub scenario_id: ScenarioId,
    pub status: BattleStatus,
    /// SHA-256 commitment over `scenarioId:salt`, published at creation.
    pub commit_hash: String,
    /// Withheld until settlement.
    pub reveal_salt: String,
    /// Locked at MATCHED; never re-read from the scenario afterwards.
    pub tick_interval_ms: Option<i64>,
    /// Locked at MATCHED.
    pub total_ticks: Option<i64>,
    /// Locked at MATCHED.
    pub starting_balance: f64,
    pub current_tick_index: i64,
    pub participants: Vec<Participant>,
    pub created_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Battle {
    /// Find a participant by user id.
    pub fn participant(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    /// The creator's participant record (side A).
    pub fn creator(&self) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.side == ParticipantSide::A)
    }
}

/// One seat in a battle.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: String,
    pub battle_id: BattleId,
    pub user_id: UserId,
    pub side: ParticipantSide,
    pub starting_balance: f64,
    pub current_balance: f64,
}

/// Immutable record of one accepted trading instruction. Price and tick index
/// are server-assigned at acceptance time; nothing here is client-supplied
/// except the type and quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub battle_id: BattleId,
    pub user_id: UserId,
    pub action_type: ActionType,
    pub quantity: f64,
    /// Close of the authoritative tick at acceptance.
    pub price: f64,
    pub tick_index: i64,
    pub server_ts: DateTime<Utc>,
}

/// Final outcome of a battle, created exactly once at settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleResult {
    pub battle_id: BattleId,
    /// None means draw.
    pub winner_user_id: Option<UserId>,
    /// Final PnL percent for side A.
    pub pnl_a: f64,
    /// Final PnL percent for side B.
    pub pnl_b: f64,
    pub finalized_at: DateTime<Utc>,
}

impl BattleResult {
    pub fn is_draw(&self) -> bool {
        self.winner_user_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_draw_predicate() {
        let result = BattleResult {
            battle_id: BattleId::new("b1".to_string()),
            winner_user_id: None,
            pnl_a: 1.0,
            pnl_b: 1.0,
            finalized_at: Utc::now(),
        };
        assert!(result.is_draw());
    }

    #[test]
    fn test_battle_participant_lookup() {
        let battle_id = BattleId::new("b1".to_string());
        let battle = Battle {
            id: battle_id.clone(),
            scenario_id: ScenarioId::new("s1".to_string()),
            status: BattleStatus::Waiting,
            commit_hash: String::new(),
            reveal_salt: String::new(),
            tick_interval_ms: None,
            total_ticks: None,
            starting_balance: 10_000.0,
            current_tick_index: 0,
            participants: vec![Participant {
                id: "p1".to_string(),
                battle_id,
                user_id: UserId::new("alice".to_string()),
                side: ParticipantSide::A,
                starting_balance: 10_000.0,
                current_balance: 10_000.0,
            }],
            created_at: Utc::now(),
            matched_at: None,
            started_at: None,
            finished_at: None,
        };

        assert!(battle.participant(&UserId::new("alice".to_string())).is_some());
        assert!(battle.participant(&UserId::new("bob".to_string())).is_none());
        assert_eq!(battle.creator().unwrap().user_id.as_str(), "alice");
    }
}
