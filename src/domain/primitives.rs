//! Domain primitives: BattleId, UserId, ScenarioId, sides, statuses.

use serde::{Deserialize, Serialize};

/// Battle (session) identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BattleId(pub String);

impl BattleId {
    /// Create a BattleId from a string.
    pub fn new(id: String) -> Self {
        BattleId(id)
    }

    /// Generate a fresh random battle id.
    pub fn generate() -> Self {
        BattleId(uuid::Uuid::new_v4().to_string())
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BattleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Participant identifier, verified upstream by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Create a UserId from a string.
    pub fn new(id: String) -> Self {
        UserId(id)
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scenario identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScenarioId(pub String);

impl ScenarioId {
    /// Create a ScenarioId from a string.
    pub fn new(id: String) -> Self {
        ScenarioId(id)
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Battle lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BattleStatus {
    /// Created, waiting for an opponent.
    Waiting,
    /// Both players matched, countdown pending; locked params frozen here.
    Matched,
    /// Ticks are being streamed.
    Running,
    /// Settled; terminal.
    Finished,
    /// Canceled by the creator while waiting; terminal.
    Canceled,
}

impl BattleStatus {
    /// Whether a second player may still join.
    pub fn can_join(&self) -> bool {
        matches!(self, BattleStatus::Waiting)
    }

    /// Whether the battle is terminal (no transitions out).
    pub fn is_terminal(&self) -> bool {
        matches!(self, BattleStatus::Finished | BattleStatus::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BattleStatus::Waiting => "WAITING",
            BattleStatus::Matched => "MATCHED",
            BattleStatus::Running => "RUNNING",
            BattleStatus::Finished => "FINISHED",
            BattleStatus::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WAITING" => Some(BattleStatus::Waiting),
            "MATCHED" => Some(BattleStatus::Matched),
            "RUNNING" => Some(BattleStatus::Running),
            "FINISHED" => Some(BattleStatus::Finished),
            "CANCELED" => Some(BattleStatus::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BattleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which seat a participant occupies. Side A is always the creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantSide {
    A,
    B,
}

impl ParticipantSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantSide::A => "A",
            ParticipantSide::B => "B",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A" => Some(ParticipantSide::A),
            "B" => Some(ParticipantSide::B),
            _ => None,
        }
    }
}

/// Trading instruction submitted by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Open or add to a long; closes a short.
    Buy,
    /// Open or add to a short; closes a long.
    Sell,
    /// Explicitly flatten whatever is held.
    Close,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Buy => "BUY",
            ActionType::Sell => "SELL",
            ActionType::Close => "CLOSE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(ActionType::Buy),
            "SELL" => Some(ActionType::Sell),
            "CLOSE" => Some(ActionType::Close),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Long,
    Short,
    #[default]
    Flat,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
            PositionSide::Flat => "FLAT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LONG" => Some(PositionSide::Long),
            "SHORT" => Some(PositionSide::Short),
            "FLAT" => Some(PositionSide::Flat),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            BattleStatus::Waiting,
            BattleStatus::Matched,
            BattleStatus::Running,
            BattleStatus::Finished,
            BattleStatus::Canceled,
        ] {
            assert_eq!(BattleStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BattleStatus::parse("NOPE"), None);
    }

    #[test]
    fn test_status_predicates() {
        assert!(BattleStatus::Waiting.can_join());
        assert!(!BattleStatus::Matched.can_join());
        assert!(BattleStatus::Finished.is_terminal());
        assert!(BattleStatus::Canceled.is_terminal());
        assert!(!BattleStatus::Running.is_terminal());
    }

    #[test]
    fn test_action_type_serialization() {
        let json = serde_json::to_string(&ActionType::Buy).unwrap();
        assert_eq!(json, "\"BUY\"");
        let parsed: ActionType = serde_json::from_str("\"CLOSE\"").unwrap();
        assert_eq!(parsed, ActionType::Close);
    }

    #[test]
    fn test_battle_id_generate_unique() {
        assert_ne!(BattleId::generate(), BattleId::generate());
    }

    #[test]
    fn test_position_side_default_is_flat() {
        assert_eq!(PositionSide::default(), PositionSide::Flat);
    }
}
