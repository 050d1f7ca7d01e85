//! Scenario: an immutable historical price sequence plus descriptive metadata.

use serde::{Deserialize, Serialize};

use super::{ScenarioId, Tick};

/// Rough difficulty label shown in scenario listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Descriptive metadata attached to a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioMetadata {
    pub name: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub start_date: String,
    pub end_date: String,
}

/// An immutable market scenario. Created once at seed/import time and never
/// mutated; live sessions snapshot the tick sequence at start rather than
/// re-reading it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: ScenarioId,
    /// Asset symbol, e.g. "BTC".
    pub asset: String,
    /// Timeframe label, e.g. "1m".
    pub timeframe: String,
    pub ticks: Vec<Tick>,
    pub metadata: Option<ScenarioMetadata>,
}

impl Scenario {
    /// Number of ticks in the sequence.
    pub fn tick_count(&self) -> i64 {
        self.ticks.len() as i64
    }

    /// Tick at a given index, if present.
    pub fn tick_at(&self, index: i64) -> Option<&Tick> {
        if index < 0 {
            return None;
        }
        self.ticks.get(index as usize)
    }
}
