//! Session registry: the single authoritative map of live battle state.
//!
//! All runtime mutation goes through `with_session`, which holds the lock for
//! the duration of the closure. Closures must not await; the tick scheduler
//! and the action processor therefore cannot interleave destructively on the
//! same session.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::domain::{BattleId, PlayerPnl, ScenarioId, Tick, UserId};

use super::ledger::PlayerState;

/// Authoritative, ephemeral runtime state of one live battle.
///
/// Locked parameters (interval, total ticks, starting balance, tick snapshot)
/// are frozen here at start and never re-read from the scenario.
#[derive(Debug, Clone)]
pub struct BattleRuntime {
    pub battle_id: BattleId,
    pub scenario_id: ScenarioId,
    /// Index of the next tick to stream; monotonically non-decreasing,
    /// bounded by total_ticks.
    pub current_tick_index: i64,
    pub total_ticks: i64,
    pub tick_interval_ms: u64,
    pub starting_balance: f64,
    /// Locked snapshot of the scenario's tick sequence.
    pub ticks: Vec<Tick>,
    pub players: HashMap<UserId, PlayerState>,
    pub is_running: bool,
    pub reveal_salt: String,
    pub started_at: DateTime<Utc>,
}

impl BattleRuntime {
    /// The tick a newly accepted action executes against: the tick at the
    /// authoritative index, falling back one step once the final tick has
    /// been streamed. None only when the sequence is empty.
    pub fn execution_tick(&self) -> Option<(i64, &Tick)> {
        let index = self.current_tick_index;
        if let Some(tick) = tick_at(&self.ticks, index) {
            return Some((index, tick));
        }
        tick_at(&self.ticks, index - 1).map(|tick| (index - 1, tick))
    }

    /// Broadcast-shaped view of both players, side A first.
    pub fn player_pnls(&self) -> Vec<PlayerPnl> {
        let mut pnls: Vec<PlayerPnl> = self
            .players
            .values()
            .map(|player| PlayerPnl {
                user_id: player.user_id.clone(),
                pnl_percent: player.pnl_percent(),
                position: player.position,
                side: player.side.as_str().to_string(),
            })
            .collect();
        pnls.sort_by(|a, b| a.side.cmp(&b.side));
        pnls
    }
}

fn tick_at(ticks: &[Tick], index: i64) -> Option<&Tick> {
    if index < 0 {
        return None;
    }
    ticks.get(index as usize)
}

/// Mutex-guarded map of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, BattleRuntime>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, runtime: BattleRuntime) {
        let mut sessions = self.sessions.lock().expect("registry lock poisoned");
        sessions.insert(runtime.battle_id.as_str().to_string(), runtime);
    }

    /// Remove and return a session. Settlement uses this as its idempotence
    /// guard: only the caller that wins the removal finalizes.
    pub fn take(&self, battle_id: &BattleId) -> Option<BattleRuntime> {
        self.sessions
            .lock()
            .expect("registry lock poisoned")
            .remove(battle_id.as_str())
    }

    pub fn contains(&self, battle_id: &BattleId) -> bool {
        self.sessions
            .lock()
            .expect("registry lock poisoned")
            .contains_key(battle_id.as_str())
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().expect("registry lock poisoned").len()
    }

    /// Run a closure against one session's runtime under the registry lock.
    /// Returns None if the session is absent. The closure must not block.
    pub fn with_session<R>(
        &self,
        battle_id: &BattleId,
        f: impl FnOnce(&mut BattleRuntime) -> R,
    ) -> Option<R> {
        let mut sessions = self.sessions.lock().expect("registry lock poisoned");
        sessions.get_mut(battle_id.as_str()).map(f)
    }

    /// Read-only snapshot of one session.
    pub fn snapshot(&self, battle_id: &BattleId) -> Option<BattleRuntime> {
        self.sessions
            .lock()
            .expect("registry lock poisoned")
            .get(battle_id.as_str())
            .cloned()
    }
}
