//! Reconnection snapshots for clients that dropped their stream.

use serde::Serialize;
use tracing::debug;

use crate::domain::{BattleId, BattleStatus, PlayerPnl, TickUpdate};

use super::BattleEngine;

/// Catch-up payload for a returning client: position in the stream plus the
/// bounded window of recent broadcasts. Never contains a tick the session has
/// not already streamed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectionState {
    pub battle_id: BattleId,
    pub status: BattleStatus,
    pub current_tick_index: i64,
    pub total_ticks: i64,
    pub time_remaining: i64,
    pub recent_ticks: Vec<TickUpdate>,
    pub players: Vec<PlayerPnl>,
}

impl BattleEngine {
    /// Build the catch-up view for one battle. Prefers live session state,
    /// falls back to the TTL-cached last broadcast, and returns None when
    /// neither exists (the match is over or never started).
    pub fn reconnection_state(&self, battle_id: &BattleId) -> Option<ReconnectionState> {
        let recent_ticks = self.cached_window(battle_id);

        if let Some(rt) = self.registry().snapshot(battle_id) {
            let seconds_per_tick = rt.tick_interval_ms as f64 / 1000.0;
            let ticks_left = (rt.total_ticks - rt.current_tick_index).max(0);
            return Some(ReconnectionState {
                battle_id: rt.battle_id.clone(),
                status: if rt.is_running {
                    BattleStatus::Running
                } else {
                    BattleStatus::Matched
                },
                current_tick_index: rt.current_tick_index,
                total_ticks: rt.total_ticks,
                time_remaining: (ticks_left as f64 * seconds_per_tick).round() as i64,
                recent_ticks: recent_ticks
                    .into_iter()
                    .filter(|t| t.current_index < rt.current_tick_index)
                    .collect(),
                players: rt.player_pnls(),
            });
        }

        let json = self.cache().get(&Self::last_tick_key(battle_id))?;
        let last: TickUpdate = match serde_json::from_str(&json) {
            Ok(last) => last,
            Err(e) => {
                debug!(battle_id = %battle_id, error = %e, "Discarding undecodable cached tick");
                return None;
            }
        };
        Some(ReconnectionState {
            battle_id: last.battle_id.clone(),
            status: BattleStatus::Running,
            current_tick_index: last.current_index,
            total_ticks: last.total_ticks,
            time_remaining: last.time_remaining,
            players: last.players.clone(),
            recent_ticks,
        })
    }

    fn cached_window(&self, battle_id: &BattleId) -> Vec<TickUpdate> {
        self.cache()
            .get_window(&Self::tick_window_key(battle_id))
            .iter()
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect()
    }
}
