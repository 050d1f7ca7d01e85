//! Settlement: final valuation, winner determination, points, and the
//! fairness reveal.
//!
//! Removing the session from the registry is the idempotence gate; whichever
//! caller wins the removal finalizes, every other path is a no-op. The unique
//! result row is a second, independent layer behind it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::db::repo::ParticipantSnapshot;
use crate::domain::{
    BattleId, BattleMessage, BattleResult, BattleStatus, PositionSide, ResultUpdate, StateUpdate,
};

use super::{BattleEngine, EngineError, PlayerState};

impl BattleEngine {
    /// Finalize a battle. Safe to call any number of times and from any path;
    /// only the first call settles.
    pub async fn settle(self: &Arc<Self>, battle_id: &BattleId) -> Result<(), EngineError> {
        let Some(runtime) = self.registry().take(battle_id) else {
            debug!(battle_id = %battle_id, "Settlement skipped, session already finalized");
            return Ok(());
        };

        let final_index = (runtime.total_ticks - 1).min(runtime.ticks.len() as i64 - 1);
        let final_price = if final_index >= 0 {
            runtime.ticks[final_index as usize].close
        } else {
            0.0
        };

        let mut players: Vec<PlayerState> = runtime.players.values().cloned().collect();
        players.sort_by_key(|p| p.side.as_str());
        for player in &mut players {
            player.mark_to_market(final_price);
        }
        if players.len() != 2 {
            return Err(EngineError::InvalidState(format!(
                "Battle {} settled with {} players",
                battle_id,
                players.len()
            )));
        }

        let pnl_a = players[0].pnl_percent();
        let pnl_b = players[1].pnl_percent();
        let winner = if pnl_a > pnl_b {
            Some(players[0].user_id.clone())
        } else if pnl_b > pnl_a {
            Some(players[1].user_id.clone())
        } else {
            None
        };
        let is_draw = winner.is_none();

        let result = BattleResult {
            battle_id: battle_id.clone(),
            winner_user_id: winner.clone(),
            pnl_a,
            pnl_b,
            finalized_at: Utc::now(),
        };
        if !self.repo().insert_result(&result).await? {
            warn!(battle_id = %battle_id, "Result already recorded, skipping finalization");
            self.cleanup_session(battle_id);
            return Ok(());
        }

        self.repo()
            .update_status(battle_id, BattleStatus::Finished)
            .await?;
        if let Err(e) = self
            .repo()
            .update_current_tick_index(battle_id, runtime.current_tick_index)
            .await
        {
            warn!(battle_id = %battle_id, error = %e, "Failed to persist final tick index");
        }

        let mut points = [0i64; 2];
        for (slot, player) in players.iter().enumerate() {
            let snapshot = ParticipantSnapshot {
                position: player.position,
                position_size: player.signed_size(),
                entry_price: (player.position != PositionSide::Flat)
                    .then_some(player.entry_price),
                realized_pnl: player.realized_pnl,
                unrealized_pnl: player.unrealized_pnl,
                current_balance: player.starting_balance + player.total_pnl(),
            };
            if let Err(e) = self
                .repo()
                .update_participant_snapshot(&player.participant_id, &snapshot)
                .await
            {
                warn!(battle_id = %battle_id, error = %e, "Failed to persist final snapshot");
            }

            let is_winner = winner.as_ref() == Some(&player.user_id);
            match self
                .points()
                .award(
                    &player.user_id,
                    battle_id,
                    is_winner,
                    is_draw,
                    player.pnl_percent(),
                )
                .await
            {
                Ok(award) => points[slot] = award.points,
                Err(e) => {
                    warn!(battle_id = %battle_id, user_id = %player.user_id, error = %e, "Failed to award points")
                }
            }
        }

        self.bus()
            .publish(BattleMessage::State(StateUpdate {
                battle_id: battle_id.clone(),
                status: BattleStatus::Finished,
                countdown: None,
                message: "Battle finished".to_string(),
            }))
            .await;
        self.bus()
            .publish(BattleMessage::Result(ResultUpdate {
                battle_id: battle_id.clone(),
                winner_user_id: winner.clone(),
                is_draw,
                pnl_a,
                pnl_b,
                points_a: points[0],
                points_b: points[1],
                scenario_id: runtime.scenario_id.clone(),
                reveal_salt: runtime.reveal_salt.clone(),
                finalized_at: result.finalized_at,
            }))
            .await;

        info!(
            battle_id = %battle_id,
            winner = winner.as_ref().map(|u| u.as_str()).unwrap_or("DRAW"),
            pnl_a,
            pnl_b,
            "Battle settled"
        );

        self.cleanup_session(battle_id);
        Ok(())
    }

    /// Drop ephemeral per-battle state. The tick task notices the registry
    /// entry is gone and retires itself; no abort is needed.
    fn cleanup_session(&self, battle_id: &BattleId) {
        self.cache()
            .delete_window(&Self::tick_window_key(battle_id));
        self.cache().delete(&Self::last_tick_key(battle_id));
        self.bus().close(battle_id);
    }
}
