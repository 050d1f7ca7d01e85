//! Action intake: validation guards and server-priced execution.
//!
//! Clients send only the intent (type and quantity). The execution price is
//! always taken from the session's authoritative tick, under the same lock
//! that guards the index, so an accepted action can never be priced against
//! a tick the session has not reached.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::db::repo::ParticipantSnapshot;
use crate::domain::{ActionRecord, ActionType, BattleId, PositionSide, UserId};

use super::{BattleEngine, EngineError};

/// Sliding window for the per-participant action budget.
const RATE_WINDOW: Duration = Duration::from_secs(1);

impl BattleEngine {
    /// Validate and execute one trading action.
    ///
    /// Guards run in a fixed order and fail fast: session running, caller is
    /// a participant, rate budget, per-tick duplicate, cooldown. Every
    /// attempt consumes rate budget, accepted or not.
    pub async fn submit_action(
        &self,
        battle_id: &BattleId,
        user_id: &UserId,
        action_type: ActionType,
        quantity: f64,
    ) -> Result<ActionRecord, EngineError> {
        if action_type != ActionType::Close && (!quantity.is_finite() || quantity <= 0.0) {
            return Err(EngineError::InvalidState(
                "Quantity must be a positive number".to_string(),
            ));
        }

        match self
            .registry()
            .with_session(battle_id, |rt| (rt.is_running, rt.players.contains_key(user_id)))
        {
            None | Some((false, _)) => return Err(EngineError::NotRunning),
            Some((true, false)) => return Err(EngineError::NotParticipant),
            Some((true, true)) => {}
        }

        let rate_key = format!("action_rate:{}:{}", battle_id, user_id);
        let attempts = self.cache().incr_with_expiry(&rate_key, RATE_WINDOW);
        if attempts > u64::from(self.config().max_actions_per_second) {
            return Err(EngineError::RateLimited);
        }

        let cooldown_key = format!("action_cooldown:{}:{}", battle_id, user_id);
        let cooldown = Duration::from_millis(self.config().action_cooldown_ms);

        // Duplicate and cooldown checks, pricing, and the ledger mutation all
        // run under the session lock so the priced index cannot move between
        // the checks and the fill.
        let executed = self.registry().with_session(battle_id, |rt| {
            if !rt.is_running {
                return Err(EngineError::NotRunning);
            }
            let (tick_index, tick) = rt.execution_tick().ok_or(EngineError::NoPriceData)?;
            let price = tick.close;

            let dedup_key = format!(
                "action_dedup:{}:{}:{}:{}",
                battle_id,
                user_id,
                tick_index,
                action_type.as_str()
            );
            if self.cache().exists(&dedup_key) {
                return Err(EngineError::DuplicateAction);
            }
            if self.cache().exists(&cooldown_key) {
                return Err(EngineError::CooldownActive);
            }

            let player = rt
                .players
                .get_mut(user_id)
                .ok_or(EngineError::NotParticipant)?;
            player.apply_action(action_type, quantity, price);
            player.mark_to_market(price);

            let snapshot = ParticipantSnapshot {
                position: player.position,
                position_size: player.signed_size(),
                entry_price: (player.position != PositionSide::Flat)
                    .then_some(player.entry_price),
                realized_pnl: player.realized_pnl,
                unrealized_pnl: player.unrealized_pnl,
                current_balance: player.starting_balance + player.total_pnl(),
            };
            let participant_id = player.participant_id.clone();

            // Dedup entries only need to outlive their tick.
            let dedup_ttl = Duration::from_millis(rt.tick_interval_ms.saturating_mul(2).max(1000));
            self.cache().set(&dedup_key, "1".to_string(), Some(dedup_ttl));
            if !cooldown.is_zero() {
                self.cache().set(&cooldown_key, "1".to_string(), Some(cooldown));
            }

            Ok((
                ActionRecord {
                    battle_id: battle_id.clone(),
                    user_id: user_id.clone(),
                    action_type,
                    quantity,
                    price,
                    tick_index,
                    server_ts: Utc::now(),
                },
                snapshot,
                participant_id,
            ))
        });

        let (record, snapshot, participant_id) = match executed {
            None => return Err(EngineError::NotRunning),
            Some(Err(e)) => return Err(e),
            Some(Ok(outcome)) => outcome,
        };

        // The in-memory ledger is authoritative; failed writes are logged and
        // the fill stands.
        if let Err(e) = self.repo().insert_action(&record).await {
            warn!(battle_id = %battle_id, error = %e, "Failed to persist action");
        }
        if let Err(e) = self
            .repo()
            .update_participant_snapshot(&participant_id, &snapshot)
            .await
        {
            warn!(battle_id = %battle_id, error = %e, "Failed to persist participant snapshot");
        }

        info!(
            battle_id = %battle_id,
            user_id = %user_id,
            r#type = action_type.as_str(),
            price = record.price,
            tick_index = record.tick_index,
            "Action executed"
        );
        Ok(record)
    }
}
