//! Session start and tick streaming.
//!
//! Each running battle has exactly one tick task, and that task is the sole
//! writer of the session's authoritative tick index. One streaming pass is
//! factored into `tick_once` so tests can drive a session deterministically
//! without waiting on timers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::domain::{BattleId, BattleMessage, BattleStatus, StateUpdate, TickUpdate};

use super::registry::BattleRuntime;
use super::{BattleEngine, EngineError, PlayerState};

/// Persist the authoritative index every N streamed ticks.
const INDEX_PERSIST_EVERY: i64 = 5;

/// Outcome of one streaming pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStep {
    /// A tick was broadcast and the index advanced.
    Advanced,
    /// The sequence is exhausted; the session was settled.
    Finished,
    /// The session is no longer live; the caller should stop.
    Gone,
}

/// Registry of per-battle tick tasks.
#[derive(Debug, Default)]
pub struct TickTasks {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TickTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a battle's tick task, aborting any task it replaces.
    pub fn register(&self, battle_id: &BattleId, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        if let Some(previous) = tasks.insert(battle_id.as_str().to_string(), handle) {
            warn!(battle_id = %battle_id, "Replacing an existing tick task");
            previous.abort();
        }
    }

    /// Abort and forget a battle's tick task.
    pub fn stop(&self, battle_id: &BattleId) {
        let handle = self
            .tasks
            .lock()
            .expect("task registry lock poisoned")
            .remove(battle_id.as_str());
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Forget a task without aborting it; used by a task retiring itself.
    pub fn deregister(&self, battle_id: &BattleId) {
        self.tasks
            .lock()
            .expect("task registry lock poisoned")
            .remove(battle_id.as_str());
    }

    pub fn is_active(&self, battle_id: &BattleId) -> bool {
        self.tasks
            .lock()
            .expect("task registry lock poisoned")
            .contains_key(battle_id.as_str())
    }

    pub fn active_count(&self) -> usize {
        self.tasks.lock().expect("task registry lock poisoned").len()
    }

    /// Abort every tick task. Shutdown path only.
    pub fn stop_all(&self) {
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

enum StreamPass {
    Stopped,
    Exhausted,
    Broadcast(TickUpdate),
}

impl BattleEngine {
    /// Bring a MATCHED battle live: freeze its runtime from the persisted
    /// locked parameters, run the countdown, flip it to RUNNING, and spawn
    /// its tick task.
    pub async fn start_battle(self: &Arc<Self>, battle_id: &BattleId) -> Result<(), EngineError> {
        let battle = self
            .repo()
            .get_battle(battle_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Battle {} not found", battle_id)))?;

        if battle.status != BattleStatus::Matched {
            return Err(EngineError::InvalidState(format!(
                "Battle {} is {}, cannot start",
                battle_id,
                battle.status.as_str()
            )));
        }
        if battle.participants.len() != 2 {
            return Err(EngineError::InvalidState(format!(
                "Battle {} has {} participants, cannot start",
                battle_id,
                battle.participants.len()
            )));
        }

        let scenario = self
            .scenarios()
            .get(&battle.scenario_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("Scenario {} not found", battle.scenario_id))
            })?;

        // Locked parameters come from the battle row, frozen at match time.
        // The scenario is only consulted for the tick data itself.
        let tick_interval_ms = battle
            .tick_interval_ms
            .unwrap_or(self.config().tick_interval_ms as i64) as u64;
        let total_ticks = battle
            .total_ticks
            .unwrap_or(scenario.tick_count())
            .min(scenario.tick_count());

        let players: HashMap<_, _> = battle
            .participants
            .iter()
            .map(|p| {
                (
                    p.user_id.clone(),
                    PlayerState::new(
                        p.id.clone(),
                        p.user_id.clone(),
                        p.side,
                        battle.starting_balance,
                    ),
                )
            })
            .collect();

        self.registry().insert(BattleRuntime {
            battle_id: battle_id.clone(),
            scenario_id: battle.scenario_id.clone(),
            current_tick_index: 0,
            total_ticks,
            tick_interval_ms,
            starting_balance: battle.starting_balance,
            ticks: scenario.ticks,
            players,
            is_running: false,
            reveal_salt: battle.reveal_salt.clone(),
            started_at: Utc::now(),
        });
        info!(
            battle_id = %battle_id,
            total_ticks,
            tick_interval_ms,
            "Battle session initialized"
        );

        self.run_countdown(battle_id).await;

        if let Err(e) = self.repo().update_status(battle_id, BattleStatus::Running).await {
            self.registry().take(battle_id);
            return Err(e.into());
        }
        self.registry()
            .with_session(battle_id, |rt| rt.is_running = true);

        self.bus()
            .publish(BattleMessage::State(StateUpdate {
                battle_id: battle_id.clone(),
                status: BattleStatus::Running,
                countdown: None,
                message: "GO!".to_string(),
            }))
            .await;
        info!(battle_id = %battle_id, "Battle running");

        self.spawn_tick_task(battle_id, tick_interval_ms);
        Ok(())
    }

    /// Pre-start countdown, published at one-second steps.
    async fn run_countdown(self: &Arc<Self>, battle_id: &BattleId) {
        let seconds = self.config().countdown_seconds;
        for remaining in (1..=i64::from(seconds)).rev() {
            self.bus()
                .publish(BattleMessage::State(StateUpdate {
                    battle_id: battle_id.clone(),
                    status: BattleStatus::Matched,
                    countdown: Some(remaining),
                    message: format!("Battle starts in {}...", remaining),
                }))
                .await;
            sleep(Duration::from_secs(1)).await;
        }
    }

    fn spawn_tick_task(self: &Arc<Self>, battle_id: &BattleId, tick_interval_ms: u64) {
        let engine = Arc::clone(self);
        let id = battle_id.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(tick_interval_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick completes immediately; consume it so the
            // first stream lands one full interval after GO.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match engine.tick_once(&id).await {
                    TickStep::Advanced => {}
                    TickStep::Finished | TickStep::Gone => break,
                }
            }
            engine.tasks().deregister(&id);
        });

        self.tasks().register(battle_id, handle);
    }

    /// One streaming pass: mark both players to the next tick's close, build
    /// and cache the broadcast payload, advance the authoritative index, and
    /// settle when the sequence is exhausted.
    pub async fn tick_once(self: &Arc<Self>, battle_id: &BattleId) -> TickStep {
        let pass = self.registry().with_session(battle_id, |rt| {
            if !rt.is_running {
                return StreamPass::Stopped;
            }
            let index = rt.current_tick_index;
            if index >= rt.total_ticks {
                return StreamPass::Exhausted;
            }
            let Some(tick) = rt.ticks.get(index as usize).copied() else {
                return StreamPass::Exhausted;
            };

            for player in rt.players.values_mut() {
                player.mark_to_market(tick.close);
            }

            let seconds_per_tick = rt.tick_interval_ms as f64 / 1000.0;
            let time_remaining =
                ((rt.total_ticks - index - 1) as f64 * seconds_per_tick).round() as i64;

            let update = TickUpdate {
                battle_id: rt.battle_id.clone(),
                tick,
                current_index: index,
                total_ticks: rt.total_ticks,
                time_remaining,
                players: rt.player_pnls(),
            };
            rt.current_tick_index = index + 1;
            StreamPass::Broadcast(update)
        });

        match pass {
            None | Some(StreamPass::Stopped) => TickStep::Gone,
            Some(StreamPass::Exhausted) => {
                if let Err(e) = self.settle(battle_id).await {
                    error!(battle_id = %battle_id, error = %e, "Settlement failed");
                }
                TickStep::Finished
            }
            Some(StreamPass::Broadcast(update)) => {
                self.cache_tick(battle_id, &update);

                if update.current_index % INDEX_PERSIST_EVERY == 0 {
                    if let Err(e) = self
                        .repo()
                        .update_current_tick_index(battle_id, update.current_index)
                        .await
                    {
                        warn!(battle_id = %battle_id, error = %e, "Failed to persist tick index");
                    }
                }

                self.bus().publish(BattleMessage::Tick(update)).await;
                TickStep::Advanced
            }
        }
    }

    /// Store the payload in the reconnection window and as the TTL fallback.
    fn cache_tick(&self, battle_id: &BattleId, update: &TickUpdate) {
        let json = match serde_json::to_string(update) {
            Ok(json) => json,
            Err(e) => {
                warn!(battle_id = %battle_id, error = %e, "Failed to encode tick payload");
                return;
            }
        };
        self.cache().push_trim(
            &Self::tick_window_key(battle_id),
            json.clone(),
            self.config().tick_window_size,
        );
        self.cache().set(
            &Self::last_tick_key(battle_id),
            json,
            Some(Duration::from_secs(self.config().reconnect_ttl_secs)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BattleBus;
    use crate::engine::testutil::TestSession;
    use crate::domain::PositionSide;

    #[tokio::test]
    async fn test_start_requires_matched_status() {
        let session = TestSession::waiting_only(&[100.0, 101.0]).await;
        let err = session.engine.start_battle(&session.battle_id).await;
        assert!(matches!(err, Err(EngineError::InvalidState(_))));
        assert!(!session.engine.is_active(&session.battle_id));
    }

    #[tokio::test]
    async fn test_countdown_broadcasts_before_go() {
        let session =
            TestSession::matched_with_env(&[100.0, 101.0], &[("COUNTDOWN_SECONDS", "1")]).await;
        let mut rx = session.bus.subscribe(&session.battle_id);

        session.engine.start_battle(&session.battle_id).await.unwrap();

        let BattleMessage::State(countdown) = rx.recv().await.unwrap() else {
            panic!("expected a countdown broadcast");
        };
        assert_eq!(countdown.status, BattleStatus::Matched);
        assert_eq!(countdown.countdown, Some(1));

        let BattleMessage::State(go) = rx.recv().await.unwrap() else {
            panic!("expected the start broadcast");
        };
        assert_eq!(go.status, BattleStatus::Running);
        assert_eq!(go.message, "GO!");
        assert!(session.engine.is_active(&session.battle_id));
    }

    #[tokio::test]
    async fn test_tick_advances_index_and_broadcasts() {
        let session = TestSession::started(&[100.0, 110.0, 120.0]).await;
        let mut rx = session.bus.subscribe(&session.battle_id);

        assert_eq!(
            session.engine.tick_once(&session.battle_id).await,
            TickStep::Advanced
        );
        assert_eq!(
            session.engine.current_tick_index(&session.battle_id),
            Some(1)
        );

        let msg = rx.recv().await.unwrap();
        let BattleMessage::Tick(update) = msg else {
            panic!("expected a tick broadcast");
        };
        assert_eq!(update.current_index, 0);
        assert_eq!(update.total_ticks, 3);
        assert_eq!(update.tick.close, 100.0);
        assert_eq!(update.players.len(), 2);
        assert_eq!(update.players[0].side, "A");
        assert_eq!(update.players[0].position, PositionSide::Flat);
    }

    #[tokio::test]
    async fn test_time_remaining_counts_down_to_zero() {
        let session = TestSession::started(&[100.0, 101.0]).await;
        let mut rx = session.bus.subscribe(&session.battle_id);

        session.engine.tick_once(&session.battle_id).await;
        session.engine.tick_once(&session.battle_id).await;

        let seconds_per_tick = session.tick_interval_ms as i64 / 1000;
        let BattleMessage::Tick(first) = rx.recv().await.unwrap() else {
            panic!("expected a tick broadcast");
        };
        assert_eq!(first.time_remaining, seconds_per_tick);
        let BattleMessage::Tick(last) = rx.recv().await.unwrap() else {
            panic!("expected a tick broadcast");
        };
        assert_eq!(last.time_remaining, 0);
    }

    #[tokio::test]
    async fn test_exhausted_sequence_settles() {
        let session = TestSession::started(&[100.0, 110.0]).await;

        assert_eq!(
            session.engine.tick_once(&session.battle_id).await,
            TickStep::Advanced
        );
        assert_eq!(
            session.engine.tick_once(&session.battle_id).await,
            TickStep::Advanced
        );
        assert_eq!(
            session.engine.tick_once(&session.battle_id).await,
            TickStep::Finished
        );

        assert!(!session.engine.is_active(&session.battle_id));
        let battle = session
            .repo
            .get_battle(&session.battle_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(battle.status, BattleStatus::Finished);
    }

    #[tokio::test]
    async fn test_tick_on_unknown_battle_is_gone() {
        let session = TestSession::started(&[100.0]).await;
        let unknown = crate::domain::BattleId::new("nope".to_string());
        assert_eq!(session.engine.tick_once(&unknown).await, TickStep::Gone);
    }

    #[tokio::test]
    async fn test_window_caches_recent_ticks() {
        let session = TestSession::started(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]).await;
        for _ in 0..7 {
            session.engine.tick_once(&session.battle_id).await;
        }
        let window = session
            .cache
            .get_window(&BattleEngine::tick_window_key(&session.battle_id));
        assert_eq!(window.len(), session.tick_window_size);
        let newest: TickUpdate = serde_json::from_str(window.last().unwrap()).unwrap();
        assert_eq!(newest.current_index, 6);
    }
}
