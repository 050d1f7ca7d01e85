//! Shared fixtures for engine tests: a seeded database, a matched two-player
//! battle, and an engine wired to in-process collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use crate::bus::{BattleBus, InProcessBus};
use crate::cache::TtlCache;
use crate::config::Config;
use crate::db::migrations::init_db;
use crate::db::Repository;
use crate::domain::{
    Battle, BattleId, BattleStatus, Participant, ParticipantSide, Scenario, ScenarioId, Tick,
    UserId,
};
use crate::fairness;
use crate::points::PointsService;
use crate::scenario::ScenarioStore;

use super::BattleEngine;

/// Long enough that the spawned tick task never fires during a test; ticks
/// are driven explicitly through `tick_once`.
const TEST_TICK_INTERVAL_MS: i64 = 60_000;

const STARTING_BALANCE: f64 = 10_000.0;

enum Stage {
    Waiting,
    Matched,
    Started,
}

pub(crate) struct TestSession {
    pub engine: Arc<BattleEngine>,
    pub repo: Arc<Repository>,
    pub bus: Arc<InProcessBus>,
    pub cache: Arc<TtlCache>,
    pub battle_id: BattleId,
    pub scenario_id: ScenarioId,
    pub alice: UserId,
    pub bob: UserId,
    pub tick_interval_ms: u64,
    pub tick_window_size: usize,
    _temp: TempDir,
}

impl TestSession {
    /// A WAITING battle with only its creator; never started.
    pub(crate) async fn waiting_only(closes: &[f64]) -> Self {
        Self::build(closes, &[], Stage::Waiting).await
    }

    /// A MATCHED battle with both players, not yet started.
    pub(crate) async fn matched_with_env(closes: &[f64], overrides: &[(&str, &str)]) -> Self {
        Self::build(closes, overrides, Stage::Matched).await
    }

    /// A matched battle brought fully RUNNING with a zero-second countdown.
    pub(crate) async fn started(closes: &[f64]) -> Self {
        Self::build(closes, &[], Stage::Started).await
    }

    pub(crate) async fn started_with_env(closes: &[f64], overrides: &[(&str, &str)]) -> Self {
        Self::build(closes, overrides, Stage::Started).await
    }

    async fn build(closes: &[f64], overrides: &[(&str, &str)], stage: Stage) -> Self {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("test.db").to_string_lossy().to_string();

        let mut env: HashMap<String, String> = HashMap::new();
        env.insert("DATABASE_PATH".to_string(), db_path);
        env.insert("COUNTDOWN_SECONDS".to_string(), "0".to_string());
        for (key, value) in overrides {
            env.insert(key.to_string(), value.to_string());
        }
        let config = Config::from_env_map(env).unwrap();

        let pool = init_db(&config.database_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));
        let bus = Arc::new(InProcessBus::new());
        let cache = Arc::new(TtlCache::new());
        let scenarios = Arc::new(ScenarioStore::new(Arc::clone(&repo)));
        let points = Arc::new(PointsService::new(Arc::clone(&repo)));

        let tick_window_size = config.tick_window_size;
        let engine = Arc::new(BattleEngine::new(
            Arc::clone(&repo),
            scenarios,
            points,
            Arc::clone(&bus) as Arc<dyn BattleBus>,
            Arc::clone(&cache),
            config,
        ));

        let scenario_id = ScenarioId::new("scn-test".to_string());
        let scenario = Scenario {
            id: scenario_id.clone(),
            asset: "BTC".to_string(),
            timeframe: "1m".to_string(),
            ticks: closes
                .iter()
                .enumerate()
                .map(|(i, &close)| {
                    Tick::new(i as i64 * TEST_TICK_INTERVAL_MS, close, close, close, close, 1.0)
                })
                .collect(),
            metadata: None,
        };
        repo.insert_scenario(&scenario).await.unwrap();

        let battle_id = BattleId::generate();
        let alice = UserId::new("alice".to_string());
        let bob = UserId::new("bob".to_string());
        let salt = fairness::generate_salt();

        let battle = Battle {
            id: battle_id.clone(),
            scenario_id: scenario_id.clone(),
            status: BattleStatus::Waiting,
            commit_hash: fairness::commit_hash(&scenario_id, &salt),
            reveal_salt: salt,
            tick_interval_ms: None,
            total_ticks: None,
            starting_balance: STARTING_BALANCE,
            current_tick_index: 0,
            participants: vec![Participant {
                id: "p-a".to_string(),
                battle_id: battle_id.clone(),
                user_id: alice.clone(),
                side: ParticipantSide::A,
                starting_balance: STARTING_BALANCE,
                current_balance: STARTING_BALANCE,
            }],
            created_at: Utc::now(),
            matched_at: None,
            started_at: None,
            finished_at: None,
        };
        repo.insert_battle(&battle).await.unwrap();

        if !matches!(stage, Stage::Waiting) {
            let joiner = Participant {
                id: "p-b".to_string(),
                battle_id: battle_id.clone(),
                user_id: bob.clone(),
                side: ParticipantSide::B,
                starting_balance: STARTING_BALANCE,
                current_balance: STARTING_BALANCE,
            };
            repo.mark_matched(
                &battle_id,
                &joiner,
                TEST_TICK_INTERVAL_MS,
                closes.len() as i64,
                Utc::now(),
            )
            .await
            .unwrap();
        }
        if let Stage::Started = stage {
            engine.start_battle(&battle_id).await.unwrap();
        }

        TestSession {
            engine,
            repo,
            bus,
            cache,
            battle_id,
            scenario_id,
            alice,
            bob,
            tick_interval_ms: TEST_TICK_INTERVAL_MS as u64,
            tick_window_size,
            _temp: temp,
        }
    }
}
