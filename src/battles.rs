//! Battle lifecycle outside the live session: creation, matchmaking, and
//! cancellation. Once a battle is started the engine owns it.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{
    Battle, BattleId, BattleStatus, Participant, ParticipantSide, ScenarioId, UserId,
};
use crate::error::AppError;
use crate::fairness;
use crate::scenario::ScenarioStore;

#[derive(Debug, Error)]
pub enum BattleServiceError {
    #[error("battle {0} not found")]
    BattleNotFound(BattleId),
    #[error("scenario {0} not found")]
    ScenarioNotFound(ScenarioId),
    #[error("no scenarios available")]
    EmptyCatalog,
    #[error("{0}")]
    NotJoinable(String),
    #[error("already joined this battle")]
    AlreadyJoined,
    #[error("{0}")]
    CannotCancel(String),
    #[error("only the creator can cancel a battle")]
    NotCreator,
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl From<BattleServiceError> for AppError {
    fn from(err: BattleServiceError) -> Self {
        match err {
            BattleServiceError::BattleNotFound(id) => {
                AppError::NotFound(format!("Battle {} not found", id))
            }
            BattleServiceError::ScenarioNotFound(id) => {
                AppError::NotFound(format!("Scenario {} not found", id))
            }
            BattleServiceError::EmptyCatalog => {
                AppError::BadRequest("No scenarios available".to_string())
            }
            BattleServiceError::NotJoinable(msg) | BattleServiceError::CannotCancel(msg) => {
                AppError::BadRequest(msg)
            }
            BattleServiceError::AlreadyJoined => {
                AppError::BadRequest("Cannot join a battle twice".to_string())
            }
            BattleServiceError::NotCreator => AppError::Forbidden,
            BattleServiceError::InvalidRequest(msg) => AppError::BadRequest(msg),
            BattleServiceError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

pub struct BattleService {
    repo: Arc<Repository>,
    scenarios: Arc<ScenarioStore>,
    config: Config,
}

impl BattleService {
    pub fn new(repo: Arc<Repository>, scenarios: Arc<ScenarioStore>, config: Config) -> Self {
        BattleService {
            repo,
            scenarios,
            config,
        }
    }

    /// Create a WAITING battle. The scenario is picked at random unless the
    /// caller pins one; either way its hash commitment is published on the
    /// battle while the id and salt stay withheld until settlement.
    pub async fn create_battle(
        &self,
        creator: &UserId,
        scenario_id: Option<ScenarioId>,
        starting_balance: Option<f64>,
    ) -> Result<Battle, BattleServiceError> {
        let starting_balance = starting_balance.unwrap_or(self.config.default_starting_balance);
        if !starting_balance.is_finite() || starting_balance <= 0.0 {
            return Err(BattleServiceError::InvalidRequest(
                "Starting balance must be a positive number".to_string(),
            ));
        }

        let scenario_id = match scenario_id {
            Some(id) => id,
            None => self
                .scenarios
                .random_id()
                .await?
                .ok_or(BattleServiceError::EmptyCatalog)?,
        };
        let scenario = self
            .scenarios
            .get(&scenario_id)
            .await?
            .ok_or_else(|| BattleServiceError::ScenarioNotFound(scenario_id.clone()))?;
        if scenario.tick_count() == 0 {
            return Err(BattleServiceError::InvalidRequest(format!(
                "Scenario {} has no tick data",
                scenario_id
            )));
        }

        let battle_id = BattleId::generate();
        let salt = fairness::generate_salt();
        let battle = Battle {
            id: battle_id.clone(),
            scenario_id: scenario_id.clone(),
            status: BattleStatus::Waiting,
            commit_hash: fairness::commit_hash(&scenario_id, &salt),
            reveal_salt: salt,
            tick_interval_ms: None,
            total_ticks: None,
            starting_balance,
            current_tick_index: 0,
            participants: vec![Participant {
                id: Uuid::new_v4().to_string(),
                battle_id: battle_id.clone(),
                user_id: creator.clone(),
                side: ParticipantSide::A,
                starting_balance,
                current_balance: starting_balance,
            }],
            created_at: Utc::now(),
            matched_at: None,
            started_at: None,
            finished_at: None,
        };
        self.repo.insert_battle(&battle).await?;

        info!(battle_id = %battle_id, creator = %creator, "Battle created");
        Ok(battle)
    }

    /// Second player joins a WAITING battle. This is the transition that
    /// freezes the session parameters: tick interval from current config,
    /// total ticks from the scenario, both written onto the battle row.
    pub async fn join_battle(
        &self,
        battle_id: &BattleId,
        user_id: &UserId,
    ) -> Result<Battle, BattleServiceError> {
        let battle = self
            .repo
            .get_battle(battle_id)
            .await?
            .ok_or_else(|| BattleServiceError::BattleNotFound(battle_id.clone()))?;

        if !battle.status.can_join() {
            return Err(BattleServiceError::NotJoinable(format!(
                "Battle is {}, cannot join",
                battle.status.as_str()
            )));
        }
        if battle.participant(user_id).is_some() {
            return Err(BattleServiceError::AlreadyJoined);
        }
        if battle.participants.len() >= 2 {
            return Err(BattleServiceError::NotJoinable(
                "Battle is already full".to_string(),
            ));
        }

        let scenario = self
            .scenarios
            .get(&battle.scenario_id)
            .await?
            .ok_or_else(|| BattleServiceError::ScenarioNotFound(battle.scenario_id.clone()))?;

        let joiner = Participant {
            id: Uuid::new_v4().to_string(),
            battle_id: battle_id.clone(),
            user_id: user_id.clone(),
            side: ParticipantSide::B,
            starting_balance: battle.starting_balance,
            current_balance: battle.starting_balance,
        };
        self.repo
            .mark_matched(
                battle_id,
                &joiner,
                self.config.tick_interval_ms as i64,
                scenario.tick_count(),
                Utc::now(),
            )
            .await?;

        info!(battle_id = %battle_id, joiner = %user_id, "Battle matched");
        self.repo
            .get_battle(battle_id)
            .await?
            .ok_or_else(|| BattleServiceError::BattleNotFound(battle_id.clone()))
    }

    /// Creator withdraws a WAITING battle before anyone joins.
    pub async fn cancel_battle(
        &self,
        battle_id: &BattleId,
        user_id: &UserId,
    ) -> Result<Battle, BattleServiceError> {
        let battle = self
            .repo
            .get_battle(battle_id)
            .await?
            .ok_or_else(|| BattleServiceError::BattleNotFound(battle_id.clone()))?;

        if battle.status != BattleStatus::Waiting {
            return Err(BattleServiceError::CannotCancel(format!(
                "Battle is {}, only WAITING battles can be canceled",
                battle.status.as_str()
            )));
        }
        let creator = battle
            .creator()
            .ok_or_else(|| BattleServiceError::BattleNotFound(battle_id.clone()))?;
        if &creator.user_id != user_id {
            return Err(BattleServiceError::NotCreator);
        }

        self.repo
            .update_status(battle_id, BattleStatus::Canceled)
            .await?;
        info!(battle_id = %battle_id, "Battle canceled");

        self.repo
            .get_battle(battle_id)
            .await?
            .ok_or_else(|| BattleServiceError::BattleNotFound(battle_id.clone()))
    }

    pub async fn get_battle(&self, battle_id: &BattleId) -> Result<Battle, BattleServiceError> {
        self.repo
            .get_battle(battle_id)
            .await?
            .ok_or_else(|| BattleServiceError::BattleNotFound(battle_id.clone()))
    }

    pub async fn list_battles(
        &self,
        status: Option<BattleStatus>,
        user_id: Option<&UserId>,
        limit: i64,
    ) -> Result<Vec<Battle>, BattleServiceError> {
        Ok(self.repo.list_battles(status, user_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::{Scenario, Tick};
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn setup() -> (BattleService, Arc<Repository>, TempDir) {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("test.db").to_string_lossy().to_string();

        let mut env = HashMap::new();
        env.insert("DATABASE_PATH".to_string(), db_path);
        let config = Config::from_env_map(env).unwrap();

        let pool = init_db(&config.database_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));
        let scenarios = Arc::new(ScenarioStore::new(Arc::clone(&repo)));
        let service = BattleService::new(Arc::clone(&repo), scenarios, config);
        (service, repo, temp)
    }

    async fn seed_scenario(repo: &Repository, id: &str) -> ScenarioId {
        let scenario = Scenario {
            id: ScenarioId::new(id.to_string()),
            asset: "BTC".to_string(),
            timeframe: "1m".to_string(),
            ticks: vec![
                Tick::new(0, 100.0, 100.0, 100.0, 100.0, 1.0),
                Tick::new(60_000, 101.0, 101.0, 101.0, 101.0, 1.0),
            ],
            metadata: None,
        };
        repo.insert_scenario(&scenario).await.unwrap();
        scenario.id
    }

    fn alice() -> UserId {
        UserId::new("alice".to_string())
    }

    fn bob() -> UserId {
        UserId::new("bob".to_string())
    }

    #[tokio::test]
    async fn test_create_battle_commits_to_scenario() {
        let (service, repo, _temp) = setup().await;
        seed_scenario(&repo, "scn-1").await;

        let battle = service.create_battle(&alice(), None, None).await.unwrap();
        assert_eq!(battle.status, BattleStatus::Waiting);
        assert_eq!(battle.participants.len(), 1);
        assert_eq!(battle.starting_balance, 10_000.0);
        assert_eq!(battle.tick_interval_ms, None);
        assert!(fairness::verify_commit(
            &battle.scenario_id,
            &battle.reveal_salt,
            &battle.commit_hash
        ));
    }

    #[tokio::test]
    async fn test_create_with_empty_catalog_fails() {
        let (service, _repo, _temp) = setup().await;
        let err = service.create_battle(&alice(), None, None).await;
        assert!(matches!(err, Err(BattleServiceError::EmptyCatalog)));
    }

    #[tokio::test]
    async fn test_create_with_unknown_scenario_fails() {
        let (service, _repo, _temp) = setup().await;
        let err = service
            .create_battle(&alice(), Some(ScenarioId::new("nope".to_string())), None)
            .await;
        assert!(matches!(err, Err(BattleServiceError::ScenarioNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_with_bad_balance_fails() {
        let (service, repo, _temp) = setup().await;
        seed_scenario(&repo, "scn-1").await;
        let err = service.create_battle(&alice(), None, Some(-50.0)).await;
        assert!(matches!(err, Err(BattleServiceError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_join_freezes_session_parameters() {
        let (service, repo, _temp) = setup().await;
        seed_scenario(&repo, "scn-1").await;

        let battle = service.create_battle(&alice(), None, None).await.unwrap();
        let matched = service.join_battle(&battle.id, &bob()).await.unwrap();

        assert_eq!(matched.status, BattleStatus::Matched);
        assert_eq!(matched.participants.len(), 2);
        assert_eq!(matched.tick_interval_ms, Some(5000));
        assert_eq!(matched.total_ticks, Some(2));
        assert!(matched.matched_at.is_some());
    }

    #[tokio::test]
    async fn test_creator_cannot_join_own_battle() {
        let (service, repo, _temp) = setup().await;
        seed_scenario(&repo, "scn-1").await;

        let battle = service.create_battle(&alice(), None, None).await.unwrap();
        let err = service.join_battle(&battle.id, &alice()).await;
        assert!(matches!(err, Err(BattleServiceError::AlreadyJoined)));
    }

    #[tokio::test]
    async fn test_cannot_join_matched_battle() {
        let (service, repo, _temp) = setup().await;
        seed_scenario(&repo, "scn-1").await;

        let battle = service.create_battle(&alice(), None, None).await.unwrap();
        service.join_battle(&battle.id, &bob()).await.unwrap();

        let charlie = UserId::new("charlie".to_string());
        let err = service.join_battle(&battle.id, &charlie).await;
        assert!(matches!(err, Err(BattleServiceError::NotJoinable(_))));
    }

    #[tokio::test]
    async fn test_creator_cancels_waiting_battle() {
        let (service, repo, _temp) = setup().await;
        seed_scenario(&repo, "scn-1").await;

        let battle = service.create_battle(&alice(), None, None).await.unwrap();
        let canceled = service.cancel_battle(&battle.id, &alice()).await.unwrap();
        assert_eq!(canceled.status, BattleStatus::Canceled);

        let err = service.join_battle(&battle.id, &bob()).await;
        assert!(matches!(err, Err(BattleServiceError::NotJoinable(_))));
    }

    #[tokio::test]
    async fn test_only_creator_can_cancel() {
        let (service, repo, _temp) = setup().await;
        seed_scenario(&repo, "scn-1").await;

        let battle = service.create_battle(&alice(), None, None).await.unwrap();
        let err = service.cancel_battle(&battle.id, &bob()).await;
        assert!(matches!(err, Err(BattleServiceError::NotCreator)));
    }

    #[tokio::test]
    async fn test_cannot_cancel_matched_battle() {
        let (service, repo, _temp) = setup().await;
        seed_scenario(&repo, "scn-1").await;

        let battle = service.create_battle(&alice(), None, None).await.unwrap();
        service.join_battle(&battle.id, &bob()).await.unwrap();

        let err = service.cancel_battle(&battle.id, &alice()).await;
        assert!(matches!(err, Err(BattleServiceError::CannotCancel(_))));
    }
}
