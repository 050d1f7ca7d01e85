//! Post-battle replays: full tick data, the action log, the result, and the
//! fairness verification block. Only FINISHED battles are replayable; before
//! that the tick data would leak future prices.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::db::Repository;
use crate::domain::{
    ActionRecord, Battle, BattleId, BattleResult, BattleStatus, ParticipantSide, Scenario,
    ScenarioId, UserId,
};
use crate::error::AppError;
use crate::fairness;
use crate::scenario::ScenarioStore;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("battle {0} not found")]
    BattleNotFound(BattleId),
    #[error("battle is {0}, replay is only available once finished")]
    NotFinished(&'static str),
    #[error("battle {0} has no recorded result")]
    MissingResult(BattleId),
    #[error("scenario {0} not found")]
    ScenarioNotFound(ScenarioId),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl From<ReplayError> for AppError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::BattleNotFound(id) => {
                AppError::NotFound(format!("Battle {} not found", id))
            }
            ReplayError::NotFinished(status) => AppError::BadRequest(format!(
                "Battle is {}, replay is only available once finished",
                status
            )),
            ReplayError::MissingResult(id) => {
                AppError::Internal(format!("Battle {} has no recorded result", id))
            }
            ReplayError::ScenarioNotFound(id) => {
                AppError::NotFound(format!("Scenario {} not found", id))
            }
            ReplayError::Db(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// One player's summary in a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayParticipant {
    pub user_id: UserId,
    pub side: ParticipantSide,
    pub final_pnl_percent: f64,
    pub is_winner: bool,
}

/// Everything a client needs to verify the match: the revealed pair, the
/// original commitment, and whether they agree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayVerification {
    pub scenario_id: ScenarioId,
    pub reveal_salt: String,
    pub commit_hash: String,
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayData {
    pub battle_id: BattleId,
    pub scenario: Scenario,
    pub participants: Vec<ReplayParticipant>,
    pub actions: Vec<ActionRecord>,
    pub result: BattleResult,
    pub verification: ReplayVerification,
}

pub struct ReplayService {
    repo: Arc<Repository>,
    scenarios: Arc<ScenarioStore>,
}

impl ReplayService {
    pub fn new(repo: Arc<Repository>, scenarios: Arc<ScenarioStore>) -> Self {
        ReplayService { repo, scenarios }
    }

    pub async fn build(&self, battle_id: &BattleId) -> Result<ReplayData, ReplayError> {
        let battle = self
            .repo
            .get_battle(battle_id)
            .await?
            .ok_or_else(|| ReplayError::BattleNotFound(battle_id.clone()))?;
        if battle.status != BattleStatus::Finished {
            return Err(ReplayError::NotFinished(battle.status.as_str()));
        }

        let result = self
            .repo
            .get_result(battle_id)
            .await?
            .ok_or_else(|| ReplayError::MissingResult(battle_id.clone()))?;
        let scenario = self
            .scenarios
            .get(&battle.scenario_id)
            .await?
            .ok_or_else(|| ReplayError::ScenarioNotFound(battle.scenario_id.clone()))?;
        let actions = self.repo.list_actions(battle_id).await?;

        Ok(ReplayData {
            battle_id: battle_id.clone(),
            participants: participants_view(&battle, &result),
            actions,
            verification: ReplayVerification {
                scenario_id: battle.scenario_id.clone(),
                reveal_salt: battle.reveal_salt.clone(),
                commit_hash: battle.commit_hash.clone(),
                is_valid: fairness::verify_commit(
                    &battle.scenario_id,
                    &battle.reveal_salt,
                    &battle.commit_hash,
                ),
            },
            scenario,
            result,
        })
    }
}

fn participants_view(battle: &Battle, result: &BattleResult) -> Vec<ReplayParticipant> {
    battle
        .participants
        .iter()
        .map(|p| ReplayParticipant {
            user_id: p.user_id.clone(),
            side: p.side,
            final_pnl_percent: match p.side {
                ParticipantSide::A => result.pnl_a,
                ParticipantSide::B => result.pnl_b,
            },
            is_winner: result.winner_user_id.as_ref() == Some(&p.user_id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionType;
    use crate::engine::testutil::TestSession;
    use crate::engine::TickStep;

    async fn finished_session() -> (TestSession, ReplayService) {
        let session = TestSession::started(&[100.0, 110.0]).await;
        session
            .engine
            .submit_action(&session.battle_id, &session.alice, ActionType::Buy, 10.0)
            .await
            .unwrap();
        loop {
            if matches!(
                session.engine.tick_once(&session.battle_id).await,
                TickStep::Finished | TickStep::Gone
            ) {
                break;
            }
        }
        let service = ReplayService::new(
            Arc::clone(&session.repo),
            Arc::new(ScenarioStore::new(Arc::clone(&session.repo))),
        );
        (session, service)
    }

    #[tokio::test]
    async fn test_replay_for_finished_battle() {
        let (session, service) = finished_session().await;
        let replay = service.build(&session.battle_id).await.unwrap();

        assert_eq!(replay.scenario.ticks.len(), 2);
        assert_eq!(replay.actions.len(), 1);
        assert_eq!(replay.actions[0].price, 100.0);
        assert_eq!(replay.participants.len(), 2);

        let alice_view = replay
            .participants
            .iter()
            .find(|p| p.user_id == session.alice)
            .unwrap();
        assert!(alice_view.is_winner);
        assert!((alice_view.final_pnl_percent - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_replay_verification_holds() {
        let (session, service) = finished_session().await;
        let replay = service.build(&session.battle_id).await.unwrap();

        assert!(replay.verification.is_valid);
        assert_eq!(replay.verification.scenario_id, session.scenario_id);
        assert_eq!(replay.verification.reveal_salt.len(), 64);
    }

    #[tokio::test]
    async fn test_replay_unavailable_before_finish() {
        let session = TestSession::started(&[100.0, 110.0]).await;
        let service = ReplayService::new(
            Arc::clone(&session.repo),
            Arc::new(ScenarioStore::new(Arc::clone(&session.repo))),
        );

        let err = service.build(&session.battle_id).await;
        assert!(matches!(err, Err(ReplayError::NotFinished(_))));
    }

    #[tokio::test]
    async fn test_replay_unknown_battle() {
        let (_session, service) = finished_session().await;
        let err = service.build(&BattleId::new("nope".to_string())).await;
        assert!(matches!(err, Err(ReplayError::BattleNotFound(_))));
    }
}
