//! Points awards written to the ledger at settlement.

use std::sync::Arc;

use tracing::info;

use crate::db::repo::LeaderboardEntry;
use crate::db::Repository;
use crate::domain::{BattleId, UserId};

const WIN_POINTS: i64 = 100;
const LOSS_POINTS: i64 = 25;
const DRAW_POINTS: i64 = 50;
const MAX_BONUS_POINTS: i64 = 50;

/// One computed award: total points and the ledger reason string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsAward {
    pub points: i64,
    pub reason: String,
}

/// Computes settlement awards and records them in the points ledger.
pub struct PointsService {
    repo: Arc<Repository>,
}

impl PointsService {
    pub fn new(repo: Arc<Repository>) -> Self {
        PointsService { repo }
    }

    /// Base points by outcome plus a performance bonus of floor(pnl% * 10),
    /// capped, for positive PnL only. The bonus applies to losers too.
    pub fn compute(is_winner: bool, is_draw: bool, pnl_percent: f64) -> PointsAward {
        let (base, label) = if is_draw {
            (DRAW_POINTS, "DRAW")
        } else if is_winner {
            (WIN_POINTS, "WIN")
        } else {
            (LOSS_POINTS, "LOSS")
        };

        let bonus = if pnl_percent > 0.0 {
            ((pnl_percent * 10.0).floor() as i64).min(MAX_BONUS_POINTS)
        } else {
            0
        };

        let reason = if bonus > 0 {
            format!("{}_WITH_BONUS", label)
        } else {
            label.to_string()
        };

        PointsAward {
            points: base + bonus,
            reason,
        }
    }

    /// Compute and persist one award.
    pub async fn award(
        &self,
        user_id: &UserId,
        battle_id: &BattleId,
        is_winner: bool,
        is_draw: bool,
        pnl_percent: f64,
    ) -> Result<PointsAward, sqlx::Error> {
        let award = Self::compute(is_winner, is_draw, pnl_percent);
        self.repo
            .insert_points(user_id, battle_id, award.points, &award.reason)
            .await?;
        info!(
            battle_id = %battle_id,
            user_id = %user_id,
            points = award.points,
            reason = %award.reason,
            "Points awarded"
        );
        Ok(award)
    }

    pub async fn total(&self, user_id: &UserId) -> Result<i64, sqlx::Error> {
        self.repo.total_points(user_id).await
    }

    pub async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
        self.repo.leaderboard(limit).await
    }
}
