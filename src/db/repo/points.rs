//! Points ledger operations.

use chrono::Utc;
use sqlx::Row;

use crate::domain::{BattleId, UserId};

use super::Repository;

/// One leaderboard row: total points for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub total_points: i64,
}

impl Repository {
    /// Append one points ledger row.
    pub async fn insert_points(
        &self,
        user_id: &UserId,
        battle_id: &BattleId,
        points: i64,
        reason: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO points_ledger (user_id, battle_id, points, reason, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id.as_str())
        .bind(battle_id.as_str())
        .bind(points)
        .bind(reason)
        .bind(Utc::now().timestamp_millis())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Lifetime point total for a user.
    pub async fn total_points(&self, user_id: &UserId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(points), 0) AS total FROM points_ledger WHERE user_id = ?",
        )
        .bind(user_id.as_str())
        .fetch_one(self.pool())
        .await?;
        Ok(row.get("total"))
    }

    /// Top users by total points.
    pub async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, SUM(points) AS total
            FROM points_ledger
            GROUP BY user_id
            ORDER BY total DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|row| LeaderboardEntry {
                user_id: UserId::new(row.get("user_id")),
                total_points: row.get("total"),
            })
            .collect())
    }
}
