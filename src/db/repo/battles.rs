//! Battle, participant, action, and result operations.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::warn;

use crate::domain::{
    ActionRecord, ActionType, Battle, BattleId, BattleResult, BattleStatus, Participant,
    ParticipantSide, PositionSide, ScenarioId, UserId,
};

use super::{ts_from_ms, Repository};

/// Position fields persisted for a participant after actions and settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantSnapshot {
    pub position: PositionSide,
    pub position_size: f64,
    pub entry_price: Option<f64>,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub current_balance: f64,
}

impl Repository {
    /// Insert a new battle and its creator participant atomically.
    pub async fn insert_battle(&self, battle: &Battle) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO battles
            (id, scenario_id, status, commit_hash, reveal_salt, starting_balance,
             current_tick_index, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(battle.id.as_str())
        .bind(battle.scenario_id.as_str())
        .bind(battle.status.as_str())
        .bind(&battle.commit_hash)
        .bind(&battle.reveal_salt)
        .bind(battle.starting_balance)
        .bind(battle.created_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        for participant in &battle.participants {
            insert_participant_tx(&mut tx, participant).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load a battle with its participants.
    pub async fn get_battle(&self, id: &BattleId) -> Result<Option<Battle>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, scenario_id, status, commit_hash, reveal_salt, tick_interval_ms,
                   total_ticks, starting_balance, current_tick_index, created_at,
                   matched_at, started_at, finished_at
            FROM battles WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let participants = self.get_participants(id).await?;
        Ok(Some(battle_from_row(&row, participants)))
    }

    async fn get_participants(&self, id: &BattleId) -> Result<Vec<Participant>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, battle_id, user_id, side, starting_balance, current_balance
            FROM battle_participants WHERE battle_id = ?
            ORDER BY side ASC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(participant_from_row).collect())
    }

    /// List battles, newest first, optionally filtered by status or participant.
    pub async fn list_battles(
        &self,
        status: Option<BattleStatus>,
        user_id: Option<&UserId>,
        limit: i64,
    ) -> Result<Vec<Battle>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT b.id
            FROM battles b
            LEFT JOIN battle_participants p ON p.battle_id = b.id
            WHERE (? IS NULL OR b.status = ?)
              AND (? IS NULL OR p.user_id = ?)
            ORDER BY b.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(user_id.map(|u| u.as_str()))
        .bind(user_id.map(|u| u.as_str()))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        let mut battles = Vec::with_capacity(rows.len());
        for row in rows {
            let id = BattleId::new(row.get::<String, _>("id"));
            if let Some(battle) = self.get_battle(&id).await? {
                battles.push(battle);
            }
        }
        Ok(battles)
    }

    /// Join transition: add the second participant and freeze the locked
    /// session parameters onto the battle row in one transaction.
    pub async fn mark_matched(
        &self,
        id: &BattleId,
        joiner: &Participant,
        tick_interval_ms: i64,
        total_ticks: i64,
        matched_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            UPDATE battles
            SET status = ?, matched_at = ?, tick_interval_ms = ?, total_ticks = ?
            WHERE id = ?
            "#,
        )
        .bind(BattleStatus::Matched.as_str())
        .bind(matched_at.timestamp_millis())
        .bind(tick_interval_ms)
        .bind(total_ticks)
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

        insert_participant_tx(&mut tx, joiner).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Update battle status, stamping started_at/finished_at as appropriate.
    pub async fn update_status(
        &self,
        id: &BattleId,
        status: BattleStatus,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().timestamp_millis();
        let query = match status {
            BattleStatus::Running => {
                sqlx::query("UPDATE battles SET status = ?, started_at = ? WHERE id = ?")
                    .bind(status.as_str())
                    .bind(now)
            }
            BattleStatus::Finished => {
                sqlx::query("UPDATE battles SET status = ?, finished_at = ? WHERE id = ?")
                    .bind(status.as_str())
                    .bind(now)
            }
            _ => sqlx::query("UPDATE battles SET status = ? WHERE id = ?").bind(status.as_str()),
        };

        query.bind(id.as_str()).execute(self.pool()).await?;
        Ok(())
    }

    /// Periodic persistence of the authoritative tick index.
    pub async fn update_current_tick_index(
        &self,
        id: &BattleId,
        index: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE battles SET current_tick_index = ? WHERE id = ?")
            .bind(index)
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Persist a participant's position snapshot.
    pub async fn update_participant_snapshot(
        &self,
        participant_id: &str,
        snapshot: &ParticipantSnapshot,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE battle_participants
            SET position = ?, position_size = ?, entry_price = ?,
                realized_pnl = ?, unrealized_pnl = ?, current_balance = ?
            WHERE id = ?
            "#,
        )
        .bind(snapshot.position.as_str())
        .bind(snapshot.position_size)
        .bind(snapshot.entry_price)
        .bind(snapshot.realized_pnl)
        .bind(snapshot.unrealized_pnl)
        .bind(snapshot.current_balance)
        .bind(participant_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Append one immutable action record.
    pub async fn insert_action(&self, action: &ActionRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO actions (battle_id, user_id, type, quantity, price, tick_index, server_ts)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(action.battle_id.as_str())
        .bind(action.user_id.as_str())
        .bind(action.action_type.as_str())
        .bind(action.quantity)
        .bind(action.price)
        .bind(action.tick_index)
        .bind(action.server_ts.timestamp_millis())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// All actions for a battle in server-timestamp order.
    pub async fn list_actions(&self, id: &BattleId) -> Result<Vec<ActionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT battle_id, user_id, type, quantity, price, tick_index, server_ts
            FROM actions WHERE battle_id = ?
            ORDER BY server_ts ASC, id ASC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(self.pool())
        .await?;

        let actions = rows
            .iter()
            .filter_map(|row| {
                let type_str: String = row.get("type");
                let Some(action_type) = ActionType::parse(&type_str) else {
                    warn!(battle_id = %id, r#type = %type_str, "Unknown action type in log, skipping");
                    return None;
                };
                Some(ActionRecord {
                    battle_id: BattleId::new(row.get("battle_id")),
                    user_id: UserId::new(row.get("user_id")),
                    action_type,
                    quantity: row.get("quantity"),
                    price: row.get("price"),
                    tick_index: row.get("tick_index"),
                    server_ts: ts_from_ms(row.get("server_ts")),
                })
            })
            .collect();

        Ok(actions)
    }

    /// Insert the battle result. Returns false if a result already exists,
    /// making duplicate settlement attempts visible as no-ops.
    pub async fn insert_result(&self, result: &BattleResult) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            r#"
            INSERT INTO battle_results (battle_id, winner_user_id, pnl_a, pnl_b, finalized_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(battle_id) DO NOTHING
            "#,
        )
        .bind(result.battle_id.as_str())
        .bind(result.winner_user_id.as_ref().map(|u| u.as_str()))
        .bind(result.pnl_a)
        .bind(result.pnl_b)
        .bind(result.finalized_at.timestamp_millis())
        .execute(self.pool())
        .await?;

        Ok(outcome.rows_affected() > 0)
    }

    pub async fn get_result(&self, id: &BattleId) -> Result<Option<BattleResult>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT battle_id, winner_user_id, pnl_a, pnl_b, finalized_at
            FROM battle_results WHERE battle_id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| BattleResult {
            battle_id: BattleId::new(row.get("battle_id")),
            winner_user_id: row
                .get::<Option<String>, _>("winner_user_id")
                .map(UserId::new),
            pnl_a: row.get("pnl_a"),
            pnl_b: row.get("pnl_b"),
            finalized_at: ts_from_ms(row.get("finalized_at")),
        }))
    }

    pub async fn count_results(&self, id: &BattleId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM battle_results WHERE battle_id = ?")
            .bind(id.as_str())
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }
}

async fn insert_participant_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    participant: &Participant,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO battle_participants
        (id, battle_id, user_id, side, starting_balance, current_balance)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&participant.id)
    .bind(participant.battle_id.as_str())
    .bind(participant.user_id.as_str())
    .bind(participant.side.as_str())
    .bind(participant.starting_balance)
    .bind(participant.current_balance)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn battle_from_row(row: &sqlx::sqlite::SqliteRow, participants: Vec<Participant>) -> Battle {
    let status_str: String = row.get("status");
    let status = BattleStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(status = %status_str, "Unknown battle status in database, treating as CANCELED");
        BattleStatus::Canceled
    });

    Battle {
        id: BattleId::new(row.get("id")),
        scenario_id: ScenarioId::new(row.get("scenario_id")),
        status,
        commit_hash: row.get("commit_hash"),
        reveal_salt: row.get("reveal_salt"),
        tick_interval_ms: row.get("tick_interval_ms"),
        total_ticks: row.get("total_ticks"),
        starting_balance: row.get("starting_balance"),
        current_tick_index: row.get("current_tick_index"),
        participants,
        created_at: ts_from_ms(row.get("created_at")),
        matched_at: row.get::<Option<i64>, _>("matched_at").map(ts_from_ms),
        started_at: row.get::<Option<i64>, _>("started_at").map(ts_from_ms),
        finished_at: row.get::<Option<i64>, _>("finished_at").map(ts_from_ms),
    }
}

fn participant_from_row(row: &sqlx::sqlite::SqliteRow) -> Participant {
    let side_str: String = row.get("side");
    Participant {
        id: row.get("id"),
        battle_id: BattleId::new(row.get("battle_id")),
        user_id: UserId::new(row.get("user_id")),
        side: ParticipantSide::parse(&side_str).unwrap_or(ParticipantSide::A),
        starting_balance: row.get("starting_balance"),
        current_balance: row.get("current_balance"),
    }
}
