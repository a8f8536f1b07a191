//! Postgres-backed repository adapters (§6.3, §4.11). Each method maps to one statement or
//! a small transactional group; `remove_abandoned` is the one operation that spans several
//! tables and therefore opens an explicit transaction.

use async_trait::async_trait;
use battleship_core_common::board::{Board, ShotType};
use battleship_core_common::error::{CoreError, CoreResult};
use battleship_core_common::{MatchId, PlayerStats, ShipId, UserGlobalStats, UserId};
use sqlx::{PgPool, Row};

use super::models::{Match, MatchWithPlayers, PersistedShot, Spectator};
use super::{MatchRepo, PlayerRepo, ShotRepo, SpectatorRepo, StatsRepo, UserGlobalStatsRepo};

pub struct PgMatchRepo {
    pool: PgPool,
}

impl PgMatchRepo {
    pub fn new(pool: PgPool) -> Self {
        PgMatchRepo { pool }
    }
}

fn sqlx_err(e: sqlx::Error) -> CoreError {
    CoreError::transient(format!("postgres error: {e}"))
}

#[async_trait]
impl MatchRepo for PgMatchRepo {
    async fn create_with_creator(&self, m: Match) -> CoreResult<Match> {
        sqlx::query(
            "INSERT INTO matches (id, name, access_code, is_public, is_matchmaking, max_players, \
             mode, difficulty, team_count, created_by_id, status, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)",
        )
        .bind(m.id)
        .bind(&m.name)
        .bind(&m.access_code)
        .bind(m.is_public)
        .bind(m.is_matchmaking)
        .bind(m.max_players as i32)
        .bind(serde_json::to_string(&m.mode).unwrap())
        .bind(serde_json::to_string(&m.difficulty).unwrap())
        .bind(m.team_count.map(|t| t as i32))
        .bind(m.created_by_id)
        .bind(serde_json::to_string(&m.status).unwrap())
        .bind(m.created_at)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;

        sqlx::query("INSERT INTO match_players (id, match_id, user_id, joined_at) VALUES ($1,$2,$3,$4)")
            .bind(uuid::Uuid::new_v4())
            .bind(m.id)
            .bind(m.created_by_id)
            .bind(m.created_at)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;

        Ok(m)
    }

    async fn find_by_id(&self, match_id: MatchId) -> CoreResult<Option<MatchWithPlayers>> {
        let Some(row) = sqlx::query(
            "SELECT id, name, access_code, is_public, is_matchmaking, max_players, mode, \
             difficulty, team_count, created_by_id, status, board, created_at \
             FROM matches WHERE id = $1",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_err)?
        else {
            return Ok(None);
        };

        let board_json: Option<serde_json::Value> = row.try_get("board").map_err(sqlx_err)?;
        let board = board_json.map(|v| serde_json::from_value(v)).transpose().map_err(|e| CoreError::fatal(e.to_string()))?;
        let mode_raw: String = row.try_get("mode").map_err(sqlx_err)?;
        let difficulty_raw: String = row.try_get("difficulty").map_err(sqlx_err)?;
        let status_raw: String = row.try_get("status").map_err(sqlx_err)?;

        let m = Match {
            id: row.try_get("id").map_err(sqlx_err)?,
            name: row.try_get("name").map_err(sqlx_err)?,
            access_code: row.try_get("access_code").map_err(sqlx_err)?,
            is_public: row.try_get("is_public").map_err(sqlx_err)?,
            is_matchmaking: row.try_get("is_matchmaking").map_err(sqlx_err)?,
            max_players: row.try_get::<i32, _>("max_players").map_err(sqlx_err)? as u32,
            mode: serde_json::from_str(&mode_raw).map_err(|e| CoreError::fatal(e.to_string()))?,
            difficulty: serde_json::from_str(&difficulty_raw).map_err(|e| CoreError::fatal(e.to_string()))?,
            team_count: row.try_get::<Option<i32>, _>("team_count").map_err(sqlx_err)?.map(|t| t as u32),
            created_by_id: row.try_get("created_by_id").map_err(sqlx_err)?,
            status: serde_json::from_str(&status_raw).map_err(|e| CoreError::fatal(e.to_string()))?,
            board,
            created_at: row.try_get("created_at").map_err(sqlx_err)?,
        };

        let player_rows = sqlx::query(
            "SELECT id, match_id, user_id, team, is_winner, left_at, joined_at \
             FROM match_players WHERE match_id = $1",
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_err)?;
        let players = player_rows
            .into_iter()
            .map(|r| {
                Ok(super::models::MatchPlayer {
                    id: r.try_get("id").map_err(sqlx_err)?,
                    match_id: r.try_get("match_id").map_err(sqlx_err)?,
                    user_id: r.try_get("user_id").map_err(sqlx_err)?,
                    team: r.try_get("team").map_err(sqlx_err)?,
                    is_winner: r.try_get("is_winner").map_err(sqlx_err)?,
                    left_at: r.try_get("left_at").map_err(sqlx_err)?,
                    joined_at: r.try_get("joined_at").map_err(sqlx_err)?,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        let spectator_rows = sqlx::query("SELECT match_id, user_id FROM spectators WHERE match_id = $1")
            .bind(match_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_err)?;
        let spectators = spectator_rows
            .into_iter()
            .map(|r| {
                Ok(Spectator {
                    match_id: r.try_get("match_id").map_err(sqlx_err)?,
                    user_id: r.try_get("user_id").map_err(sqlx_err)?,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        let user_ids: Vec<UserId> = players.iter().map(|p| p.user_id).collect();
        let user_rows = if user_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query("SELECT id, nickname, color FROM users WHERE id = ANY($1)")
                .bind(&user_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(sqlx_err)?
        };
        let users = user_rows
            .into_iter()
            .map(|r| {
                let u = super::models::User {
                    id: r.try_get("id").map_err(sqlx_err)?,
                    nickname: r.try_get("nickname").map_err(sqlx_err)?,
                    color: r.try_get("color").map_err(sqlx_err)?,
                };
                Ok((u.id, u))
            })
            .collect::<CoreResult<std::collections::HashMap<_, _>>>()?;

        Ok(Some(MatchWithPlayers { m, players, users, spectators }))
    }

    async fn update_creator(&self, match_id: MatchId, new_creator_id: UserId) -> CoreResult<()> {
        sqlx::query("UPDATE matches SET created_by_id = $1 WHERE id = $2")
            .bind(new_creator_id)
            .bind(match_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn update_start_board(&self, match_id: MatchId, board: Board) -> CoreResult<()> {
        let board_json = serde_json::to_value(&board).map_err(|e| CoreError::fatal(e.to_string()))?;
        sqlx::query("UPDATE matches SET board = $1, status = 'in_progress' WHERE id = $2")
            .bind(board_json)
            .bind(match_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn update_board(&self, match_id: MatchId, board: Board) -> CoreResult<()> {
        let board_json = serde_json::to_value(&board).map_err(|e| CoreError::fatal(e.to_string()))?;
        sqlx::query("UPDATE matches SET board = $1 WHERE id = $2")
            .bind(board_json)
            .bind(match_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn mark_finished(&self, match_id: MatchId) -> CoreResult<()> {
        sqlx::query("UPDATE matches SET status = 'finished' WHERE id = $1")
            .bind(match_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn remove_abandoned(&self, match_id: MatchId) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;
        sqlx::query("DELETE FROM shots WHERE match_id = $1").bind(match_id).execute(&mut *tx).await.map_err(sqlx_err)?;
        sqlx::query("DELETE FROM spectators WHERE match_id = $1").bind(match_id).execute(&mut *tx).await.map_err(sqlx_err)?;
        sqlx::query("DELETE FROM match_players WHERE match_id = $1").bind(match_id).execute(&mut *tx).await.map_err(sqlx_err)?;
        sqlx::query("DELETE FROM matches WHERE id = $1").bind(match_id).execute(&mut *tx).await.map_err(sqlx_err)?;
        tx.commit().await.map_err(sqlx_err)?;
        Ok(())
    }

    async fn add_player(&self, match_id: MatchId, user_id: UserId, team: Option<i32>) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO match_players (id, match_id, user_id, team, joined_at) VALUES ($1,$2,$3,$4,now()) \
             ON CONFLICT (match_id, user_id) DO NOTHING",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(match_id)
        .bind(user_id)
        .bind(team)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(())
    }
}

pub struct PgPlayerRepo {
    pool: PgPool,
}

impl PgPlayerRepo {
    pub fn new(pool: PgPool) -> Self {
        PgPlayerRepo { pool }
    }
}

#[async_trait]
impl PlayerRepo for PgPlayerRepo {
    async fn mark_defeated_by_user(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        sqlx::query("UPDATE match_players SET left_at = now() WHERE match_id = $1 AND user_id = $2")
            .bind(match_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn mark_defeated_by_id(&self, player_id: uuid::Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE match_players SET left_at = now() WHERE id = $1")
            .bind(player_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn mark_winner(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        sqlx::query("UPDATE match_players SET is_winner = true WHERE match_id = $1 AND user_id = $2")
            .bind(match_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn mark_team_players_as_winners(&self, match_id: MatchId, team: i32) -> CoreResult<()> {
        sqlx::query("UPDATE match_players SET is_winner = true WHERE match_id = $1 AND team = $2")
            .bind(match_id)
            .bind(team)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }

    async fn mark_left(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        self.mark_defeated_by_user(match_id, user_id).await
    }
}

pub struct PgShotRepo {
    pool: PgPool,
}

impl PgShotRepo {
    pub fn new(pool: PgPool) -> Self {
        PgShotRepo { pool }
    }
}

#[async_trait]
impl ShotRepo for PgShotRepo {
    async fn register(
        &self,
        match_id: MatchId,
        shooter_id: UserId,
        shot_type: ShotType,
        target: (u8, u8),
        hit: bool,
        sunk_ship_id: Option<ShipId>,
    ) -> CoreResult<PersistedShot> {
        let id = uuid::Uuid::new_v4();
        let created_at = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO shots (id, match_id, shooter_id, shot_type, row, col, hit, sunk_ship_id, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
        )
        .bind(id)
        .bind(match_id)
        .bind(shooter_id)
        .bind(serde_json::to_string(&shot_type).unwrap())
        .bind(target.0 as i32)
        .bind(target.1 as i32)
        .bind(hit)
        .bind(sunk_ship_id)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;

        Ok(PersistedShot { id, match_id, shooter_id, shot_type, row: target.0, col: target.1, hit, sunk_ship_id, created_at })
    }
}

pub struct PgSpectatorRepo {
    pool: PgPool,
}

impl PgSpectatorRepo {
    pub fn new(pool: PgPool) -> Self {
        PgSpectatorRepo { pool }
    }
}

#[async_trait]
impl SpectatorRepo for PgSpectatorRepo {
    async fn find_first(&self, match_id: MatchId, user_id: UserId) -> CoreResult<Option<Spectator>> {
        let row = sqlx::query("SELECT match_id, user_id FROM spectators WHERE match_id = $1 AND user_id = $2")
            .bind(match_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(row.map(|_| Spectator { match_id, user_id }))
    }

    async fn insert(&self, match_id: MatchId, user_id: UserId) -> CoreResult<()> {
        sqlx::query("INSERT INTO spectators (match_id, user_id) VALUES ($1,$2) ON CONFLICT DO NOTHING")
            .bind(match_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_err)?;
        Ok(())
    }
}

pub struct PgStatsRepo {
    pool: PgPool,
}

impl PgStatsRepo {
    pub fn new(pool: PgPool) -> Self {
        PgStatsRepo { pool }
    }
}

#[async_trait]
impl StatsRepo for PgStatsRepo {
    async fn save_many(&self, match_id: MatchId, stats: Vec<PlayerStats>) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(sqlx_err)?;
        for s in stats {
            sqlx::query(
                "INSERT INTO player_stats (match_id, user_id, data) VALUES ($1,$2,$3) \
                 ON CONFLICT (match_id, user_id) DO UPDATE SET data = excluded.data",
            )
            .bind(match_id)
            .bind(s.user_id)
            .bind(serde_json::to_value(&s).map_err(|e| CoreError::fatal(e.to_string()))?)
            .execute(&mut *tx)
            .await
            .map_err(sqlx_err)?;
        }
        tx.commit().await.map_err(sqlx_err)?;
        Ok(())
    }

    async fn find_by_match_id(&self, match_id: MatchId) -> CoreResult<Vec<PlayerStats>> {
        let rows = sqlx::query("SELECT data FROM player_stats WHERE match_id = $1")
            .bind(match_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_err)?;
        rows.into_iter()
            .map(|r| {
                let v: serde_json::Value = r.try_get("data").map_err(sqlx_err)?;
                serde_json::from_value(v).map_err(|e| CoreError::fatal(e.to_string()))
            })
            .collect()
    }

    async fn find_by_user_id_with_match(&self, user_id: UserId) -> CoreResult<Vec<PlayerStats>> {
        let rows = sqlx::query("SELECT data FROM player_stats WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_err)?;
        rows.into_iter()
            .map(|r| {
                let v: serde_json::Value = r.try_get("data").map_err(sqlx_err)?;
                serde_json::from_value(v).map_err(|e| CoreError::fatal(e.to_string()))
            })
            .collect()
    }
}

pub struct PgUserGlobalStatsRepo {
    pool: PgPool,
}

impl PgUserGlobalStatsRepo {
    pub fn new(pool: PgPool) -> Self {
        PgUserGlobalStatsRepo { pool }
    }
}

#[async_trait]
impl UserGlobalStatsRepo for PgUserGlobalStatsRepo {
    async fn find_by_user_id(&self, user_id: UserId) -> CoreResult<Option<UserGlobalStats>> {
        let row = sqlx::query("SELECT data FROM user_global_stats WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_err)?;
        row.map(|r| {
            let v: serde_json::Value = r.try_get("data").map_err(sqlx_err)?;
            serde_json::from_value(v).map_err(|e| CoreError::fatal(e.to_string()))
        })
        .transpose()
    }

    async fn upsert_from_match_stats(&self, stats: &PlayerStats, now: chrono::DateTime<chrono::Utc>) -> CoreResult<UserGlobalStats> {
        let mut current = self.find_by_user_id(stats.user_id).await?.unwrap_or(UserGlobalStats {
            user_id: stats.user_id,
            ..Default::default()
        });
        current.apply_match(stats, now);
        sqlx::query(
            "INSERT INTO user_global_stats (user_id, data) VALUES ($1,$2) \
             ON CONFLICT (user_id) DO UPDATE SET data = excluded.data",
        )
        .bind(stats.user_id)
        .bind(serde_json::to_value(&current).map_err(|e| CoreError::fatal(e.to_string()))?)
        .execute(&self.pool)
        .await
        .map_err(sqlx_err)?;
        Ok(current)
    }
}
