//! Postgres gateway for teams, people, leagues and rankings.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

use super::RelationalStore;
use crate::error::GatewayError;
use crate::model::{League, LeagueId, LeagueName, Player, Ranking, Staff, Team, TeamId, UpsertCount};

const MIGRATION: &str = include_str!("../../migrations/001_init.sql");

/// Short name folded the same way as `normalize::lookup_key`. The unique
/// index `team_shortname_key_idx` is built on this exact expression.
const TEAM_KEY_SQL: &str = r"lower(regexp_replace(trim(shortname), '\s+', ' ', 'g'))";

/// Conflicts are inferred from the folded-key index, so `Paris  FC` and
/// `paris fc` update one row.
fn upsert_team_sql() -> String {
    format!(
        r#"
        INSERT INTO team (name, shortname, stadium, founded, country)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (({})) DO UPDATE SET
            name = EXCLUDED.name,
            shortname = EXCLUDED.shortname,
            stadium = EXCLUDED.stadium,
            founded = EXCLUDED.founded,
            country = EXCLUDED.country
        RETURNING (xmax = 0)
        "#,
        TEAM_KEY_SQL
    )
}

pub struct PostgresStore {
    db: PgPool,
}

impl PostgresStore {
    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(url: &str, max_retries: u32) -> Result<Self> {
        let db = Self::connect_db_with_retry(url, max_retries).await?;
        let store = Self { db };
        store.migrate().await?;
        Ok(store)
    }

    async fn connect_db_with_retry(url: &str, max_retries: u32) -> Result<PgPool> {
        let mut attempt = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await
            {
                Ok(pool) => {
                    info!("Connected to PostgreSQL");
                    return Ok(pool);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(anyhow!("Failed to connect to database after {} attempts: {}", max_retries, e));
                    }
                    warn!("Database connection attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    async fn migrate(&self) -> Result<()> {
        for statement in MIGRATION.split(';') {
            let trimmed = statement.trim();
            if trimmed.is_empty() || trimmed.lines().all(|l| l.trim_start().starts_with("--")) {
                continue;
            }
            sqlx::query(trimmed)
                .execute(&self.db)
                .await
                .with_context(|| format!("Failed to execute migration: {}", trimmed))?;
        }
        Ok(())
    }
}

#[async_trait]
impl RelationalStore for PostgresStore {
    async fn find_team_exact(&self, key: &str) -> Result<Option<(TeamId, String)>, GatewayError> {
        let sql = format!("SELECT id, shortname FROM team WHERE {} = $1 ORDER BY id LIMIT 1", TEAM_KEY_SQL);
        let row: Option<(i64, String)> = sqlx::query_as(&sql).bind(key).fetch_optional(&self.db).await?;
        Ok(row.map(|(id, shortname)| (TeamId(id), shortname)))
    }

    async fn find_teams_containing(&self, key: &str) -> Result<Vec<(TeamId, String)>, GatewayError> {
        let sql = format!(
            r#"
            SELECT id, shortname FROM (
                SELECT id, shortname, {} AS team_key FROM team
            ) t
            WHERE t.team_key <> ''
              AND (strpos(t.team_key, $1) > 0 OR strpos($1, t.team_key) > 0)
            ORDER BY id
            "#,
            TEAM_KEY_SQL
        );
        let rows: Vec<(i64, String)> = sqlx::query_as(&sql).bind(key).fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(|(id, shortname)| (TeamId(id), shortname)).collect())
    }

    async fn find_league(&self, name: LeagueName, season: i32) -> Result<Option<LeagueId>, GatewayError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM league WHERE name = $1 AND season = $2")
            .bind(name.as_str())
            .bind(season)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|(id,)| LeagueId(id)))
    }

    async fn upsert_teams(&self, teams: &[Team]) -> Result<UpsertCount, GatewayError> {
        let mut count = UpsertCount::default();
        if teams.is_empty() {
            return Ok(count);
        }

        let sql = upsert_team_sql();
        let mut tx = self.db.begin().await?;
        for team in teams {
            let (inserted,): (bool,) = sqlx::query_as(&sql)
            .bind(&team.name)
            .bind(&team.shortname)
            .bind(&team.stadium)
            .bind(team.founded)
            .bind(&team.country)
            .fetch_one(&mut *tx)
            .await?;
            count.record(inserted);
        }
        tx.commit().await?;

        info!("Upserted {} teams ({} new)", count.total(), count.inserted);
        Ok(count)
    }

    async fn upsert_leagues(&self, leagues: &[League]) -> Result<UpsertCount, GatewayError> {
        let mut count = UpsertCount::default();
        if leagues.is_empty() {
            return Ok(count);
        }

        let mut tx = self.db.begin().await?;
        for league in leagues {
            let (inserted,): (bool,) = sqlx::query_as(
                r#"
                INSERT INTO league (name, country, season)
                VALUES ($1, $2, $3)
                ON CONFLICT (name, season) DO UPDATE SET
                    country = EXCLUDED.country
                RETURNING (xmax = 0)
                "#,
            )
            .bind(league.name.as_str())
            .bind(&league.country)
            .bind(league.season)
            .fetch_one(&mut *tx)
            .await?;
            count.record(inserted);
        }
        tx.commit().await?;

        info!("Upserted {} leagues ({} new)", count.total(), count.inserted);
        Ok(count)
    }

    async fn upsert_staff(&self, staff: &[Staff]) -> Result<UpsertCount, GatewayError> {
        let mut count = UpsertCount::default();
        if staff.is_empty() {
            return Ok(count);
        }

        let mut tx = self.db.begin().await?;
        for member in staff {
            let (inserted,): (bool,) = sqlx::query_as(
                r#"
                INSERT INTO staff (first_name, last_name, birthdate, nationality, role, team_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (first_name, last_name, role, team_id) DO UPDATE SET
                    birthdate = EXCLUDED.birthdate,
                    nationality = EXCLUDED.nationality
                RETURNING (xmax = 0)
                "#,
            )
            .bind(&member.first_name)
            .bind(&member.last_name)
            .bind(member.birthdate)
            .bind(&member.nationality)
            .bind(member.role.as_str())
            .bind(member.team_id.0)
            .fetch_one(&mut *tx)
            .await?;
            count.record(inserted);
        }
        tx.commit().await?;

        info!("Upserted {} staff ({} new)", count.total(), count.inserted);
        Ok(count)
    }

    async fn upsert_players(&self, players: &[Player]) -> Result<UpsertCount, GatewayError> {
        let mut count = UpsertCount::default();
        if players.is_empty() {
            return Ok(count);
        }

        let mut tx = self.db.begin().await?;
        for player in players {
            let (inserted,): (bool,) = sqlx::query_as(
                r#"
                INSERT INTO player (first_name, last_name, birthdate, nationality, position, team_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (first_name, last_name, birthdate, team_id) DO UPDATE SET
                    nationality = EXCLUDED.nationality,
                    position = EXCLUDED.position
                RETURNING (xmax = 0)
                "#,
            )
            .bind(&player.first_name)
            .bind(&player.last_name)
            .bind(player.birthdate)
            .bind(&player.nationality)
            .bind(player.position.as_str())
            .bind(player.team_id.0)
            .fetch_one(&mut *tx)
            .await?;
            count.record(inserted);
        }
        tx.commit().await?;

        info!("Upserted {} players ({} new)", count.total(), count.inserted);
        Ok(count)
    }

    async fn upsert_rankings(&self, rankings: &[Ranking]) -> Result<UpsertCount, GatewayError> {
        let mut count = UpsertCount::default();
        if rankings.is_empty() {
            return Ok(count);
        }

        let mut tx = self.db.begin().await?;
        for ranking in rankings {
            let (inserted,): (bool,) = sqlx::query_as(
                r#"
                INSERT INTO ranking (
                    team_id, league_id, type, position, points, played,
                    goals_for, goals_against, won, draw, lost
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (team_id, league_id, type) DO UPDATE SET
                    position = EXCLUDED.position,
                    points = EXCLUDED.points,
                    played = EXCLUDED.played,
                    goals_for = EXCLUDED.goals_for,
                    goals_against = EXCLUDED.goals_against,
                    won = EXCLUDED.won,
                    draw = EXCLUDED.draw,
                    lost = EXCLUDED.lost
                RETURNING (xmax = 0)
                "#,
            )
            .bind(ranking.team_id.0)
            .bind(ranking.league_id.0)
            .bind(ranking.kind.as_str())
            .bind(ranking.position)
            .bind(ranking.points)
            .bind(ranking.played)
            .bind(ranking.goals_for)
            .bind(ranking.goals_against)
            .bind(ranking.won)
            .bind(ranking.draw)
            .bind(ranking.lost)
            .fetch_one(&mut *tx)
            .await?;
            count.record(inserted);
        }
        tx.commit().await?;

        info!("Upserted {} rankings ({} new)", count.total(), count.inserted);
        Ok(count)
    }
}
