//! Service configuration, built once and passed to the pipeline.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

use crate::resolver::{OverrideTable, SubstringPolicy};

pub const DEFAULT_SKIP_API_TEAMS: [&str; 4] = ["Le Havre", "Saint-Étienne", "Auxerre", "Angers SCO"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Postgres for entities, Redis for match documents.
    Postgres,
    /// In-process stores; nothing survives the run.
    Memory,
}

/// Configuration
#[derive(Clone)]
pub struct Config {
    /// football-data.org token; only the refresh loop needs it.
    pub football_data_api_key: Option<String>,
    pub database_url: String,
    pub redis_url: String,
    pub store_backend: StoreBackend,
    pub data_dir: PathBuf,
    pub seasons: Vec<i32>,
    pub current_season: i32,
    /// If true, run the initial load and exit (no refresh loop)
    pub run_once: bool,
    pub refresh_interval_seconds: u64,
    pub api_request_delay_seconds: u64,
    pub page_request_delay_seconds: u64,
    pub health_port: u16,
    pub substring_policy: SubstringPolicy,
    pub team_overrides: OverrideTable,
    pub skip_api_teams: Vec<String>,
}

/// In-memory dry run with the stock seasons and tables.
impl Default for Config {
    fn default() -> Self {
        Self {
            football_data_api_key: None,
            database_url: String::new(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            store_backend: StoreBackend::Memory,
            data_dir: PathBuf::from("data"),
            seasons: vec![2022, 2023, 2024],
            current_season: 2024,
            run_once: true,
            refresh_interval_seconds: 86_400,
            api_request_delay_seconds: 6,
            page_request_delay_seconds: 3,
            health_port: 8084,
            substring_policy: SubstringPolicy::FirstByStoreOrder,
            team_overrides: OverrideTable::default(),
            skip_api_teams: DEFAULT_SKIP_API_TEAMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Secrets/config:
        // - Docker Compose: read from /run/secrets/*
        // - local runs: env vars, optionally from a .env file loaded by main

        let football_data_api_key = match env::var("FOOTBALL_DATA_API_KEY") {
            Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
            Ok(_) => return Err(anyhow!("FOOTBALL_DATA_API_KEY is set but empty")),
            Err(_) => read_secret_file("/run/secrets/football_data_api_key", "football_data_api_key").ok(),
        };
        if let Some(key) = &football_data_api_key {
            reject_placeholder("FOOTBALL_DATA_API_KEY", key)?;
        }

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => return Err(anyhow!("STORE_BACKEND must be 'postgres' or 'memory', got '{}'", other)),
        };

        let db_user = env::var("DB_USER").unwrap_or_else(|_| "football".to_string());
        let db_name = env::var("DB_NAME").unwrap_or_else(|_| "football_predictor".to_string());
        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());

        let database_url = match env::var("DATABASE_URL") {
            Ok(v) if !v.trim().is_empty() => v,
            Ok(_) => return Err(anyhow!("DATABASE_URL is set but empty")),
            Err(_) if store_backend == StoreBackend::Memory => String::new(),
            Err(_) => {
                let db_password = read_secret_file("/run/secrets/db_password", "db_password")?;
                format!("postgresql://{}:{}@{}:{}/{}", db_user, db_password, db_host, db_port, db_name)
            }
        };

        let redis_url = match env::var("REDIS_URL") {
            Ok(v) if !v.trim().is_empty() => v,
            Ok(_) => return Err(anyhow!("REDIS_URL is set but empty")),
            Err(_) => "redis://127.0.0.1:6379".to_string(),
        };

        let seasons = match env::var("SEASONS") {
            Ok(v) => parse_seasons(&v)?,
            Err(_) => vec![2022, 2023, 2024],
        };
        let current_season = match env::var("CURRENT_SEASON") {
            Ok(v) => v.trim().parse().context("CURRENT_SEASON must be a year")?,
            Err(_) => *seasons.last().ok_or_else(|| anyhow!("SEASONS is empty"))?,
        };

        let substring_policy = if env_flag("RESOLVER_STRICT") {
            SubstringPolicy::Strict
        } else {
            SubstringPolicy::FirstByStoreOrder
        };

        let mut team_overrides = OverrideTable::default();
        if let Ok(v) = env::var("TEAM_OVERRIDES") {
            for (candidate, canonical) in parse_overrides(&v)? {
                team_overrides.insert(&candidate, &canonical);
            }
        }

        let skip_api_teams = match env::var("SKIP_API_TEAMS") {
            Ok(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => DEFAULT_SKIP_API_TEAMS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            football_data_api_key,
            database_url,
            redis_url,
            store_backend,
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
            seasons,
            current_season,
            run_once: env_flag("RUN_ONCE"),
            refresh_interval_seconds: env_number("REFRESH_INTERVAL_SECONDS", 86_400),
            api_request_delay_seconds: env_number("API_REQUEST_DELAY_SECONDS", 6),
            page_request_delay_seconds: env_number("PAGE_REQUEST_DELAY_SECONDS", 3),
            health_port: env_number("HEALTH_PORT", 8084),
            substring_policy,
            team_overrides,
            skip_api_teams,
        })
    }
}

/// Read a secret from Docker secret file
fn read_secret_file(file_path: &str, secret_name: &str) -> Result<String> {
    std::fs::read_to_string(file_path)
        .map(|s| s.trim().to_string())
        .context(format!(
            "Secret file not found at {} ({}). Set the variable or mount the secret.",
            file_path, secret_name
        ))
}

fn reject_placeholder(name: &str, value: &str) -> Result<()> {
    let lower = value.trim().to_lowercase();
    if lower.contains("change_me") || lower.contains("your_") || lower.starts_with("sample") {
        return Err(anyhow!("{} appears to be a placeholder value; replace with your real key", name));
    }
    Ok(())
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn env_number<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn parse_seasons(raw: &str) -> Result<Vec<i32>> {
    let mut seasons = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let season: i32 = part
            .parse()
            .with_context(|| format!("invalid season '{}' in SEASONS", part))?;
        seasons.push(season);
    }
    if seasons.is_empty() {
        return Err(anyhow!("SEASONS must list at least one season"));
    }
    seasons.sort_unstable();
    seasons.dedup();
    Ok(seasons)
}

/// `US Quevilly Rouen=US Quevilly-Rouen;Paris SG=PSG`
pub fn parse_overrides(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (candidate, canonical) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("TEAM_OVERRIDES entry '{}' is not candidate=canonical", pair))?;
            Ok((candidate.trim().to_string(), canonical.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seasons_are_sorted_and_deduplicated() {
        assert_eq!(parse_seasons("2024, 2022,2023,2024").unwrap(), vec![2022, 2023, 2024]);
        assert!(parse_seasons("2022,next").is_err());
        assert!(parse_seasons(" , ").is_err());
    }

    #[test]
    fn override_pairs() {
        let pairs = parse_overrides("US Quevilly Rouen=US Quevilly-Rouen; Paris SG = PSG;").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("US Quevilly Rouen".to_string(), "US Quevilly-Rouen".to_string()),
                ("Paris SG".to_string(), "PSG".to_string()),
            ]
        );
        assert!(parse_overrides("no separator").is_err());
    }

    #[test]
    fn placeholder_keys_are_rejected() {
        assert!(reject_placeholder("KEY", "your_api_key").is_err());
        assert!(reject_placeholder("KEY", "CHANGE_ME").is_err());
        assert!(reject_placeholder("KEY", "3f9a1c").is_ok());
    }
}
