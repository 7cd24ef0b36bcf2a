//! Ingestion service: store wiring, the initial load and the standings
//! refresh loop.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{Config, StoreBackend};
use crate::health::HealthState;
use crate::pipeline::{Pipeline, RunReport};
use crate::sources::{Fetcher, SourceBundle};
use crate::store::{Gateways, PostgresStore, RedisDocumentStore};

const CONNECT_RETRIES: u32 = 5;

pub struct IngestionService {
    config: Config,
    pipeline: Pipeline,
    fetcher: Fetcher,
    health: HealthState,
}

impl IngestionService {
    pub async fn new(config: Config) -> Result<Self> {
        let gateways = Self::connect_gateways(&config).await?;
        Self::with_gateways(config, gateways)
    }

    pub fn with_gateways(config: Config, gateways: Gateways) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self {
            pipeline: Pipeline::new(&config, gateways),
            fetcher,
            health: HealthState::new(),
            config,
        })
    }

    async fn connect_gateways(config: &Config) -> Result<Gateways> {
        match config.store_backend {
            StoreBackend::Postgres => {
                let relational = PostgresStore::connect(&config.database_url, CONNECT_RETRIES).await?;
                let documents = RedisDocumentStore::connect(&config.redis_url, CONNECT_RETRIES).await?;
                Ok(Gateways {
                    relational: Arc::new(relational),
                    documents: Arc::new(documents),
                })
            }
            StoreBackend::Memory => {
                warn!("STORE_BACKEND=memory: nothing will outlive this process");
                let (gateways, _, _) = Gateways::in_memory();
                Ok(gateways)
            }
        }
    }

    pub fn health(&self) -> HealthState {
        self.health.clone()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Full reconciliation of the snapshot under `DATA_DIR`.
    pub async fn initial_load(&self) -> Result<RunReport> {
        let bundle = SourceBundle::load_dir(&self.config.data_dir)
            .with_context(|| format!("Failed to load snapshot from {}", self.config.data_dir.display()))?;
        if bundle.is_empty() {
            warn!("Snapshot at {} holds no payloads", self.config.data_dir.display());
        }

        let report = self.pipeline.run(&bundle).await;
        self.health.record_run(&report).await;
        Ok(report)
    }

    /// Re-fetch and reconcile the current season standings.
    pub async fn refresh_once(&self) -> Result<RunReport> {
        let bundle = self.fetcher.current_standings(self.config.current_season).await;
        if bundle.is_empty() {
            return Err(anyhow!(
                "No standings source reachable for season {}",
                self.config.current_season
            ));
        }

        let report = self.pipeline.refresh_rankings(&bundle).await;
        let aborted = report.summary().aborted;
        if !aborted.is_empty() {
            return Err(anyhow!("Refresh aborted for {:?}", aborted));
        }
        Ok(report)
    }

    /// Standings refresh loop
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting standings refresh loop (season {}, interval: {}s)",
            self.config.current_season, self.config.refresh_interval_seconds
        );

        loop {
            tokio::time::sleep(Duration::from_secs(self.config.refresh_interval_seconds)).await;
            let start = std::time::Instant::now();

            match self.refresh_once().await {
                Ok(report) => {
                    self.health.record_run(&report).await;
                    info!(
                        "Refresh completed: {} records upserted in {:?}",
                        report.summary().upserted,
                        start.elapsed()
                    );
                }
                Err(e) => {
                    self.health.record_error().await;
                    error!("Refresh failed: {:?}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_load_of_missing_directory_is_an_empty_run() {
        let config = Config {
            data_dir: std::env::temp_dir().join(format!("league-missing-{}", uuid::Uuid::new_v4())),
            ..Config::default()
        };
        let (gateways, relational, _) = Gateways::in_memory();
        let service = IngestionService::with_gateways(config, gateways).unwrap();

        let report = service.initial_load().await.unwrap();
        // Leagues are seeded even without payloads.
        assert_eq!(relational.leagues().await.len(), 6);
        assert!(report.is_clean());
        assert!(service.health().last_summary.read().await.is_some());
    }
}
