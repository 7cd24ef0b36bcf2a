//! `GET /health`: service status plus the summary of the last run.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::pipeline::{RunReport, RunSummary};

const DEGRADED_AFTER: usize = 5;
const UNAVAILABLE_AFTER: usize = 10;

/// Service health state
#[derive(Clone, Default)]
pub struct HealthState {
    pub last_run_time: Arc<RwLock<Option<DateTime<Utc>>>>,
    pub last_summary: Arc<RwLock<Option<RunSummary>>>,
    pub error_count: Arc<RwLock<usize>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_run(&self, report: &RunReport) {
        *self.last_run_time.write().await = Some(report.finished_at.unwrap_or_else(Utc::now));
        *self.last_summary.write().await = Some(report.summary());
        *self.error_count.write().await = 0;
    }

    pub async fn record_error(&self) {
        *self.error_count.write().await += 1;
    }

    pub fn router(self) -> Router {
        Router::new().route("/health", get(health_handler)).with_state(self)
    }
}

/// Health check handler
pub async fn health_handler(State(health): State<HealthState>) -> (StatusCode, Json<Value>) {
    let last_run = health.last_run_time.read().await;
    let summary = health.last_summary.read().await;
    let errors = *health.error_count.read().await;

    let status = if errors > DEGRADED_AFTER { "degraded" } else { "ok" };
    let http_status = if errors > UNAVAILABLE_AFTER {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        http_status,
        Json(json!({
            "service": "league-ingestion",
            "version": env!("CARGO_PKG_VERSION"),
            "status": status,
            "last_run": last_run.map(|t| t.to_rfc3339()),
            "last_run_summary": *summary,
            "consecutive_errors": errors
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UpsertCount;
    use crate::pipeline::EntityKind;

    #[tokio::test]
    async fn reports_last_summary() {
        let health = HealthState::new();
        let mut report = RunReport::start();
        report.entity(EntityKind::Teams).processed = 2;
        report.entity(EntityKind::Teams).record_upserts(UpsertCount { inserted: 2, updated: 0 });
        report.finish();
        health.record_run(&report).await;

        let (status, Json(body)) = health_handler(State(health)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["last_run_summary"]["upserted"], 2);
    }

    #[tokio::test]
    async fn repeated_failures_degrade_then_fail() {
        let health = HealthState::new();
        for _ in 0..6 {
            health.record_error().await;
        }
        let (status, Json(body)) = health_handler(State(health.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");

        for _ in 0..5 {
            health.record_error().await;
        }
        let (status, _) = health_handler(State(health)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
