use anyhow::{Context, Result};
use tracing::{error, info};

use league_ingestion::{Config, IngestionService};

#[tokio::main]
async fn main() -> Result<()> {
    // Local runs may keep settings in .env; containers use env vars and secret files.
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("league_ingestion=info".parse()?),
        )
        .init();

    info!("Football League Ingestion Service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let health_port = config.health_port;
    let run_once = config.run_once;

    let service = IngestionService::new(config).await?;

    // Start health check server
    let app = service.health().router();
    let health_addr = format!("0.0.0.0:{}", health_port);
    info!("Health endpoint listening on {}", health_addr);

    let listener = tokio::net::TcpListener::bind(&health_addr)
        .await
        .with_context(|| format!("Failed to bind {}", health_addr))?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Health server stopped: {}", e);
        }
    });

    match service.initial_load().await {
        Ok(report) => {
            let summary = report.summary();
            info!(
                "Initial load completed: {} upserted, {} unresolved references",
                summary.upserted, summary.unresolved
            );
        }
        Err(e) => {
            error!("Initial load failed: {:?}", e);
            return Err(e);
        }
    }

    // Check if running in one-shot mode
    if run_once {
        info!("Running in one-shot mode (RUN_ONCE=true)");
        return Ok(());
    }

    // Handle shutdown gracefully (continuous mode)
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        result = service.run() => {
            if let Err(e) = result {
                error!("Service error: {:?}", e);
            }
        }
        _ = ctrl_c => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
