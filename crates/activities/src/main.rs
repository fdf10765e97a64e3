use std::sync::Arc;

use anyhow::{Context, Result};
use syncflow_activities::{
    driver, ActivityRegistry, JobActivities, StoreBackend, TracingEventSink, WorkerConfig,
};
use syncflow_jobs::{InMemoryJobStore, JobStore, PostgresJobStore};
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries responses
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncflow_activities=info,syncflow_jobs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("syncflow-worker starting...");

    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    tracing::info!(
        store = ?config.store,
        max_attempts = config.retry.max_attempts,
        "Worker configured"
    );

    let store: Arc<dyn JobStore> = match config.store {
        StoreBackend::Memory => Arc::new(InMemoryJobStore::new()),
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            let store = PostgresJobStore::connect(url, config.max_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            store.migrate().await.context("failed to run migrations")?;
            tracing::info!("Connected to PostgreSQL job store");
            Arc::new(store)
        }
    };

    let service = Arc::new(JobActivities::new(store, Arc::new(TracingEventSink)));
    let registry = ActivityRegistry::with_job_activities(service);
    tracing::info!(activities = registry.len(), "Activity registry ready");

    let handled = driver::run(
        &registry,
        &config.retry,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
    .context("failed to serve activity requests")?;

    tracing::info!(handled, "Worker shutdown complete");
    Ok(())
}
