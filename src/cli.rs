//! CLI subcommand implementations: serve, migrate, reset.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use eventcast_delivery::{Deliver, DispatchDriver};
use eventcast_orchestrator::{AppContext, Runtime, ScheduleWorker};
use eventcast_store::{StoreGateway, UrlCipher};
use sqlx::migrate::MigrateDatabase;
use sqlx::Sqlite;

use crate::config::Config;

async fn open_store(config: &Config) -> Result<StoreGateway> {
    let cipher = UrlCipher::from_base64_key(&config.database.encryption_key)
        .context("database.encryption_key must be a base64 encoded 32-byte key")?;

    if !Sqlite::database_exists(&config.database.url).await? {
        Sqlite::create_database(&config.database.url).await?;
        tracing::info!(url = %config.database.url, "database created");
    }

    let store = StoreGateway::connect(&config.database.url, cipher).await?;
    Ok(store)
}

/// Run migrations, resume live orchestrators, and drain reminder schedules
/// until interrupted.
pub async fn serve(config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    store.migrate().await?;

    let deliver: Arc<dyn Deliver> = Arc::new(DispatchDriver);
    let ctx = Arc::new(
        AppContext::new(store, deliver)
            .with_smtp_fallback(config.smtp_fallback())
            .with_default_reminder_offsets(config.runtime.default_reminder_offsets.clone())
            .with_completion_grace(chrono::Duration::hours(
                config.runtime.completion_grace_hours,
            )),
    );

    let runtime = Runtime::new(ctx.clone());
    let resumed = runtime.resume().await?;

    let worker = ScheduleWorker::new(
        ctx,
        Duration::from_secs(config.runtime.poll_interval_seconds),
    );
    let worker_task = tokio::spawn(worker.run());

    tracing::info!(resumed, "eventcast core running, ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    worker_task.abort();
    runtime.shutdown().await;
    Ok(())
}

pub async fn migrate(config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    store.migrate().await?;
    tracing::info!("migrations applied");
    Ok(())
}

/// Drop the database if it exists and recreate it with migrations.
pub async fn reset(config: Config) -> Result<()> {
    if Sqlite::database_exists(&config.database.url).await? {
        Sqlite::drop_database(&config.database.url).await?;
        tracing::info!(url = %config.database.url, "database dropped");
    }
    migrate(config).await
}
