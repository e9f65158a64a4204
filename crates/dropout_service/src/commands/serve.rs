//! Serve command - runs the HTTP API together with the auto-retrain
//! scheduler.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use config::Config;
use database::run_migrations;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

use crate::api::{router, AppState};
use crate::ingest::bulk_load_csv;
use crate::scheduler::{AutoTrainer, SchedulerConfig};
use crate::trainer::{TrainParams, TrainerSettings};

/// Runs the serve command until ctrl-c.
///
/// # Errors
///
/// Returns an error if migrations, the bulk import, or binding the
/// listener fails.
pub async fn run(pool: &SqlitePool, config: Config) -> Result<()> {
    run_with_shutdown(pool.clone(), config, shutdown_signal()).await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

/// Serves until `shutdown` resolves, then stops the scheduler and
/// returns.
pub(crate) async fn run_with_shutdown<F>(
    pool: SqlitePool,
    config: Config,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    run_migrations(&pool).await?;

    if let Some(csv_path) = &config.bulk_csv_path {
        let imported = bulk_load_csv(&pool, csv_path).await?;
        info!(imported, path = %csv_path.display(), "Bulk import finished");
    }

    let train_lock = Arc::new(Mutex::new(()));
    let settings = TrainerSettings {
        model_path: config.model_path.clone(),
        min_training_rows: config.min_training_rows,
    };

    let scheduler = AutoTrainer::new(
        pool.clone(),
        SchedulerConfig {
            interval: config.auto_train_interval,
            labeled_threshold: config.auto_train_threshold,
            run_initial: config.run_initial_train,
        },
        settings,
        TrainParams::default(),
        Arc::clone(&train_lock),
    )
    .start();

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        pool,
        config: Arc::new(config),
        train_lock,
    };

    let listener = TcpListener::bind(&addr).await?;
    info!(addr, "Listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    scheduler.stop().await;
    info!("Server stopped");
    Ok(())
}
