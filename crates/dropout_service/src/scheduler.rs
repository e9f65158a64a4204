//! Auto-retrain scheduler.
//!
//! A periodic task that counts labeled records created since the last
//! training run and retrains once a configured threshold is met. Only one
//! training operation may run at a time: every tick takes the shared
//! training lock non-blockingly and is skipped, not queued, when the lock
//! is held (by a previous tick or by a manually triggered run).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use database::{StudentRepository, TrainingRunRepository};
use sqlx::SqlitePool;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::trainer::{train_and_save_model, TrainOutcome, TrainParams, TrainerSettings};

/// Scheduler timing and threshold configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Wall-clock interval between checks.
    pub interval: Duration,
    /// New labeled rows since the last run required to retrain.
    pub labeled_threshold: i64,
    /// Run the first check immediately instead of after one interval.
    pub run_initial: bool,
}

/// Outcome of a single scheduler tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// A training operation already holds the lock; tick skipped.
    AlreadyTraining,
    /// Not enough new labeled rows since the last run.
    BelowThreshold { new_labeled: i64 },
    /// The threshold was met and a training operation ran.
    Completed(TrainOutcome),
}

/// The auto-retrain scheduler.
///
/// Owned by the process root; started with [`AutoTrainer::start`] and
/// stopped through the returned handle.
pub struct AutoTrainer {
    pool: SqlitePool,
    scheduler: SchedulerConfig,
    settings: TrainerSettings,
    params: TrainParams,
    train_lock: Arc<Mutex<()>>,
}

/// Handle to a running scheduler task.
pub struct AutoTrainerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl AutoTrainerHandle {
    /// Signals the scheduler to stop and waits for the task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl AutoTrainer {
    #[must_use]
    pub fn new(
        pool: SqlitePool,
        scheduler: SchedulerConfig,
        settings: TrainerSettings,
        params: TrainParams,
        train_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            pool,
            scheduler,
            settings,
            params,
            train_lock,
        }
    }

    /// Spawns the periodic check loop and returns its handle.
    pub fn start(self) -> AutoTrainerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                interval_secs = self.scheduler.interval.as_secs(),
                threshold = self.scheduler.labeled_threshold,
                "AutoTrainer started"
            );

            let mut ticker = tokio::time::interval(self.scheduler.interval);
            if !self.scheduler.run_initial {
                // The first interval tick fires immediately; consume it
                // unless an initial check was requested.
                ticker.tick().await;
            }

            loop {
                tokio::select! {
                    _ = ticker.tick() => match self.check_and_train().await {
                        Ok(outcome) => debug!(?outcome, "Scheduler tick finished"),
                        Err(e) => error!(error = %e, "Scheduled training failed"),
                    },
                    _ = shutdown_rx.changed() => break,
                }
            }

            info!("AutoTrainer stopped");
        });

        AutoTrainerHandle { shutdown, task }
    }

    /// Runs one threshold check, training if it is met.
    ///
    /// The lock is taken before the count so that two overlapping
    /// invocations can never both train: the loser either sees the lock
    /// held and skips, or re-counts after the winner finished and finds
    /// the threshold no longer met.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation or the training operation
    /// fails; the caller logs it and keeps the loop alive.
    pub async fn check_and_train(&self) -> Result<TickOutcome> {
        let Ok(_guard) = self.train_lock.try_lock() else {
            debug!("Training already in progress, skipping tick");
            return Ok(TickOutcome::AlreadyTraining);
        };

        let since = TrainingRunRepository::latest_reference_time(&self.pool).await?;
        let new_labeled = StudentRepository::count_labeled_since(&self.pool, since).await?;
        debug!(new_labeled, ?since, "Checked for new labeled rows");

        if new_labeled < self.scheduler.labeled_threshold {
            return Ok(TickOutcome::BelowThreshold { new_labeled });
        }

        info!(
            new_labeled,
            threshold = self.scheduler.labeled_threshold,
            "Labeled-row threshold met, training"
        );
        let outcome = train_and_save_model(&self.pool, &self.settings, &self.params).await?;
        Ok(TickOutcome::Completed(outcome))
    }
}

#[cfg(test)]
mod tests {
    use database::create_test_pool;
    use feature_aligner::StudentRecord;

    use super::*;
    use crate::ingest::ingest_batch;

    fn labeled(external_id: i64, label: i64) -> StudentRecord {
        StudentRecord {
            student_id: Some(external_id),
            age: Some(18 + (external_id % 5)),
            attendance_percentage: Some(if label == 0 { 92.0 } else { 51.0 }),
            gpa: Some(if label == 0 { 8.0 } else { 3.2 }),
            drop_out: Some(label),
            ..StudentRecord::default()
        }
    }

    fn trainer(pool: &SqlitePool, dir: &tempfile::TempDir, threshold: i64) -> AutoTrainer {
        AutoTrainer::new(
            pool.clone(),
            SchedulerConfig {
                interval: Duration::from_secs(3600),
                labeled_threshold: threshold,
                run_initial: false,
            },
            TrainerSettings {
                model_path: dir.path().join("dropout_model.json"),
                min_training_rows: 50,
            },
            TrainParams::default(),
            Arc::new(Mutex::new(())),
        )
    }

    #[tokio::test]
    async fn below_threshold_does_not_train() {
        let pool = create_test_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(&pool, &dir, 50);

        let batch: Vec<_> = (0..49).map(|i| labeled(i, i % 2)).collect();
        ingest_batch(&pool, &batch).await.unwrap();

        let outcome = trainer.check_and_train().await.unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::BelowThreshold { new_labeled: 49 }
        ));
        assert_eq!(TrainingRunRepository::count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn meeting_the_threshold_trains_once() {
        let pool = create_test_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(&pool, &dir, 50);

        let batch: Vec<_> = (0..50).map(|i| labeled(i, i % 2)).collect();
        ingest_batch(&pool, &batch).await.unwrap();

        let outcome = trainer.check_and_train().await.unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::Completed(TrainOutcome::Trained { .. })
        ));
        assert_eq!(TrainingRunRepository::count(&pool).await.unwrap(), 1);

        // The run just finished; no new labeled rows since, so the next
        // tick stays idle.
        let outcome = trainer.check_and_train().await.unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::BelowThreshold { new_labeled: 0 }
        ));
        assert_eq!(TrainingRunRepository::count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_ticks_train_exactly_once() {
        let pool = create_test_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(&pool, &dir, 50);

        let batch: Vec<_> = (0..50).map(|i| labeled(i, i % 2)).collect();
        ingest_batch(&pool, &batch).await.unwrap();

        let (first, second) = tokio::join!(trainer.check_and_train(), trainer.check_and_train());
        first.unwrap();
        second.unwrap();

        // One invocation trained; the other was either locked out or
        // re-counted after the winner finished. Never two ledger entries.
        assert_eq!(TrainingRunRepository::count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn held_lock_skips_the_tick() {
        let pool = create_test_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(&pool, &dir, 1);

        let guard = trainer.train_lock.clone().lock_owned().await;
        let outcome = trainer.check_and_train().await.unwrap();
        drop(guard);

        assert!(matches!(outcome, TickOutcome::AlreadyTraining));
    }

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let pool = create_test_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(&pool, &dir, 50);

        let handle = trainer.start();
        handle.stop().await;
    }
}
