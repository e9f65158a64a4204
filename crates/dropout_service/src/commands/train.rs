//! Train command - runs one training operation synchronously.

use std::path::PathBuf;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::trainer::{train_and_save_model, TrainOutcome, TrainParams, TrainerSettings};

/// Runs the train command.
///
/// # Errors
///
/// Returns an error if the training operation fails.
pub async fn run(
    pool: &SqlitePool,
    model_path: PathBuf,
    name: &str,
    holdout_ratio: f64,
    max_iter: usize,
    min_rows: i64,
) -> Result<()> {
    let settings = TrainerSettings {
        model_path,
        min_training_rows: min_rows,
    };
    let params = TrainParams {
        model_name: name.to_string(),
        holdout_ratio,
        max_iter,
    };

    match train_and_save_model(pool, &settings, &params).await? {
        TrainOutcome::NotEnoughData { rows } => {
            warn!(rows, floor = min_rows, "Not enough labeled rows; no model written");
        }
        TrainOutcome::Trained {
            model_id,
            train_rows,
            holdout_rows,
            holdout_accuracy,
            model_path,
            ..
        } => {
            info!(
                %model_id,
                train_rows,
                holdout_rows,
                ?holdout_accuracy,
                path = %model_path.display(),
                "Model trained"
            );
        }
    }

    Ok(())
}
