//! The training operation: fetch labeled records, fit the classifier,
//! persist the model artifact, and append a training run ledger entry.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use database::{
    CreateModelArtifact, ModelArtifactRepository, StudentRepository, TrainingRunRepository,
};
use feature_aligner::encode_training;
use ml_model::{LogisticModel, ModelArtifact, TrainingConfig};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::ingest::to_record;

/// Fixed seed for the train/holdout shuffle so runs over the same data
/// partition identically.
const SPLIT_SEED: u64 = 42;

/// Parameters of a training run, recorded in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainParams {
    /// Name recorded on the produced model artifact.
    pub model_name: String,
    /// Fraction of rows held out for evaluation.
    pub holdout_ratio: f64,
    /// Gradient descent iteration cap.
    pub max_iter: usize,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            model_name: "dropout-model".to_string(),
            holdout_ratio: 0.2,
            max_iter: 1000,
        }
    }
}

/// Where the trainer writes the artifact and how many labeled rows it
/// requires before it will fit anything.
#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub model_path: PathBuf,
    pub min_training_rows: i64,
}

/// Terminal result of a training operation.
#[derive(Debug)]
pub enum TrainOutcome {
    /// Fewer labeled rows than the policy floor; nothing was written.
    NotEnoughData { rows: usize },
    /// A model was fitted and persisted.
    Trained {
        model_id: Uuid,
        run_id: Uuid,
        model_path: PathBuf,
        train_rows: usize,
        holdout_rows: usize,
        holdout_accuracy: Option<f64>,
    },
}

impl TrainOutcome {
    /// Short status string for logs and CLI output.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::NotEnoughData { .. } => "not_enough_data",
            Self::Trained { .. } => "trained",
        }
    }
}

/// Runs a full training operation.
///
/// Returns [`TrainOutcome::NotEnoughData`] without touching the ledger
/// when the labeled row count is below the floor. Otherwise appends a
/// ledger entry, fits the classifier on a deterministic train/holdout
/// split, persists the artifact file together with its feature-column
/// list, records the model artifact, and finishes the ledger entry.
///
/// # Errors
///
/// Returns an error if a database, fit, or artifact operation fails.
pub async fn train_and_save_model(
    pool: &SqlitePool,
    settings: &TrainerSettings,
    params: &TrainParams,
) -> Result<TrainOutcome> {
    let students = StudentRepository::list_labeled(pool).await?;
    if (students.len() as i64) < settings.min_training_rows {
        info!(
            rows = students.len(),
            floor = settings.min_training_rows,
            "Not enough labeled rows to train"
        );
        return Ok(TrainOutcome::NotEnoughData {
            rows: students.len(),
        });
    }

    let records: Vec<_> = students.iter().map(to_record).collect();
    let (matrix, labels) = encode_training(&records);

    let run = TrainingRunRepository::start(pool, serde_json::to_value(params)?).await?;
    info!(run_id = %run.id, rows = matrix.n_rows(), "Training started");

    let (train_idx, holdout_idx) = split_indices(matrix.n_rows(), params.holdout_ratio);
    let train_x = matrix.values.select(Axis(0), &train_idx);
    let train_y: Vec<f64> = train_idx.iter().map(|&i| labels[i]).collect();

    let config = TrainingConfig {
        max_iter: params.max_iter,
        ..TrainingConfig::default()
    };
    let model = ml_model::fit(&train_x, &train_y, &config)?;

    let holdout_accuracy = if holdout_idx.is_empty() {
        None
    } else {
        let holdout_x = matrix.values.select(Axis(0), &holdout_idx);
        let holdout_y: Vec<f64> = holdout_idx.iter().map(|&i| labels[i]).collect();
        Some(accuracy(&model, &holdout_x, &holdout_y)?)
    };

    let artifact = ModelArtifact {
        model_name: params.model_name.clone(),
        feature_columns: matrix.columns.clone(),
        model,
        trained_at: Utc::now(),
    };
    artifact.save(&settings.model_path)?;

    let record = ModelArtifactRepository::create(
        pool,
        CreateModelArtifact {
            name: params.model_name.clone(),
            path: settings.model_path.display().to_string(),
            feature_columns: matrix.columns,
        },
    )
    .await?;

    let metrics = serde_json::json!({
        "train_n": train_idx.len(),
        "holdout_n": holdout_idx.len(),
        "holdout_accuracy": holdout_accuracy,
    });
    TrainingRunRepository::finish(pool, run.id, record.id, metrics).await?;

    info!(
        run_id = %run.id,
        model_id = %record.id,
        train_rows = train_idx.len(),
        holdout_rows = holdout_idx.len(),
        ?holdout_accuracy,
        path = %settings.model_path.display(),
        "Training complete"
    );

    Ok(TrainOutcome::Trained {
        model_id: record.id,
        run_id: run.id,
        model_path: settings.model_path.clone(),
        train_rows: train_idx.len(),
        holdout_rows: holdout_idx.len(),
        holdout_accuracy,
    })
}

/// Splits `0..n` into train and holdout index sets with a seeded shuffle.
///
/// The holdout takes `floor(n * ratio)` rows, capped so the training
/// partition is never empty.
fn split_indices(n: usize, holdout_ratio: f64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    indices.shuffle(&mut rng);

    let holdout_len = ((n as f64) * holdout_ratio.clamp(0.0, 1.0)) as usize;
    let holdout_len = holdout_len.min(n.saturating_sub(1));

    let holdout = indices.split_off(n - holdout_len);
    (indices, holdout)
}

fn accuracy(model: &LogisticModel, x: &Array2<f64>, y: &[f64]) -> Result<f64> {
    let predicted = model.predict(x)?;
    let correct = predicted
        .iter()
        .zip(y)
        .filter(|(&label, &truth)| label as f64 == truth)
        .count();
    Ok(correct as f64 / y.len() as f64)
}
