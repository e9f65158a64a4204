//! Prediction service: align a record batch against the persisted model
//! artifact and run inference.

use std::path::Path;

use database::{CreatePrediction, ModelArtifactRepository, PredictionRepository, StudentRepository};
use feature_aligner::{encode_inference, StudentRecord};
use ml_model::{ArtifactError, ModelArtifact};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

/// Errors from the prediction service.
#[derive(Debug, Error)]
pub enum PredictServiceError {
    /// No model has ever been trained.
    #[error("Model artifact not found. Train first.")]
    ModelNotTrained,

    #[error("failed to load model artifact: {0}")]
    Artifact(#[source] ArtifactError),

    #[error("database operation failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("inference failed: {0}")]
    Inference(#[from] ml_model::PredictError),
}

/// A single prediction result returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRow {
    /// The raw external identifier from the request, resolved or not.
    pub student_id: Option<i64>,
    pub predicted_label: i64,
    pub probability: Option<f64>,
}

/// Predicts dropout risk for a batch of records.
///
/// The artifact file is re-read on every call, so a model replaced by a
/// concurrent training run is picked up immediately and the model is
/// always paired with its own feature-column list. Each result is also
/// persisted; records whose external id matches a stored student carry a
/// resolved internal reference, unresolved ids are kept as-is.
///
/// # Errors
///
/// Returns [`PredictServiceError::ModelNotTrained`] if no artifact
/// exists, or an error if loading, inference, or persistence fails.
pub async fn predict_batch(
    pool: &SqlitePool,
    model_path: &Path,
    records: &[StudentRecord],
) -> Result<Vec<PredictionRow>, PredictServiceError> {
    let artifact = ModelArtifact::load(model_path).map_err(|e| match e {
        ArtifactError::NotFound { .. } => PredictServiceError::ModelNotTrained,
        other => PredictServiceError::Artifact(other),
    })?;

    let aligned = encode_inference(records).align(&artifact.feature_columns);
    debug!(
        rows = aligned.n_rows(),
        columns = aligned.columns.len(),
        "Aligned inference batch"
    );

    let labels = artifact.model.predict(&aligned.values)?;
    let probabilities = artifact.model.predict_proba(&aligned.values)?;

    let model_record = ModelArtifactRepository::find_latest(pool).await?;
    let model_id = model_record.map(|m| m.id);

    let mut results = Vec::with_capacity(records.len());
    for ((record, label), probability) in records.iter().zip(labels).zip(probabilities) {
        let resolved = match record.student_id {
            Some(external_id) => StudentRepository::find_by_external_id(pool, external_id)
                .await?
                .map(|s| s.id),
            None => None,
        };

        PredictionRepository::create(
            pool,
            CreatePrediction {
                student_ref: resolved,
                raw_student_id: record.student_id,
                predicted_label: label,
                probability: Some(probability),
                model_id,
            },
        )
        .await?;

        results.push(PredictionRow {
            student_id: record.student_id,
            predicted_label: label,
            probability: Some(probability),
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use database::create_test_pool;

    use super::*;
    use crate::ingest::ingest_batch;
    use crate::trainer::{train_and_save_model, TrainParams, TrainerSettings};

    fn labeled(external_id: i64, label: i64) -> StudentRecord {
        StudentRecord {
            student_id: Some(external_id),
            age: Some(18),
            attendance_percentage: Some(if label == 0 { 90.0 } else { 50.0 }),
            gpa: Some(if label == 0 { 8.0 } else { 3.0 }),
            drop_out: Some(label),
            ..StudentRecord::default()
        }
    }

    #[tokio::test]
    async fn missing_artifact_is_a_train_first_error() {
        let pool = create_test_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let result = predict_batch(
            &pool,
            &dir.path().join("missing.json"),
            &[StudentRecord::default()],
        )
        .await;

        assert!(matches!(result, Err(PredictServiceError::ModelNotTrained)));
        assert_eq!(PredictionRepository::count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn predictions_resolve_known_ids_and_keep_unknown_ones() {
        let pool = create_test_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("dropout_model.json");

        let batch: Vec<_> = (0..10).map(|i| labeled(i, i % 2)).collect();
        ingest_batch(&pool, &batch).await.unwrap();
        train_and_save_model(
            &pool,
            &TrainerSettings {
                model_path: model_path.clone(),
                min_training_rows: 10,
            },
            &TrainParams::default(),
        )
        .await
        .unwrap();

        let known = StudentRecord {
            drop_out: None,
            ..labeled(3, 1)
        };
        let unknown = StudentRecord {
            student_id: Some(999),
            ..known.clone()
        };
        let anonymous = StudentRecord {
            student_id: None,
            ..known.clone()
        };

        let rows = predict_batch(&pool, &model_path, &[known, unknown, anonymous])
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].student_id, Some(3));
        assert_eq!(rows[1].student_id, Some(999));
        assert_eq!(rows[2].student_id, None);
        for row in &rows {
            assert!(row.predicted_label == 0 || row.predicted_label == 1);
            let p = row.probability.unwrap();
            assert!((0.0..=1.0).contains(&p));
        }

        assert_eq!(PredictionRepository::count(&pool).await.unwrap(), 3);
    }
}
