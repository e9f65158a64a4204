//! Full ingest -> train -> predict flow against an in-memory database.

use database::{create_test_pool, ModelArtifactRepository, TrainingRunRepository};
use dropout_service::ingest::ingest_batch;
use dropout_service::predictor::predict_batch;
use dropout_service::trainer::{train_and_save_model, TrainOutcome, TrainParams, TrainerSettings};
use feature_aligner::StudentRecord;
use ml_model::ModelArtifact;

fn labeled(external_id: i64, label: i64) -> StudentRecord {
    StudentRecord {
        student_id: Some(external_id),
        age: Some(18),
        gender: Some(if label == 0 { "Male" } else { "Female" }.to_string()),
        attendance_percentage: Some(if label == 0 { 92.0 } else { 48.0 }),
        gpa: Some(if label == 0 { 8.4 } else { 3.1 }),
        drop_out: Some(label),
        ..StudentRecord::default()
    }
}

#[tokio::test]
async fn ingest_train_predict_flow() {
    let pool = create_test_pool().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("dropout_model.json");

    // Two labeled records are enough when the floor is lowered to two.
    ingest_batch(&pool, &[labeled(1, 0), labeled(2, 1)])
        .await
        .unwrap();

    let outcome = train_and_save_model(
        &pool,
        &TrainerSettings {
            model_path: model_path.clone(),
            min_training_rows: 2,
        },
        &TrainParams::default(),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, TrainOutcome::Trained { .. }));

    // The artifact pairs the fitted model with its feature-column list,
    // and the run is recorded in the ledger.
    let artifact = ModelArtifact::load(&model_path).unwrap();
    assert_eq!(artifact.model_name, "dropout-model");
    assert_eq!(artifact.model.n_features(), artifact.feature_columns.len());
    assert_eq!(ModelArtifactRepository::count(&pool).await.unwrap(), 1);
    assert_eq!(TrainingRunRepository::count(&pool).await.unwrap(), 1);

    // An unlabeled record with a category never seen at training time
    // still predicts: unknown columns are dropped, missing ones zero-filled.
    let unlabeled = StudentRecord {
        student_id: Some(3),
        age: Some(19),
        gender: Some("Other".to_string()),
        attendance_percentage: Some(70.0),
        gpa: Some(5.5),
        ..StudentRecord::default()
    };

    let rows = predict_batch(&pool, &model_path, &[unlabeled]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].student_id, Some(3));
    assert!(rows[0].predicted_label == 0 || rows[0].predicted_label == 1);
    let p = rows[0].probability.unwrap();
    assert!((0.0..=1.0).contains(&p));
}
