//! HTTP API for ingestion, training, and prediction.

mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use config::Config;
use feature_aligner::StudentRecord;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::predictor::PredictionRow;

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    /// Lock shared with the scheduler; manual and scheduled training runs
    /// are mutually exclusive.
    pub train_lock: Arc<Mutex<()>>,
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ingest/students", post(handlers::ingest_students))
        .route("/train", post(handlers::train))
        .route("/predict", post(handlers::predict))
        .with_state(state)
}

/// A batch of student records.
#[derive(Debug, Deserialize)]
pub struct StudentBatch {
    pub students: Vec<StudentRecord>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ingested: usize,
}

/// Optional training parameters; omitted fields use the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct TrainRequest {
    pub model_name: Option<String>,
    pub holdout_ratio: Option<f64>,
    pub max_iter: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predictions: Vec<PredictionRow>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
