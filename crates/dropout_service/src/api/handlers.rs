//! Request handlers.

use axum::extract::{Json, State};
use axum::http::StatusCode;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::api::{
    AppState, ErrorResponse, IngestResponse, PredictResponse, StudentBatch, TrainRequest,
    TrainResponse,
};
use crate::ingest::ingest_batch;
use crate::predictor::{predict_batch, PredictServiceError};
use crate::trainer::{train_and_save_model, TrainParams, TrainerSettings};

/// Health check handler.
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Upserts a batch of student records.
pub async fn ingest_students(
    State(state): State<AppState>,
    Json(payload): Json<StudentBatch>,
) -> Result<Json<IngestResponse>, (StatusCode, Json<ErrorResponse>)> {
    match ingest_batch(&state.pool, &payload.students).await {
        Ok(ingested) => Ok(Json(IngestResponse { ingested })),
        Err(e) => {
            error!(error = %e, "Ingestion failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            ))
        }
    }
}

/// Starts an asynchronous training run.
///
/// Responds `training_started` and runs the operation in a background
/// task holding the shared training lock. If the lock is already held, a
/// run is in progress and the request is rejected rather than queued.
pub async fn train(
    State(state): State<AppState>,
    payload: Option<Json<TrainRequest>>,
) -> (StatusCode, Json<TrainResponse>) {
    let request = payload.map_or_else(TrainRequest::default, |Json(r)| r);

    let defaults = TrainParams::default();
    let params = TrainParams {
        model_name: request.model_name.unwrap_or(defaults.model_name),
        holdout_ratio: request.holdout_ratio.unwrap_or(defaults.holdout_ratio),
        max_iter: request.max_iter.unwrap_or(defaults.max_iter),
    };

    let Ok(guard) = state.train_lock.clone().try_lock_owned() else {
        return (
            StatusCode::CONFLICT,
            Json(TrainResponse {
                status: "training_in_progress".to_string(),
            }),
        );
    };

    let pool = state.pool.clone();
    let settings = TrainerSettings {
        model_path: state.config.model_path.clone(),
        min_training_rows: state.config.min_training_rows,
    };

    tokio::spawn(async move {
        let _guard = guard;
        match train_and_save_model(&pool, &settings, &params).await {
            Ok(outcome) => info!(status = outcome.status(), "Training run finished"),
            Err(e) => error!(error = %e, "Training run failed"),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(TrainResponse {
            status: "training_started".to_string(),
        }),
    )
}

/// Predicts dropout risk for a batch of records.
pub async fn predict(
    State(state): State<AppState>,
    Json(payload): Json<StudentBatch>,
) -> Result<Json<PredictResponse>, (StatusCode, Json<ErrorResponse>)> {
    match predict_batch(&state.pool, &state.config.model_path, &payload.students).await {
        Ok(predictions) => Ok(Json(PredictResponse { predictions })),
        Err(e @ PredictServiceError::ModelNotTrained) => {
            Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string()))))
        }
        Err(e) => {
            error!(error = %e, "Prediction failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            ))
        }
    }
}
