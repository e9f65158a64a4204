//! Database model types.

use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

/// A student observation stored in the database.
///
/// All attributes except the internal id and `created_at` are optional:
/// records arrive incrementally and may be partially filled.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Student {
    pub id: Uuid,
    /// External identifier; upsert key when present.
    pub student_id: Option<i64>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub attendance_percentage: Option<f64>,
    pub gpa: Option<f64>,
    pub parent_education: Option<String>,
    pub socioeconomic_status: Option<String>,
    pub extracurricular_participation: Option<i64>,
    pub previous_failures: Option<i64>,
    /// Outcome label: 0, 1, or absent (unlabeled).
    pub drop_out: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting or updating a student record.
#[derive(Debug, Clone, Default)]
pub struct StudentUpsert {
    pub student_id: Option<i64>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub attendance_percentage: Option<f64>,
    pub gpa: Option<f64>,
    pub parent_education: Option<String>,
    pub socioeconomic_status: Option<String>,
    pub extracurricular_participation: Option<i64>,
    pub previous_failures: Option<i64>,
    pub drop_out: Option<i64>,
}

/// Merges an upsert payload into an existing record.
///
/// Every field is nullable-overwrite: a provided value replaces the stored
/// one, an absent value preserves it. The internal id, external id, and
/// creation time never change.
#[must_use]
pub fn merge_student(existing: &Student, input: &StudentUpsert) -> Student {
    Student {
        id: existing.id,
        student_id: existing.student_id,
        age: input.age.or(existing.age),
        gender: input.gender.clone().or_else(|| existing.gender.clone()),
        attendance_percentage: input
            .attendance_percentage
            .or(existing.attendance_percentage),
        gpa: input.gpa.or(existing.gpa),
        parent_education: input
            .parent_education
            .clone()
            .or_else(|| existing.parent_education.clone()),
        socioeconomic_status: input
            .socioeconomic_status
            .clone()
            .or_else(|| existing.socioeconomic_status.clone()),
        extracurricular_participation: input
            .extracurricular_participation
            .or(existing.extracurricular_participation),
        previous_failures: input.previous_failures.or(existing.previous_failures),
        drop_out: input.drop_out.or(existing.drop_out),
        created_at: existing.created_at,
    }
}

/// Model artifact metadata stored in the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ModelArtifactRecord {
    pub id: Uuid,
    pub name: String,
    /// Path of the artifact file on disk.
    pub path: String,
    /// Ordered feature-column list the fitted model expects.
    pub feature_columns: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new model artifact record.
#[derive(Debug, Clone)]
pub struct CreateModelArtifact {
    pub name: String,
    pub path: String,
    pub feature_columns: Vec<String>,
}

/// One entry of the training run ledger.
///
/// A row is inserted when a training operation starts and finished exactly
/// once; finished rows are never modified again.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrainingRun {
    pub id: Uuid,
    pub model_id: Option<Uuid>,
    pub params: Option<Json<serde_json::Value>>,
    pub metrics: Option<Json<serde_json::Value>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A stored prediction result.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Prediction {
    pub id: Uuid,
    /// Resolved internal student reference, if the raw id matched a record.
    pub student_ref: Option<Uuid>,
    pub raw_student_id: Option<i64>,
    pub predicted_label: i64,
    pub probability: Option<f64>,
    pub model_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new prediction record.
#[derive(Debug, Clone)]
pub struct CreatePrediction {
    pub student_ref: Option<Uuid>,
    pub raw_student_id: Option<i64>,
    pub predicted_label: i64,
    pub probability: Option<f64>,
    pub model_id: Option<Uuid>,
}
