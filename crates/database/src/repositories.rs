//! Repository functions for database operations.
//!
//! Every function takes the pool explicitly; callers own the storage
//! handle and its lifetime.

use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{
    merge_student, CreateModelArtifact, CreatePrediction, ModelArtifactRecord, Prediction,
    Student, StudentUpsert, TrainingRun,
};

const STUDENT_COLUMNS: &str = "id, student_id, age, gender, attendance_percentage, gpa, \
     parent_education, socioeconomic_status, extracurricular_participation, \
     previous_failures, drop_out, created_at";

/// Repository for student record operations.
pub struct StudentRepository;

impl StudentRepository {
    /// Inserts a new student or merges into the existing record with the
    /// same external id.
    ///
    /// Records without an external id are always inserted. Returns the
    /// stored record and whether a new row was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn upsert(
        pool: &SqlitePool,
        input: StudentUpsert,
    ) -> Result<(Student, bool), sqlx::Error> {
        if let Some(external_id) = input.student_id {
            if let Some(existing) = Self::find_by_external_id(pool, external_id).await? {
                let merged = merge_student(&existing, &input);
                Self::update(pool, &merged).await?;
                return Ok((merged, false));
            }
        }

        let student = Self::insert(pool, input).await?;
        Ok((student, true))
    }

    /// Finds a student by its external identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find_by_external_id(
        pool: &SqlitePool,
        external_id: i64,
    ) -> Result<Option<Student>, sqlx::Error> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?"
        ))
        .bind(external_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists all labeled students (records whose outcome field is present).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_labeled(pool: &SqlitePool) -> Result<Vec<Student>, sqlx::Error> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE drop_out IS NOT NULL \
             ORDER BY datetime(created_at), id"
        ))
        .fetch_all(pool)
        .await
    }

    /// Counts labeled students created after `since` (all labeled students
    /// when `since` is absent).
    ///
    /// Stored and bound timestamps share one text encoding, so the raw
    /// comparison keeps sub-second precision; `datetime()` would truncate
    /// both sides to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count_labeled_since(
        pool: &SqlitePool,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, sqlx::Error> {
        match since {
            Some(since) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM students \
                     WHERE drop_out IS NOT NULL AND created_at > ?",
                )
                .bind(since)
                .fetch_one(pool)
                .await
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM students WHERE drop_out IS NOT NULL",
                )
                .fetch_one(pool)
                .await
            }
        }
    }

    /// Counts all student records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students")
            .fetch_one(pool)
            .await
    }

    async fn insert(pool: &SqlitePool, input: StudentUpsert) -> Result<Student, sqlx::Error> {
        let student = Student {
            id: Uuid::new_v4(),
            student_id: input.student_id,
            age: input.age,
            gender: input.gender,
            attendance_percentage: input.attendance_percentage,
            gpa: input.gpa,
            parent_education: input.parent_education,
            socioeconomic_status: input.socioeconomic_status,
            extracurricular_participation: input.extracurricular_participation,
            previous_failures: input.previous_failures,
            drop_out: input.drop_out,
            created_at: Utc::now(),
        };

        sqlx::query(&format!(
            "INSERT INTO students ({STUDENT_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(student.id)
        .bind(student.student_id)
        .bind(student.age)
        .bind(student.gender.clone())
        .bind(student.attendance_percentage)
        .bind(student.gpa)
        .bind(student.parent_education.clone())
        .bind(student.socioeconomic_status.clone())
        .bind(student.extracurricular_participation)
        .bind(student.previous_failures)
        .bind(student.drop_out)
        .bind(student.created_at)
        .execute(pool)
        .await?;

        Ok(student)
    }

    async fn update(pool: &SqlitePool, student: &Student) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE students SET age = ?, gender = ?, attendance_percentage = ?, gpa = ?, \
             parent_education = ?, socioeconomic_status = ?, \
             extracurricular_participation = ?, previous_failures = ?, drop_out = ? \
             WHERE id = ?",
        )
        .bind(student.age)
        .bind(student.gender.clone())
        .bind(student.attendance_percentage)
        .bind(student.gpa)
        .bind(student.parent_education.clone())
        .bind(student.socioeconomic_status.clone())
        .bind(student.extracurricular_participation)
        .bind(student.previous_failures)
        .bind(student.drop_out)
        .bind(student.id)
        .execute(pool)
        .await?;

        Ok(())
    }
}

/// Repository for model artifact records.
pub struct ModelArtifactRepository;

impl ModelArtifactRepository {
    /// Creates a new model artifact record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create(
        pool: &SqlitePool,
        input: CreateModelArtifact,
    ) -> Result<ModelArtifactRecord, sqlx::Error> {
        let record = ModelArtifactRecord {
            id: Uuid::new_v4(),
            name: input.name,
            path: input.path,
            feature_columns: Json(input.feature_columns),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO model_artifacts (id, name, path, feature_columns, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(record.name.clone())
        .bind(record.path.clone())
        .bind(record.feature_columns.clone())
        .bind(record.created_at)
        .execute(pool)
        .await?;

        Ok(record)
    }

    /// Gets the most recently created model artifact record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find_latest(
        pool: &SqlitePool,
    ) -> Result<Option<ModelArtifactRecord>, sqlx::Error> {
        sqlx::query_as::<_, ModelArtifactRecord>(
            "SELECT id, name, path, feature_columns, created_at FROM model_artifacts \
             ORDER BY datetime(created_at) DESC, id DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await
    }

    /// Counts model artifact records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM model_artifacts")
            .fetch_one(pool)
            .await
    }
}

/// Repository for the training run ledger.
pub struct TrainingRunRepository;

impl TrainingRunRepository {
    /// Appends a new ledger entry for a training run that is starting.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn start(
        pool: &SqlitePool,
        params: serde_json::Value,
    ) -> Result<TrainingRun, sqlx::Error> {
        let run = TrainingRun {
            id: Uuid::new_v4(),
            model_id: None,
            params: Some(Json(params)),
            metrics: None,
            started_at: Utc::now(),
            finished_at: None,
        };

        sqlx::query(
            "INSERT INTO training_runs (id, model_id, params, metrics, started_at, finished_at) \
             VALUES (?, NULL, ?, NULL, ?, NULL)",
        )
        .bind(run.id)
        .bind(run.params.clone())
        .bind(run.started_at)
        .execute(pool)
        .await?;

        Ok(run)
    }

    /// Finishes a ledger entry, recording the produced model and metrics.
    ///
    /// Entries are finished at most once; finishing an already-finished
    /// run is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn finish(
        pool: &SqlitePool,
        id: Uuid,
        model_id: Uuid,
        metrics: serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE training_runs SET model_id = ?, metrics = ?, finished_at = ? \
             WHERE id = ? AND finished_at IS NULL",
        )
        .bind(model_id)
        .bind(Json(metrics))
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Returns the reference time for the retrain trigger: the most recent
    /// finish time, or the most recent start time if no run ever finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn latest_reference_time(
        pool: &SqlitePool,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        let finished = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT finished_at FROM training_runs WHERE finished_at IS NOT NULL \
             ORDER BY datetime(finished_at) DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;

        if finished.is_some() {
            return Ok(finished);
        }

        sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT started_at FROM training_runs ORDER BY datetime(started_at) DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await
    }

    /// Counts ledger entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM training_runs")
            .fetch_one(pool)
            .await
    }

    /// Finds a ledger entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find_by_id(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<TrainingRun>, sqlx::Error> {
        sqlx::query_as::<_, TrainingRun>(
            "SELECT id, model_id, params, metrics, started_at, finished_at \
             FROM training_runs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

/// Repository for stored predictions.
pub struct PredictionRepository;

impl PredictionRepository {
    /// Creates a new prediction record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create(
        pool: &SqlitePool,
        input: CreatePrediction,
    ) -> Result<Prediction, sqlx::Error> {
        let prediction = Prediction {
            id: Uuid::new_v4(),
            student_ref: input.student_ref,
            raw_student_id: input.raw_student_id,
            predicted_label: input.predicted_label,
            probability: input.probability,
            model_id: input.model_id,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO predictions (id, student_ref, raw_student_id, predicted_label, \
             probability, model_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(prediction.id)
        .bind(prediction.student_ref)
        .bind(prediction.raw_student_id)
        .bind(prediction.predicted_label)
        .bind(prediction.probability)
        .bind(prediction.model_id)
        .bind(prediction.created_at)
        .execute(pool)
        .await?;

        Ok(prediction)
    }

    /// Counts stored predictions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM predictions")
            .fetch_one(pool)
            .await
    }
}
