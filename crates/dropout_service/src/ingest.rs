//! Record ingestion: batch upserts and CSV bulk import.

use std::path::Path;

use anyhow::{Context, Result};
use database::{Student, StudentRepository, StudentUpsert};
use feature_aligner::StudentRecord;
use sqlx::SqlitePool;
use tracing::info;

/// Converts a raw record into an upsert payload.
#[must_use]
pub fn to_upsert(record: &StudentRecord) -> StudentUpsert {
    StudentUpsert {
        student_id: record.student_id,
        age: record.age,
        gender: record.gender.clone(),
        attendance_percentage: record.attendance_percentage,
        gpa: record.gpa,
        parent_education: record.parent_education.clone(),
        socioeconomic_status: record.socioeconomic_status.clone(),
        extracurricular_participation: record.extracurricular_participation,
        previous_failures: record.previous_failures,
        drop_out: record.drop_out,
    }
}

/// Converts a stored student back into the raw record schema used by the
/// feature aligner.
#[must_use]
pub fn to_record(student: &Student) -> StudentRecord {
    StudentRecord {
        student_id: student.student_id,
        age: student.age,
        gender: student.gender.clone(),
        attendance_percentage: student.attendance_percentage,
        gpa: student.gpa,
        parent_education: student.parent_education.clone(),
        socioeconomic_status: student.socioeconomic_status.clone(),
        extracurricular_participation: student.extracurricular_participation,
        previous_failures: student.previous_failures,
        drop_out: student.drop_out,
    }
}

/// Upserts a batch of records. Returns the number of records processed.
///
/// # Errors
///
/// Returns an error if a database operation fails.
pub async fn ingest_batch(
    pool: &SqlitePool,
    records: &[StudentRecord],
) -> Result<usize, sqlx::Error> {
    for record in records {
        StudentRepository::upsert(pool, to_upsert(record)).await?;
    }
    Ok(records.len())
}

/// Bulk-loads a CSV file of student records, upserting each row with the
/// same merge semantics as ingestion.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a row fails to parse
/// or persist.
pub async fn bulk_load_csv(pool: &SqlitePool, path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open CSV file {}", path.display()))?;

    let mut processed = 0;
    for row in reader.deserialize::<StudentRecord>() {
        let record = row.with_context(|| format!("invalid CSV row in {}", path.display()))?;
        StudentRepository::upsert(pool, to_upsert(&record)).await?;
        processed += 1;
    }

    info!(processed, path = %path.display(), "Bulk load complete");
    Ok(processed)
}
