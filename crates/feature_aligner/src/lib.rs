//! Feature aligner for the dropout-risk model.
//!
//! Turns raw student record batches into numeric matrices and maps an
//! inference batch onto the fixed column set a model was trained with.

use std::collections::{BTreeSet, HashMap};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Numeric attributes, in encoding order.
const NUMERIC_ATTRIBUTES: [&str; 6] = [
    "student_id",
    "age",
    "attendance_percentage",
    "gpa",
    "extracurricular_participation",
    "previous_failures",
];

/// Categorical attributes, in encoding order. Each expands into one
/// indicator column per observed level, named `{attribute}_{level}`.
const CATEGORICAL_ATTRIBUTES: [&str; 3] = ["gender", "parent_education", "socioeconomic_status"];

/// A raw student observation as it arrives from the API, CSV import, or
/// the database. Every attribute is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: Option<i64>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub attendance_percentage: Option<f64>,
    pub gpa: Option<f64>,
    pub parent_education: Option<String>,
    pub socioeconomic_status: Option<String>,
    pub extracurricular_participation: Option<i64>,
    pub previous_failures: Option<i64>,
    /// Outcome label: 0, 1, or absent.
    pub drop_out: Option<i64>,
}

impl StudentRecord {
    fn numeric_values(&self) -> [f64; 6] {
        [
            to_f64(self.student_id),
            to_f64(self.age),
            self.attendance_percentage.unwrap_or(0.0),
            self.gpa.unwrap_or(0.0),
            to_f64(self.extracurricular_participation),
            to_f64(self.previous_failures),
        ]
    }

    fn categorical_values(&self) -> [Option<&str>; 3] {
        [
            self.gender.as_deref(),
            self.parent_education.as_deref(),
            self.socioeconomic_status.as_deref(),
        ]
    }
}

/// Missing numeric attributes encode as the same neutral default used for
/// absent indicator columns.
fn to_f64(value: Option<i64>) -> f64 {
    value.map_or(0.0, |v| v as f64)
}

/// A numeric matrix with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    /// Column names, in matrix order.
    pub columns: Vec<String>,
    /// Row-per-record values, one column per name in `columns`.
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    /// Number of record rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Re-indexes the matrix against an expected column list.
    ///
    /// Expected columns absent from this matrix are added with value zero,
    /// columns not in the expected list are dropped, and the final order
    /// exactly matches `expected`. Aligning an already-aligned matrix is a
    /// no-op.
    #[must_use]
    pub fn align(&self, expected: &[String]) -> FeatureMatrix {
        let index: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut values = Array2::zeros((self.values.nrows(), expected.len()));
        for (target, name) in expected.iter().enumerate() {
            if let Some(&source) = index.get(name.as_str()) {
                values
                    .column_mut(target)
                    .assign(&self.values.column(source));
            }
        }

        FeatureMatrix {
            columns: expected.to_vec(),
            values,
        }
    }
}

/// Encodes a labeled batch for training.
///
/// Records without a label are skipped. Categorical attributes expand into
/// indicator columns over the levels observed in the batch, sorted, with
/// the first level of each attribute dropped to avoid redundancy. Returns
/// the matrix and the label vector, row-aligned.
#[must_use]
pub fn encode_training(records: &[StudentRecord]) -> (FeatureMatrix, Vec<f64>) {
    let labeled: Vec<&StudentRecord> = records
        .iter()
        .filter(|r| r.drop_out.is_some())
        .collect();

    let labels = labeled
        .iter()
        .map(|r| to_f64(r.drop_out))
        .collect();

    (encode(&labeled, true), labels)
}

/// Encodes a batch for inference.
///
/// All observed categorical levels get an indicator column; the caller is
/// expected to [`FeatureMatrix::align`] the result against the trained
/// column list, which discards any column the model does not know.
#[must_use]
pub fn encode_inference(records: &[StudentRecord]) -> FeatureMatrix {
    let refs: Vec<&StudentRecord> = records.iter().collect();
    encode(&refs, false)
}

fn encode(records: &[&StudentRecord], drop_first: bool) -> FeatureMatrix {
    // Observed levels per categorical attribute, sorted for determinism.
    let mut levels: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); CATEGORICAL_ATTRIBUTES.len()];
    for record in records {
        for (slot, value) in levels.iter_mut().zip(record.categorical_values()) {
            if let Some(value) = value {
                slot.insert(value);
            }
        }
    }

    let mut columns: Vec<String> = NUMERIC_ATTRIBUTES.iter().map(|&c| c.to_string()).collect();
    for (attribute, observed) in CATEGORICAL_ATTRIBUTES.iter().zip(&levels) {
        let kept = observed.iter().skip(usize::from(drop_first));
        columns.extend(kept.map(|level| format!("{attribute}_{level}")));
    }

    let index: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut values = Array2::zeros((records.len(), columns.len()));
    for (row, record) in records.iter().enumerate() {
        for (col, value) in record.numeric_values().iter().enumerate() {
            values[[row, col]] = *value;
        }
        for (attribute, value) in CATEGORICAL_ATTRIBUTES.iter().zip(record.categorical_values()) {
            if let Some(value) = value {
                // The dropped first level has no column; its absence encodes it.
                if let Some(&col) = index.get(format!("{attribute}_{value}").as_str()) {
                    values[[row, col]] = 1.0;
                }
            }
        }
    }

    FeatureMatrix { columns, values }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gender: &str, gpa: f64, label: i64) -> StudentRecord {
        StudentRecord {
            student_id: Some(1),
            age: Some(18),
            gender: Some(gender.to_string()),
            attendance_percentage: Some(80.0),
            gpa: Some(gpa),
            drop_out: Some(label),
            ..StudentRecord::default()
        }
    }

    #[test]
    fn training_encoding_drops_first_level_per_attribute() {
        let records = vec![record("Female", 7.0, 0), record("Male", 4.0, 1)];
        let (matrix, labels) = encode_training(&records);

        // "Female" sorts first and is dropped; only "gender_Male" survives.
        assert!(matrix.columns.contains(&"gender_Male".to_string()));
        assert!(!matrix.columns.contains(&"gender_Female".to_string()));
        assert_eq!(labels, vec![0.0, 1.0]);

        let male_col = matrix
            .columns
            .iter()
            .position(|c| c == "gender_Male")
            .unwrap();
        assert_eq!(matrix.values[[0, male_col]], 0.0);
        assert_eq!(matrix.values[[1, male_col]], 1.0);
    }

    #[test]
    fn training_encoding_skips_unlabeled_records() {
        let mut unlabeled = record("Male", 6.0, 0);
        unlabeled.drop_out = None;
        let records = vec![record("Male", 7.0, 1), unlabeled];

        let (matrix, labels) = encode_training(&records);
        assert_eq!(matrix.n_rows(), 1);
        assert_eq!(labels, vec![1.0]);
    }

    #[test]
    fn inference_encoding_keeps_all_observed_levels() {
        let records = vec![record("Female", 7.0, 0), record("Male", 4.0, 1)];
        let matrix = encode_inference(&records);

        assert!(matrix.columns.contains(&"gender_Female".to_string()));
        assert!(matrix.columns.contains(&"gender_Male".to_string()));
    }

    #[test]
    fn missing_attributes_encode_as_zero() {
        let matrix = encode_inference(&[StudentRecord::default()]);

        assert_eq!(matrix.columns, NUMERIC_ATTRIBUTES.to_vec());
        assert!(matrix.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn align_zero_fills_missing_columns() {
        let matrix = FeatureMatrix {
            columns: vec!["a".to_string(), "c".to_string()],
            values: Array2::from_shape_vec((2, 2), vec![1.0, 3.0, 4.0, 6.0]).unwrap(),
        };
        let expected = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let aligned = matrix.align(&expected);
        assert_eq!(aligned.columns, expected);
        assert_eq!(aligned.values[[0, 0]], 1.0);
        assert_eq!(aligned.values[[0, 1]], 0.0);
        assert_eq!(aligned.values[[0, 2]], 3.0);
        assert_eq!(aligned.values[[1, 1]], 0.0);
    }

    #[test]
    fn align_drops_extra_columns_and_reorders() {
        let matrix = FeatureMatrix {
            columns: vec!["extra".to_string(), "b".to_string(), "a".to_string()],
            values: Array2::from_shape_vec((1, 3), vec![9.0, 2.0, 1.0]).unwrap(),
        };
        let expected = vec!["a".to_string(), "b".to_string()];

        let aligned = matrix.align(&expected);
        assert_eq!(aligned.columns, expected);
        assert_eq!(aligned.values[[0, 0]], 1.0);
        assert_eq!(aligned.values[[0, 1]], 2.0);
    }

    #[test]
    fn align_is_idempotent() {
        let records = vec![record("Female", 7.0, 0), record("Male", 4.0, 1)];
        let (matrix, _) = encode_training(&records);
        let expected = matrix.columns.clone();

        let once = matrix.align(&expected);
        let twice = once.align(&expected);
        assert_eq!(once, twice);
        assert_eq!(once, matrix);
    }

    #[test]
    fn inference_batch_aligns_to_training_columns() {
        let training = vec![record("Female", 7.0, 0), record("Male", 4.0, 1)];
        let (train_matrix, _) = encode_training(&training);

        // Inference batch only observes one level of the attribute.
        let batch = vec![record("Female", 5.0, 0)];
        let aligned = encode_inference(&batch).align(&train_matrix.columns);

        assert_eq!(aligned.columns, train_matrix.columns);
        let male_col = aligned
            .columns
            .iter()
            .position(|c| c == "gender_Male")
            .unwrap();
        assert_eq!(aligned.values[[0, male_col]], 0.0);
    }
}
