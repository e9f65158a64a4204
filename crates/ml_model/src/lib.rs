//! Dropout classifier crate.
//!
//! A logistic-regression binary classifier over dense feature matrices,
//! trained with batch gradient descent. Features are standardized
//! internally; the fitted standardization is part of the model and travels
//! with it through the artifact file.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod artifact;

pub use artifact::{ArtifactError, ModelArtifact};

/// Configuration for fitting the classifier.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Gradient descent step size (on standardized features).
    pub learning_rate: f64,
    /// Number of gradient descent iterations.
    pub max_iter: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_iter: 1000,
        }
    }
}

/// Errors from fitting the classifier.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("label count {labels} does not match row count {rows}")]
    LabelCountMismatch { rows: usize, labels: usize },
}

/// Errors from running inference.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("input has {got} feature columns, model expects {expected}")]
    FeatureCountMismatch { expected: usize, got: usize },
}

/// A fitted logistic-regression model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
    feature_means: Vec<f64>,
    feature_stds: Vec<f64>,
}

/// Fits a logistic-regression model to a labeled feature matrix.
///
/// Labels must be 0.0 or 1.0, one per matrix row.
///
/// # Errors
///
/// Returns an error if the matrix is empty or the label vector does not
/// match the row count.
pub fn fit(
    x: &Array2<f64>,
    y: &[f64],
    config: &TrainingConfig,
) -> Result<LogisticModel, FitError> {
    let rows = x.nrows();
    if rows == 0 {
        return Err(FitError::EmptyTrainingSet);
    }
    if y.len() != rows {
        return Err(FitError::LabelCountMismatch {
            rows,
            labels: y.len(),
        });
    }

    let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
    let mut stds = x.std_axis(Axis(0), 0.0);
    // Constant columns standardize with divisor 1 instead of 0.
    stds.mapv_inplace(|s| if s > 0.0 { s } else { 1.0 });

    let z = standardize(x, &means, &stds);
    let labels = Array1::from(y.to_vec());

    let mut weights: Array1<f64> = Array1::zeros(x.ncols());
    let mut bias = 0.0;
    let scale = 1.0 / rows as f64;

    for _ in 0..config.max_iter {
        let logits = z.dot(&weights) + bias;
        let probs = logits.mapv(sigmoid);
        let residual = &probs - &labels;

        let grad_weights = z.t().dot(&residual) * scale;
        let grad_bias = residual.sum() * scale;

        weights = weights - config.learning_rate * grad_weights;
        bias -= config.learning_rate * grad_bias;
    }

    Ok(LogisticModel {
        weights: weights.to_vec(),
        bias,
        feature_means: means.to_vec(),
        feature_stds: stds.to_vec(),
    })
}

impl LogisticModel {
    /// Number of feature columns the model was fit on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    /// Predicts the positive-class probability for each row.
    ///
    /// # Errors
    ///
    /// Returns an error if the column count does not match the model.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>, PredictError> {
        if x.ncols() != self.weights.len() {
            return Err(PredictError::FeatureCountMismatch {
                expected: self.weights.len(),
                got: x.ncols(),
            });
        }

        let means = Array1::from(self.feature_means.clone());
        let stds = Array1::from(self.feature_stds.clone());
        let weights = Array1::from(self.weights.clone());

        let z = standardize(x, &means, &stds);
        let logits = z.dot(&weights) + self.bias;
        Ok(logits.mapv(sigmoid).to_vec())
    }

    /// Predicts the 0/1 label for each row (threshold 0.5).
    ///
    /// # Errors
    ///
    /// Returns an error if the column count does not match the model.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<i64>, PredictError> {
        let probs = self.predict_proba(x)?;
        Ok(probs.iter().map(|&p| i64::from(p >= 0.5)).collect())
    }
}

fn standardize(x: &Array2<f64>, means: &Array1<f64>, stds: &Array1<f64>) -> Array2<f64> {
    (x - means) / stds
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Two clusters separable on the first feature.
    fn separable() -> (Array2<f64>, Vec<f64>) {
        let x = array![
            [1.0, 10.0],
            [1.5, 12.0],
            [2.0, 11.0],
            [8.0, 10.5],
            [9.0, 11.5],
            [8.5, 12.5],
        ];
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn fit_separates_clusters() {
        let (x, y) = separable();
        let model = fit(&x, &y, &TrainingConfig::default()).unwrap();

        let labels = model.predict(&x).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn probabilities_are_bounded() {
        let (x, y) = separable();
        let model = fit(&x, &y, &TrainingConfig::default()).unwrap();

        let probs = model.predict_proba(&x).unwrap();
        assert_eq!(probs.len(), x.nrows());
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn fit_rejects_empty_input() {
        let x = Array2::<f64>::zeros((0, 3));
        let result = fit(&x, &[], &TrainingConfig::default());
        assert!(matches!(result, Err(FitError::EmptyTrainingSet)));
    }

    #[test]
    fn fit_rejects_mismatched_labels() {
        let (x, _) = separable();
        let result = fit(&x, &[0.0, 1.0], &TrainingConfig::default());
        assert!(matches!(
            result,
            Err(FitError::LabelCountMismatch { rows: 6, labels: 2 })
        ));
    }

    #[test]
    fn predict_rejects_wrong_column_count() {
        let (x, y) = separable();
        let model = fit(&x, &y, &TrainingConfig::default()).unwrap();

        let narrow = Array2::<f64>::zeros((1, 1));
        let result = model.predict(&narrow);
        assert!(matches!(
            result,
            Err(PredictError::FeatureCountMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn constant_columns_do_not_blow_up() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [8.0, 5.0], [9.0, 5.0]];
        let y = vec![0.0, 0.0, 1.0, 1.0];
        let model = fit(&x, &y, &TrainingConfig::default()).unwrap();

        let probs = model.predict_proba(&x).unwrap();
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn single_class_training_still_fits() {
        let x = array![[1.0], [2.0]];
        let y = vec![1.0, 1.0];
        let model = fit(&x, &y, &TrainingConfig::default()).unwrap();

        let labels = model.predict(&x).unwrap();
        assert_eq!(labels, vec![1, 1]);
    }
}
