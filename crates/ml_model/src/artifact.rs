//! Model artifact persistence.
//!
//! The fitted model and the exact ordered feature-column list it was
//! trained on are one JSON document, written and loaded together so
//! inference can never pair a model with a stale column list.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::LogisticModel;

/// Errors from loading or saving a model artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model artifact not found at {path}")]
    NotFound { path: String },

    #[error("failed to access model artifact: {0}")]
    Io(#[from] io::Error),

    #[error("model artifact is not valid: {0}")]
    Format(#[from] serde_json::Error),
}

/// A persisted model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Model name chosen at training time.
    pub model_name: String,
    /// Ordered feature-column list the model expects at inference.
    pub feature_columns: Vec<String>,
    /// The fitted classifier.
    pub model: LogisticModel,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    /// Loads an artifact from disk.
    ///
    /// Callers re-load on every inference call; the file may be replaced
    /// by a concurrent training run between calls.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::NotFound`] if no artifact exists at the
    /// path, or an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(ArtifactError::Io(e)),
        };

        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes the artifact to disk, replacing any existing one.
    ///
    /// The document is written to a temporary sibling file and renamed
    /// into place, so concurrent loaders see either the old artifact or
    /// the new one, never a partial write.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let raw = serde_json::to_string(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;

        Ok(())
    }
}
