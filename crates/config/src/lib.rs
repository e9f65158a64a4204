//! Service configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Default model artifact file name inside `MODEL_DIR`.
const DEFAULT_MODEL_FILE: &str = "dropout_model.json";

/// Application configuration.
///
/// Constructed once at process startup via [`Config::from_env`] and passed
/// down explicitly; nothing in this crate is a global.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL.
    pub database_url: String,

    /// Host the HTTP API binds to.
    pub host: String,

    /// Port the HTTP API binds to.
    pub port: u16,

    /// Directory where model artifacts are written.
    pub model_dir: PathBuf,

    /// Path of the current model artifact file.
    pub model_path: PathBuf,

    /// Interval between auto-retrain checks.
    pub auto_train_interval: Duration,

    /// New labeled rows required since the last training run to retrain.
    pub auto_train_threshold: i64,

    /// Absolute minimum number of labeled rows for any training run.
    pub min_training_rows: i64,

    /// Run a threshold check immediately at startup.
    pub run_initial_train: bool,

    /// Optional CSV file to bulk-load before serving.
    pub bulk_csv_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Optional environment variables and their defaults:
    /// - `DATABASE_URL`: `sqlite://dropout.db?mode=rwc`
    /// - `HOST`: `127.0.0.1`
    /// - `PORT`: `8000`
    /// - `MODEL_DIR`: `./models`
    /// - `MODEL_PATH`: `<MODEL_DIR>/dropout_model.json`
    /// - `AUTO_TRAIN_INTERVAL_MIN`: `60` (minutes)
    /// - `AUTO_TRAIN_THRESHOLD`: `50`
    /// - `MIN_TRAINING_ROWS`: `50`
    /// - `RUN_INITIAL_TRAIN`: `0`
    /// - `BULK_CSV_PATH`: unset
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://dropout.db?mode=rwc".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_parse("PORT", 8000u16)?;

        let model_dir = std::env::var("MODEL_DIR")
            .map_or_else(|_| PathBuf::from("./models"), PathBuf::from);
        let model_path = std::env::var("MODEL_PATH")
            .map_or_else(|_| model_dir.join(DEFAULT_MODEL_FILE), PathBuf::from);

        let interval_min = env_parse("AUTO_TRAIN_INTERVAL_MIN", 60u64)?;
        let auto_train_threshold = env_parse("AUTO_TRAIN_THRESHOLD", 50i64)?;
        let min_training_rows = env_parse("MIN_TRAINING_ROWS", 50i64)?;
        let run_initial_train =
            std::env::var("RUN_INITIAL_TRAIN").map_or(false, |v| v == "1");
        let bulk_csv_path = std::env::var("BULK_CSV_PATH").ok().map(PathBuf::from);

        Ok(Self {
            database_url,
            host,
            port,
            model_dir,
            model_path,
            auto_train_interval: Duration::from_secs(interval_min * 60),
            auto_train_threshold,
            min_training_rows,
            run_initial_train,
            bulk_csv_path,
        })
    }
}

/// Parses an optional environment variable, falling back to a default.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {name}: {raw}")),
        Err(_) => Ok(default),
    }
}
