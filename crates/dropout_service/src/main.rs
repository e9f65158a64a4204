//! Student Dropout Risk Service
//!
//! Ingests labeled student records, trains a dropout classifier, and
//! serves predictions over HTTP with automatic retraining.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use database::{create_pool, run_migrations};
use dropout_service::commands;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Student Dropout Risk Service
#[derive(Parser)]
#[command(name = "dropout-service")]
#[command(about = "Dropout risk prediction service with automatic retraining")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the auto-retrain scheduler
    Serve,

    /// Train a model from the labeled records in the database
    Train {
        /// Name for the model
        #[arg(long, default_value = "dropout-model")]
        name: String,

        /// Fraction of rows held out for evaluation
        #[arg(long, default_value = "0.2")]
        holdout_ratio: f64,

        /// Gradient descent iteration cap
        #[arg(long, default_value = "1000")]
        max_iter: usize,

        /// Minimum labeled rows required to train (defaults to the
        /// configured floor)
        #[arg(long)]
        min_rows: Option<i64>,
    },

    /// Bulk-import student records from a CSV file
    Import {
        /// Path to the CSV file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url).await?;

    match cli.command {
        Commands::Serve => {
            commands::serve::run(&pool, config).await?;
        }
        Commands::Train {
            name,
            holdout_ratio,
            max_iter,
            min_rows,
        } => {
            run_migrations(&pool).await?;
            commands::train::run(
                &pool,
                config.model_path.clone(),
                &name,
                holdout_ratio,
                max_iter,
                min_rows.unwrap_or(config.min_training_rows),
            )
            .await?;
        }
        Commands::Import { file } => {
            run_migrations(&pool).await?;
            commands::import::run(&pool, &file).await?;
        }
        Commands::Migrate => {
            run_migrations(&pool).await?;
            info!("Migrations completed successfully");
        }
    }

    Ok(())
}
