//! Splitbench - dataset ingestion and temporal split driver
//!
//! Usage:
//!   splitbench ingest ./line3_sensors.csv
//!   splitbench validate 1 --training-start 2024-01-01 --training-end 2024-01-20 \
//!       --testing-start 2024-01-21 --testing-end 2024-01-25 \
//!       --simulation-start 2024-01-26 --simulation-end 2024-01-31
//!   splitbench train 1
//!   splitbench simulate 1 --limit 20 --delay-ms 250

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use splitbench_backend::{
    config::Config,
    ingest::parse_instant,
    ml::MlServiceClient,
    models::{DatasetId, DateRange, DateRangeRequest, Phase},
    store::SqliteDatasetStore,
    DatasetService,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "splitbench")]
#[command(about = "Ingest CSV datasets and split them into training, testing and simulation phases")]
struct Cli {
    /// SQLite metadata database (overrides DATABASE_PATH)
    #[arg(long, env = "DATABASE_PATH")]
    db_path: Option<PathBuf>,

    /// Directory uploaded files are copied into (overrides UPLOADS_DIR)
    #[arg(long, env = "UPLOADS_DIR")]
    uploads_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy a CSV file into the uploads directory and ingest it
    Ingest { file: PathBuf },

    /// Show dataset metadata
    Show { id: i64 },

    /// Validate and store phase date ranges
    Validate {
        id: i64,
        #[arg(long, value_parser = parse_when)]
        training_start: DateTime<Utc>,
        #[arg(long, value_parser = parse_when)]
        training_end: DateTime<Utc>,
        #[arg(long, value_parser = parse_when)]
        testing_start: DateTime<Utc>,
        #[arg(long, value_parser = parse_when)]
        testing_end: DateTime<Utc>,
        #[arg(long, value_parser = parse_when)]
        simulation_start: DateTime<Utc>,
        #[arg(long, value_parser = parse_when)]
        simulation_end: DateTime<Utc>,
    },

    /// Train a model on the training and testing partitions
    Train { id: i64 },

    /// Play the simulation partition against the trained model
    Simulate {
        id: i64,

        /// Stop after this many rows
        #[arg(long)]
        limit: Option<usize>,

        /// Pause between rows
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },

    /// Check that the ML service is reachable
    Health,
}

fn parse_when(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(raw).ok_or_else(|| format!("unrecognized date/time: {}", raw))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "splitbench_backend=info,splitbench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(db_path) = cli.db_path {
        config.database_path = db_path;
    }
    if let Some(uploads_dir) = cli.uploads_dir {
        config.uploads_dir = uploads_dir;
    }

    let store = SqliteDatasetStore::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open dataset store: {}",
            config.database_path.display()
        )
    })?;
    let service = DatasetService::new(Arc::new(store), config.uploads_dir.clone());
    let ml = MlServiceClient::from_config(&config);

    match cli.command {
        Commands::Ingest { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("file path has no file name")?;
            let summary = service.ingest_upload(file_name, &bytes)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Show { id } => {
            let dataset = service.dataset(DatasetId(id))?;
            println!("{}", serde_json::to_string_pretty(&dataset)?);
        }
        Commands::Validate {
            id,
            training_start,
            training_end,
            testing_start,
            testing_end,
            simulation_start,
            simulation_end,
        } => {
            let request = DateRangeRequest {
                dataset_id: DatasetId(id),
                training: DateRange::new(training_start, training_end),
                testing: DateRange::new(testing_start, testing_end),
                simulation: DateRange::new(simulation_start, simulation_end),
            };
            let response = service.validate_date_ranges(&request)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Train { id } => {
            let report = service.train_model(DatasetId(id), &ml).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Simulate {
            id,
            limit,
            delay_ms,
        } => {
            let id = DatasetId(id);
            let rows = service.simulation_rows(id)?;
            if rows.is_empty() {
                warn!(dataset_id = %id, "no {} rows to play", Phase::Simulation);
            }

            let total = rows.len();
            let mut passes = 0usize;
            for row in rows.into_iter().take(limit.unwrap_or(usize::MAX)) {
                let step = service.simulate_step(id, row, &ml).await?;
                if step.row.prediction == Some(1) {
                    passes += 1;
                }
                println!("{}", serde_json::to_string(&step)?);
                if step.is_completed {
                    break;
                }
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
            info!(dataset_id = %id, total, predicted_pass = passes, "simulation finished");
        }
        Commands::Health => {
            let health = ml.health().await?;
            let models = ml.list_models().await.unwrap_or_default();
            println!(
                "{} at {} ({} models)",
                health.status,
                ml.base_url(),
                models.len()
            );
        }
    }

    Ok(())
}
