//! Main module for the HarvestMind CLI application (hm).
//!
//! This module provides the main function and auxiliary functionalities for
//! the CLI application. It handles command parsing, configuration loading,
//! and initialization, as well as invoking the appropriate functionality
//! based on the provided command-line arguments.
//!
//! # Examples
//!
//! Running a diagnosis against a seeded in-memory bank:
//!
//! ```sh
//! hm diagnose --snapshot sensors.json --dataset cases.jsonl \
//!     "why are the lower leaves spotting?"
//! ```
//!
//! Initializing the application's configuration and templates:
//!
//! ```sh
//! hm init
//! ```

use std::{env, error::Error, fs, path::Path, sync::Arc};

use clap::Parser;
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use harvest_mind::{
    alerts, commands, config,
    config::HarvestMindConfig,
    config_dir,
    doctor::Doctor,
    embedding::RemoteEmbedder,
    indexer,
    models::{DiagnosisRequest, IngestRequest, SensorReading},
    template::{self, ReportTemplate},
    vector_store::CaseBank,
};

static TRACING: OnceCell<()> = OnceCell::new();

/// Environment variable that points at an alternative config file.
const CONFIG_ENV: &str = "HARVESTMIND_CONFIG";

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt::init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Main asynchronous function of the HarvestMind CLI application.
///
/// Loads configuration, parses command-line arguments, and executes the
/// appropriate command.
async fn run() -> Result<(), Box<dyn Error>> {
    let cli = commands::Cli::parse();

    if let commands::Commands::Init = cli.command {
        debug!("Initializing configuration");
        return init();
    }

    let config_path = match env::var(CONFIG_ENV) {
        Ok(path) => path.into(),
        Err(_) => config_dir()?.join("config.yaml"),
    };
    debug!("Loading config from: {}", config_path.display());
    let mind_config = config::load_config(config_path.to_str().ok_or("Bad config path")?)?;

    match cli.command {
        commands::Commands::Diagnose {
            query,
            snapshot,
            cases,
            dataset,
            top_k,
            template,
        } => {
            let mut mind_config = mind_config;
            if let Some(k) = top_k {
                mind_config.retrieval_top_k = k;
            }

            let report_template = match template {
                Some(name) => template::load_template(&name).await?,
                None => ReportTemplate::doctor(),
            };

            let query = query.unwrap_or_else(|| "How healthy is this field?".to_string());
            let snapshot = match snapshot {
                Some(path) => load_snapshot(&path)?,
                None => Vec::new(),
            };

            let bank = Arc::new(CaseBank::with_capacity(
                mind_config.embedding_dimension,
                mind_config.metric.instantiate(),
                mind_config.max_cases,
            ));
            let embedder = RemoteEmbedder::new(&mind_config)?;

            if let Some(path) = cases {
                let requests = load_ingest_requests(&path)?;
                for request in requests {
                    let ack = bank.ingest_embedding(request)?;
                    debug!(id = %ack.id, ordinal = ack.ordinal, "case ingested");
                }
                info!(total = bank.len(), "precomputed cases ingested");
            }

            if let Some(path) = dataset {
                let labeled = indexer::load_dataset(&path)?;
                indexer::index_dataset(&embedder, &bank, &labeled).await?;
            }

            let request = DiagnosisRequest {
                field_id: "cli".to_string(),
                timestamp: chrono::Utc::now(),
                sensor_snapshot: snapshot,
                query_text: query,
                observation: None,
                embedding: None,
            };

            let doctor = Doctor::new(mind_config, report_template, bank, embedder);
            let report = doctor.diagnose(&request).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        commands::Commands::Alerts { snapshot } => {
            let snapshot = load_snapshot(&snapshot)?;
            let response = alerts::check_sensors(&snapshot);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        commands::Commands::Init => unreachable!("handled above"),
    }

    Ok(())
}

fn load_snapshot(path: &Path) -> Result<Vec<SensorReading>, Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn load_ingest_requests(path: &Path) -> Result<Vec<IngestRequest>, Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

/// Initializes the application's configuration and templates.
///
/// Creates the necessary directories and files for the application's
/// configuration and default report template, both in YAML format. The
/// written config carries an empty `api_key`; set the
/// `HARVESTMIND_API_KEY` environment variable instead of editing the file.
fn init() -> Result<(), Box<dyn Error>> {
    let config_dir = config_dir()?;
    let path = config_dir.join("templates");
    info!("Creating template config directory: {}", path.display());
    fs::create_dir_all(&path)?;

    let template_path = path.join("doctor_report.yaml");
    info!("Creating template file: {}", template_path.display());
    let template_yaml = serde_yaml::to_string(&ReportTemplate::doctor())?;
    fs::write(template_path, template_yaml)?;

    let config_path = config_dir.join("config.yaml");
    info!("Creating config file: {}", config_path.display());
    let config_yaml = serde_yaml::to_string(&HarvestMindConfig::local_default())?;
    fs::write(config_path, config_yaml)?;

    Ok(())
}
