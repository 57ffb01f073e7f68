// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Aviary: AI-powered bird photo classifier and organizer
//!
//! Two-phase workflow: `classify` stages every photo in a flat
//! directory under a species-encoded filename, `distribute` later
//! moves staged photos into per-species folders. `organize` does both
//! in one pass.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info};

use aviary::classifier::Classifier;
use aviary::config::{AppConfig, Credentials};
use aviary::gemini::{model_matches, GeminiClient};
use aviary::pipeline::{PassSummary, PipelineEvent, STAGING_DIR_NAME};
use aviary::worker::{self, WorkerHandle};
use aviary::{AviaryError, Result};

/// Aviary CLI - AI-powered bird photo classifier
#[derive(Parser, Debug)]
#[command(name = "aviary")]
#[command(version = "0.2.0")]
#[command(about = "Classify and organize bird photos with the Gemini API", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for pass summaries
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify every photo in a folder into the flat staging directory
    Classify {
        /// Folder of photos to classify
        folder: PathBuf,

        /// Where the photos were likely taken (overrides config)
        #[arg(short, long)]
        location: Option<String>,
    },

    /// Move staged photos into per-species folders
    Distribute {
        /// Input root or the staging directory itself
        folder: PathBuf,
    },

    /// Classify and file photos into species folders in one pass
    Organize {
        /// Folder of photos to organize
        folder: PathBuf,

        /// Where the photos were likely taken (overrides config)
        #[arg(short, long)]
        location: Option<String>,
    },

    /// Check credential and Gemini API availability
    Status,

    /// Manage the saved API key
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum KeyCommands {
    /// Save an API key, replacing any existing one
    Set {
        /// The API key value
        value: String,
    },

    /// Show the saved API key, masked
    Show,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("Aviary v0.2.0 - Bird Photo Classifier");
    }

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Classify { folder, location } => {
            run_classify(config, folder, location, &cli.format).await
        }
        Commands::Distribute { folder } => run_distribute(config, folder, &cli.format).await,
        Commands::Organize { folder, location } => {
            run_organize(config, folder, location, &cli.format).await
        }
        Commands::Status => run_status(config).await,
        Commands::Key { action } => run_key_command(config, action),
        Commands::Config { action } => run_config_command(config, action, &cli.config),
    }
}

/// Load the saved API key, failing before any file is touched when
/// none is configured.
fn load_api_key(config: &AppConfig) -> Result<String> {
    let credentials = Credentials::load(Path::new(&config.credentials_path));
    if credentials.api_key.is_empty() {
        return Err(AviaryError::Config(
            "No API key saved. Run: aviary key set <key>".to_string(),
        ));
    }
    Ok(credentials.api_key)
}

/// Build a classifier from config, saved credentials, and an optional
/// location override.
fn build_classifier(config: &AppConfig, location: Option<String>) -> Result<Classifier> {
    let api_key = load_api_key(config)?;
    let model = Arc::new(GeminiClient::new(&config.engine, &api_key));
    let hint = location.or_else(|| config.location_hint().map(String::from));
    Ok(Classifier::new(model, hint))
}

/// Run the classification pass
async fn run_classify(
    config: AppConfig,
    folder: PathBuf,
    location: Option<String>,
    format: &str,
) -> Result<()> {
    let classifier = build_classifier(&config, location)?;
    let worker = worker::spawn_classification(folder, classifier);
    let summary = consume_events(worker).await?;
    report_summary(&summary, format)
}

/// Run the distribution pass
async fn run_distribute(config: AppConfig, folder: PathBuf, format: &str) -> Result<()> {
    let api_key = load_api_key(&config)?;
    let model = Arc::new(GeminiClient::new(&config.engine, &api_key));

    let staging = staging_dir(&folder);
    let worker = worker::spawn_distribution(staging, model);
    let summary = consume_events(worker).await?;
    report_summary(&summary, format)
}

/// Run the single-pass organize variant
async fn run_organize(
    config: AppConfig,
    folder: PathBuf,
    location: Option<String>,
    format: &str,
) -> Result<()> {
    let classifier = build_classifier(&config, location)?;
    let worker = worker::spawn_organize(folder, classifier);
    let summary = consume_events(worker).await?;
    report_summary(&summary, format)
}

/// Resolve the staging directory from a user-supplied folder: either
/// the input root (staging dir appended) or the staging directory
/// itself.
fn staging_dir(folder: &Path) -> PathBuf {
    if folder.file_name().map(|n| n == STAGING_DIR_NAME).unwrap_or(false) {
        folder.to_path_buf()
    } else {
        folder.join(STAGING_DIR_NAME)
    }
}

/// Poll the worker's event channel on a fixed interval until the pass
/// ends. A burst of events may arrive in one tick; the worker never
/// waits for this loop.
async fn consume_events(mut worker: WorkerHandle) -> Result<PassSummary> {
    let mut interval = tokio::time::interval(Duration::from_millis(100));
    let mut outcome: Option<Result<PassSummary>> = None;

    'poll: loop {
        interval.tick().await;

        loop {
            match worker.events.try_recv() {
                Ok(PipelineEvent::Progress { index, total, label }) => {
                    info!("[{}/{}] {}", index, total, label);
                }
                Ok(PipelineEvent::Preview(frame)) => {
                    debug!("Preview: {:?} -> {}", frame.path, frame.label);
                }
                Ok(PipelineEvent::Completed(summary)) => {
                    outcome = Some(Ok(summary));
                }
                Ok(PipelineEvent::Error { message }) => {
                    error!("{}", message);
                    outcome = Some(Err(AviaryError::Pipeline(message)));
                }
                Err(TryRecvError::Empty) => continue 'poll,
                Err(TryRecvError::Disconnected) => break 'poll,
            }
        }
    }

    let _ = worker.handle.await;

    // The worker always sends exactly one terminal event.
    outcome.unwrap_or_else(|| {
        Err(AviaryError::Pipeline(
            "Worker ended without a terminal event".to_string(),
        ))
    })
}

/// Print the pass summary in the requested format
fn report_summary(summary: &PassSummary, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(summary)?),
        _ => {
            println!(
                "Processed {} images across {} species in {}s",
                summary.images_processed,
                summary.species_count,
                (summary.finished_at - summary.started_at).num_seconds()
            );
        }
    }
    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("Aviary v0.2.0 Status");
    println!("====================");

    let credentials = Credentials::load(Path::new(&config.credentials_path));
    if credentials.api_key.is_empty() {
        println!("API key: not set ({})", config.credentials_path);
        println!("\nRun: aviary key set <key>");
        return Ok(());
    }
    println!("API key: saved ({})", mask_key(&credentials.api_key));

    let client = GeminiClient::new(&config.engine, &credentials.api_key);
    match client.list_models().await {
        Ok(models) => {
            println!("Gemini: reachable ({} models)", models.len());
            let marker = if models
                .iter()
                .any(|m| model_matches(m, &config.engine.model))
            {
                "available"
            } else {
                "NOT FOUND"
            };
            println!("Model '{}': {}", config.engine.model, marker);
        }
        Err(e) => println!("Gemini: Error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Base URL: {}", config.engine.base_url);
    println!("  Model: {}", config.engine.model);
    println!("  Location hint: {}", config.location_hint().unwrap_or("(none)"));
    println!("  Credentials: {}", config.credentials_path);

    Ok(())
}

/// Run key commands
fn run_key_command(config: AppConfig, action: KeyCommands) -> Result<()> {
    let path = Path::new(&config.credentials_path);

    match action {
        KeyCommands::Set { value } => {
            let credentials = Credentials { api_key: value };
            credentials.save(path)?;
            println!("API key saved to {}", config.credentials_path);
        }
        KeyCommands::Show => {
            let credentials = Credentials::load(path);
            if credentials.api_key.is_empty() {
                println!("No API key saved");
            } else {
                println!("{}", mask_key(&credentials.api_key));
            }
        }
    }

    Ok(())
}

/// Mask an API key down to its last four characters.
fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}

/// Run config commands
fn run_config_command(
    config: AppConfig,
    action: ConfigCommands,
    config_path: &Path,
) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            println!("Configuration at {:?} is valid", config_path);
            println!("  Base URL: {}", config.engine.base_url);
            println!("  Model: {}", config.engine.model);
            println!("  Timeout: {}s", config.engine.timeout_secs);
            println!("  Credentials: {}", config.credentials_path);
        }
    }

    Ok(())
}
