//! MySQL Backup Runner
//!
//! Dumps the configured databases, archives and uploads each dump to
//! S3-compatible storage, then enforces local and remote retention.

// mysql-backup-runner/src/main.rs
mod backup;
mod config;
mod errors;
mod notify;
mod retention;
mod utils;

use anyhow::{Context, Result};
use backup::archive::TarGzArchiver;
use backup::db_dump::MySqlEngine;
use backup::logic::BackupSettings;
use backup::model::{JobOutcome, RunReport};
use backup::s3_storage::S3RemoteStore;
use backup::BackupOrchestrator;
use clap::Parser;
use config::AppConfig;
use log::{info, warn};
use notify::{EmailApiNotifier, LogNotifier, Notifier};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "mysql-backup-runner")]
#[command(about = "Back up MySQL databases to S3-compatible storage and enforce retention")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "BACKUP_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Append log lines to this file (overrides log_file from the config)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Run the backup pipeline only, without the retention sweeps
    #[arg(long)]
    skip_retention: bool,
}

/// Main entry point for the backup runner
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = run_app(cli).await;
    let line = status_line(&result);
    match result {
        Ok(_) => {
            println!("{}", line);
            ExitCode::SUCCESS
        }
        Err(_) => {
            // Hard failures were already logged where they happened.
            eprintln!("{}", line);
            ExitCode::FAILURE
        }
    }
}

fn status_line(result: &Result<RunReport>) -> String {
    match result {
        Ok(report) => format!(
            "✅ Backup run completed: {} succeeded, {} failed.",
            report.succeeded(),
            report.failed()
        ),
        Err(e) => format!("❌ Backup run aborted: {:#}", e),
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("Failed to initialise logging")?;
    Ok(())
}

async fn run_app(cli: Cli) -> Result<RunReport> {
    let app_config = AppConfig::load_from_json(&cli.config).with_context(|| {
        format!(
            "Failed to load application configuration from {}",
            cli.config.display()
        )
    })?;

    let log_file = cli.log_file.clone().or_else(|| app_config.log_file.clone());
    init_logging(log_file.as_deref())?;

    info!(
        "Starting backup run: {} databases included, backup root {}",
        app_config.include_databases.len(),
        app_config.local_backup_dir.display()
    );
    std::fs::create_dir_all(&app_config.local_backup_dir).with_context(|| {
        format!(
            "Failed to create local backup directory {}",
            app_config.local_backup_dir.display()
        )
    })?;

    let engine = MySqlEngine::new(app_config.database.clone());
    let store = S3RemoteStore::connect(&app_config.spaces_config).await;
    let notifier: Box<dyn Notifier> = match &app_config.notification {
        Some(notification) => Box::new(EmailApiNotifier::new(
            notification.clone(),
            app_config.timeouts.notify,
        )?),
        None => {
            warn!("No notification section configured; failures will only be logged");
            Box::new(LogNotifier)
        }
    };

    let mut settings = BackupSettings::from_config(&app_config);
    settings.run_retention = !cli.skip_retention;

    let orchestrator =
        BackupOrchestrator::new(&engine, &TarGzArchiver, &store, notifier.as_ref(), settings);
    let report = orchestrator.run().await?;

    for (database, outcome) in &report.outcomes {
        match outcome {
            JobOutcome::Success { key } => info!("[{}] ok -> {}", database, key),
            JobOutcome::Failed { stage, cause } => {
                warn!("[{}] failed at {} stage: {}", database, stage, cause)
            }
        }
    }
    info!(
        "Run summary: {} succeeded, {} failed, {} local files and {} remote objects expired",
        report.succeeded(),
        report.failed(),
        report.local_deleted,
        report.remote_deleted
    );
    Ok(report)
}
