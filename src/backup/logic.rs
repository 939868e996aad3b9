// mysql-backup-runner/src/backup/logic.rs
use chrono::Utc;
use log::{error, info, warn};
use std::path::PathBuf;

use super::model::{
    BackupJob, IncludeSet, JobOutcome, JobStage, RemoteObject, RetentionWindow, RunReport,
    remote_key,
};
use super::{Archiver, DatabaseEngine, RemoteStore};
use crate::config::{AppConfig, TimeoutConfig};
use crate::errors::{BackupError, Result};
use crate::notify::Notifier;
use crate::retention::{sweep_local, sweep_remote};
use crate::utils::with_timeout;

/// Everything the orchestrator needs from configuration, fixed for the run.
#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub include: IncludeSet,
    pub backup_root: PathBuf,
    pub scope_prefix: String,
    pub local_retention: RetentionWindow,
    pub remote_retention: RetentionWindow,
    pub timeouts: TimeoutConfig,
    pub run_retention: bool,
}

impl BackupSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        BackupSettings {
            include: IncludeSet::new(config.include_databases.iter().cloned()),
            backup_root: config.local_backup_dir.clone(),
            scope_prefix: config.spaces_config.folder_prefix.clone(),
            local_retention: RetentionWindow::days(config.retention.local_days),
            remote_retention: RetentionWindow::days(config.retention.remote_days),
            timeouts: config.timeouts,
            run_retention: true,
        }
    }
}

/// Drives dump -> archive -> upload for each included database, then both sweeps.
///
/// Dump and archive failures stay inside the database's iteration: they are
/// logged, alerted on, and the loop moves on. An upload failure, a failure to
/// list the server's databases or a failure to list remote objects ends the run.
pub struct BackupOrchestrator<'a> {
    engine: &'a dyn DatabaseEngine,
    archiver: &'a dyn Archiver,
    store: &'a dyn RemoteStore,
    notifier: &'a dyn Notifier,
    settings: BackupSettings,
}

impl<'a> BackupOrchestrator<'a> {
    pub fn new(
        engine: &'a dyn DatabaseEngine,
        archiver: &'a dyn Archiver,
        store: &'a dyn RemoteStore,
        notifier: &'a dyn Notifier,
        settings: BackupSettings,
    ) -> Self {
        BackupOrchestrator {
            engine,
            archiver,
            store,
            notifier,
            settings,
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::default();

        let live = with_timeout(
            self.settings.timeouts.list,
            self.engine.list_databases(),
            BackupError::DatabaseList,
        )
        .await
        .inspect_err(|e| error!("{}", e))?;

        let selected = self.settings.include.select(&live);
        info!("Databases selected for backup: {:?}", selected);

        for database in &selected {
            let outcome = self.backup_database(database).await?;
            report.outcomes.push((database.clone(), outcome));
        }

        if !self.settings.run_retention {
            info!("Retention sweeps skipped");
            return Ok(report);
        }

        let now = Utc::now();
        report.local_deleted =
            sweep_local(&self.settings.backup_root, self.settings.local_retention, now);

        let prefix = format!("{}/", self.settings.scope_prefix.trim_matches('/'));
        report.remote_deleted = sweep_remote(
            self.store,
            &prefix,
            self.settings.remote_retention,
            now,
            self.settings.timeouts.list,
        )
        .await
        .inspect_err(|e| error!("{}", e))?;

        Ok(report)
    }

    /// Soft failures come back as `Ok(JobOutcome::Failed)`; only hard ones are `Err`.
    async fn backup_database(&self, database: &str) -> Result<JobOutcome> {
        let mut job = BackupJob::new(database);
        info!("[{}] Backup started", database);

        match self.run_pipeline(&mut job).await {
            Ok(uploaded) => {
                job.advance(JobStage::Done);
                info!(
                    "[{}] Backup finished in {}s: {} ({} bytes)",
                    database,
                    (chrono::Local::now() - job.started_at).num_seconds(),
                    uploaded.key,
                    uploaded.size
                );
                Ok(JobOutcome::Success { key: uploaded.key })
            }
            Err(e) if e.is_hard() => {
                error!("[{}] {} stage failed: {}; aborting run", database, job.stage, e);
                self.send_alert(database, &e.to_string()).await;
                Err(e)
            }
            Err(e) => {
                error!("[{}] {} stage failed: {}", database, job.stage, e);
                self.send_alert(database, &e.to_string()).await;
                Ok(job.fail(e.to_string()))
            }
        }
    }

    async fn run_pipeline(&self, job: &mut BackupJob) -> Result<RemoteObject> {
        let database = job.database.clone();

        job.advance(JobStage::Dumping);
        let dump = with_timeout(
            self.settings.timeouts.dump,
            self.engine.dump(&database, &self.settings.backup_root),
            |message| BackupError::DumpFailed {
                database: database.clone(),
                message,
            },
        )
        .await?;
        info!(
            "[{}] Dump written to {} at {}",
            database,
            dump.path.display(),
            dump.created_at.format("%H:%M:%S")
        );

        job.advance(JobStage::Archiving);
        let archive = self.archiver.archive(&dump)?;
        info!("[{}] Archive written to {}", database, archive.path.display());

        job.advance(JobStage::Uploading);
        let key = remote_key(&self.settings.scope_prefix, &archive.path).ok_or_else(|| {
            BackupError::UploadFailed {
                key: archive.path.display().to_string(),
                message: "archive path has no usable file name".to_string(),
            }
        })?;
        with_timeout(
            self.settings.timeouts.upload,
            self.store.upload(&archive, &key),
            |message| BackupError::UploadFailed {
                key: key.clone(),
                message,
            },
        )
        .await
    }

    async fn send_alert(&self, database: &str, message: &str) {
        let sent = with_timeout(
            self.settings.timeouts.notify,
            self.notifier.notify_failure(database, message),
            BackupError::Notify,
        )
        .await;
        if let Err(e) = sent {
            warn!("[{}] {}", database, e);
        }
    }
}
