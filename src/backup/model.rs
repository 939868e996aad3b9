// mysql-backup-runner/src/backup/model.rs
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Dump,
    Archive,
}

/// A file on local storage produced by one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub database: String,
    pub created_at: DateTime<Local>,
    pub kind: ArtifactKind,
}

impl Artifact {
    pub fn new(path: PathBuf, database: &str, kind: ArtifactKind) -> Self {
        Artifact {
            path,
            database: database.to_string(),
            created_at: Local::now(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

/// Builds the object key for an archive: `<prefix>/<archive base name>`.
pub fn remote_key(prefix: &str, archive_path: &Path) -> Option<String> {
    let base = archive_path.file_name()?.to_str()?;
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        Some(base.to_string())
    } else {
        Some(format!("{}/{}", prefix, base))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Pending,
    Dumping,
    Archiving,
    Uploading,
    Done,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStage::Pending => "pending",
            JobStage::Dumping => "dump",
            JobStage::Archiving => "archive",
            JobStage::Uploading => "upload",
            JobStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success { key: String },
    Failed { stage: JobStage, cause: String },
}

/// One database-backup attempt, alive for a single loop iteration.
#[derive(Debug)]
pub struct BackupJob {
    pub database: String,
    pub started_at: DateTime<Local>,
    pub stage: JobStage,
}

impl BackupJob {
    pub fn new(database: &str) -> Self {
        BackupJob {
            database: database.to_string(),
            started_at: Local::now(),
            stage: JobStage::Pending,
        }
    }

    pub fn advance(&mut self, stage: JobStage) {
        log::debug!("[{}] {} -> {}", self.database, self.stage, stage);
        self.stage = stage;
    }

    pub fn fail(self, cause: String) -> JobOutcome {
        JobOutcome::Failed {
            stage: self.stage,
            cause,
        }
    }
}

/// Databases eligible for backup, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct IncludeSet {
    names: Vec<String>,
}

impl IncludeSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = IncludeSet::default();
        for name in names {
            let name = name.into();
            if !set.names.contains(&name) {
                set.names.push(name);
            }
        }
        set
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Filters the live database list to included names.
    ///
    /// The live order is kept; names absent from the live list are dropped without error.
    pub fn select(&self, live: &[String]) -> Vec<String> {
        let mut selected: Vec<String> = Vec::new();
        for name in live {
            if self.contains(name) && !selected.contains(name) {
                selected.push(name.clone());
            }
        }
        selected
    }
}

/// Maximum age before an artifact or remote object is swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow(chrono::Duration);

impl RetentionWindow {
    pub fn days(days: u32) -> Self {
        RetentionWindow(chrono::Duration::days(i64::from(days)))
    }

    pub fn max_age(&self) -> chrono::Duration {
        self.0
    }

    /// True when `timestamp` is strictly older than the window at `now`.
    pub fn is_expired(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(timestamp) > self.0
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<(String, JobOutcome)>,
    pub local_deleted: usize,
    pub remote_deleted: usize,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, JobOutcome::Success { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}
