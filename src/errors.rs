use std::path::PathBuf;
use thiserror::Error;

/// How far an error is allowed to unwind.
///
/// Soft errors stay inside one database's pipeline iteration (or one sweep item).
/// Hard errors end the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Soft,
    Hard,
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Failed to list databases: {0}")]
    DatabaseList(String),

    #[error("Dump of database {database} failed: {message}")]
    DumpFailed { database: String, message: String },

    #[error("Archiving dump of database {database} failed: {message}")]
    ArchiveFailed { database: String, message: String },

    #[error("Upload of {key} failed: {message}")]
    UploadFailed { key: String, message: String },

    #[error("Failed to list remote objects under {prefix}: {message}")]
    RemoteListError { prefix: String, message: String },

    #[error("Failed to delete local file {path}: {source}")]
    LocalDeleteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete remote object {key}: {message}")]
    RemoteDeleteError { key: String, message: String },

    #[error("Failed to deliver notification: {0}")]
    Notify(String),
}

impl BackupError {
    pub fn severity(&self) -> Severity {
        match self {
            BackupError::DatabaseList(_)
            | BackupError::UploadFailed { .. }
            | BackupError::RemoteListError { .. } => Severity::Hard,
            BackupError::DumpFailed { .. }
            | BackupError::ArchiveFailed { .. }
            | BackupError::LocalDeleteError { .. }
            | BackupError::RemoteDeleteError { .. }
            | BackupError::Notify(_) => Severity::Soft,
        }
    }

    pub fn is_hard(&self) -> bool {
        self.severity() == Severity::Hard
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_errors_before_upload_are_soft() {
        let dump = BackupError::DumpFailed {
            database: "orders".to_string(),
            message: "exit status 2".to_string(),
        };
        let archive = BackupError::ArchiveFailed {
            database: "orders".to_string(),
            message: "disk full".to_string(),
        };
        assert_eq!(dump.severity(), Severity::Soft);
        assert_eq!(archive.severity(), Severity::Soft);
    }

    #[test]
    fn test_upload_and_listing_errors_are_hard() {
        let upload = BackupError::UploadFailed {
            key: "mysql-backups/orders.tar.gz".to_string(),
            message: "403".to_string(),
        };
        let list = BackupError::RemoteListError {
            prefix: "mysql-backups/".to_string(),
            message: "timeout".to_string(),
        };
        assert!(upload.is_hard());
        assert!(list.is_hard());
        assert!(BackupError::DatabaseList("refused".to_string()).is_hard());
    }

    #[test]
    fn test_delete_errors_are_soft() {
        let local = BackupError::LocalDeleteError {
            path: PathBuf::from("/backups/old.tar.gz"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let remote = BackupError::RemoteDeleteError {
            key: "mysql-backups/old.tar.gz".to_string(),
            message: "AccessDenied".to_string(),
        };
        assert!(!local.is_hard());
        assert!(!remote.is_hard());
        assert!(local.to_string().contains("/backups/old.tar.gz"));
    }
}
