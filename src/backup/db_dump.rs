// mysql-backup-runner/src/backup/db_dump.rs
use async_trait::async_trait;
use chrono::Local;
use log::{debug, info};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{Connection, MySqlConnection, Row};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::process::Command;

use super::DatabaseEngine;
use super::model::{Artifact, ArtifactKind};
use crate::config::{DatabaseConfig, is_valid_database_name};
use crate::errors::{BackupError, Result};
use crate::utils::find_executable;

/// Second resolution is enough: databases are dumped one after another.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const LIST_SCHEMAS_QUERY: &str =
    "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA ORDER BY SCHEMA_NAME";

/// MySQL server reached through sqlx for listing and mysqldump for dumps.
pub struct MySqlEngine {
    config: DatabaseConfig,
}

impl MySqlEngine {
    pub fn new(config: DatabaseConfig) -> Self {
        MySqlEngine { config }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
    }
}

/// Writes a `[client]` option file so the password never shows up in the process list.
fn write_defaults_file(config: &DatabaseConfig) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "[client]")?;
    writeln!(file, "host={}", option_value(&config.host))?;
    writeln!(file, "port={}", config.port)?;
    writeln!(file, "user={}", option_value(&config.user))?;
    writeln!(file, "password={}", option_value(&config.password))?;
    file.flush()?;
    Ok(file)
}

/// Quotes a value for a MySQL option file, escaping the characters the
/// option-file parser would otherwise interpret.
fn option_value(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for c in raw.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

/// Directory and file names for one dump: `<root>/<db>_<ts>/<db>_<ts>.sql`.
pub fn dump_paths(backup_root: &Path, database: &str, timestamp: &str) -> (PathBuf, PathBuf) {
    let stem = format!("{}_{}", database, timestamp);
    let dir = backup_root.join(&stem);
    let file = dir.join(format!("{}.sql", stem));
    (dir, file)
}

pub fn create_dump_command(
    mysqldump: &Path,
    defaults_file: &Path,
    result_file: &Path,
    database: &str,
) -> Command {
    let mut cmd = Command::new(mysqldump);
    // --defaults-extra-file must come first.
    cmd.arg(format!("--defaults-extra-file={}", defaults_file.display()));
    cmd.arg("--single-transaction");
    cmd.arg("--quick");
    cmd.arg("--routines");
    cmd.arg("--triggers");
    cmd.arg("--events");
    cmd.arg(format!("--result-file={}", result_file.display()));
    cmd.arg(database);
    cmd
}

#[async_trait]
impl DatabaseEngine for MySqlEngine {
    async fn list_databases(&self) -> Result<Vec<String>> {
        debug!("Fetching list of databases from {}:{}", self.config.host, self.config.port);
        let mut conn = MySqlConnection::connect_with(&self.connect_options())
            .await
            .map_err(|e| {
                BackupError::DatabaseList(format!(
                    "failed to connect to {}:{}: {}",
                    self.config.host, self.config.port, e
                ))
            })?;

        let rows = sqlx::query(LIST_SCHEMAS_QUERY)
            .fetch_all(&mut conn)
            .await
            .map_err(|e| BackupError::DatabaseList(format!("failed to fetch schema list: {}", e)))?;

        let names = rows
            .iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| {
                BackupError::DatabaseList(format!("failed to decode schema name: {}", e))
            })?;

        // A failed close does not invalidate the list we already have.
        if let Err(e) = conn.close().await {
            debug!("Closing listing connection failed: {}", e);
        }

        info!("Found {} databases on server", names.len());
        Ok(names)
    }

    async fn dump(&self, database: &str, backup_root: &Path) -> Result<Artifact> {
        let fail = |message: String| BackupError::DumpFailed {
            database: database.to_string(),
            message,
        };

        if !is_valid_database_name(database) {
            return Err(fail("invalid database name".to_string()));
        }

        let mysqldump = find_executable("mysqldump").map_err(fail)?;
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let (dump_dir, dump_file) = dump_paths(backup_root, database, &timestamp);

        tokio::fs::create_dir_all(&dump_dir)
            .await
            .map_err(|e| fail(format!("failed to create {}: {}", dump_dir.display(), e)))?;

        let defaults = write_defaults_file(&self.config)
            .map_err(|e| fail(format!("failed to write client option file: {}", e)))?;

        info!("[{}] Dumping to {}", database, dump_file.display());
        let output = create_dump_command(&mysqldump, defaults.path(), &dump_file, database)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| fail(format!("failed to execute mysqldump: {}", e)))?;

        if !output.status.success() {
            return Err(fail(format!(
                "mysqldump exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(Artifact::new(dump_file, database, ArtifactKind::Dump))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn sample_config() -> DatabaseConfig {
        DatabaseConfig {
            host: "db.internal".to_string(),
            port: 3307,
            user: "backup".to_string(),
            password: "pa\"ss".to_string(),
        }
    }

    #[test]
    fn test_dump_paths_embed_database_and_timestamp() {
        let (dir, file) = dump_paths(Path::new("/var/backups"), "orders", "2024-05-01_02-00-00");
        assert_eq!(dir, PathBuf::from("/var/backups/orders_2024-05-01_02-00-00"));
        assert_eq!(
            file,
            PathBuf::from("/var/backups/orders_2024-05-01_02-00-00/orders_2024-05-01_02-00-00.sql")
        );
    }

    #[test]
    fn test_dump_command_is_consistent_and_self_contained() {
        let cmd = create_dump_command(
            Path::new("/usr/bin/mysqldump"),
            Path::new("/tmp/client.cnf"),
            Path::new("/var/backups/orders.sql"),
            "orders",
        );
        let args: Vec<&OsStr> = cmd.as_std().get_args().collect();
        assert_eq!(args[0], OsStr::new("--defaults-extra-file=/tmp/client.cnf"));
        for flag in ["--single-transaction", "--routines", "--triggers", "--events"] {
            assert!(args.contains(&OsStr::new(flag)), "missing {}", flag);
        }
        assert_eq!(args.last(), Some(&OsStr::new("orders")));
        assert!(!args.iter().any(|a| a.to_string_lossy().contains("pa\"ss")));
    }

    #[test]
    fn test_defaults_file_contains_client_section() -> anyhow::Result<()> {
        let file = write_defaults_file(&sample_config())?;
        let content = std::fs::read_to_string(file.path())?;
        assert!(content.starts_with("[client]\n"));
        assert!(content.contains("host=\"db.internal\"\n"));
        assert!(content.contains("port=3307\n"));
        assert!(content.contains("user=\"backup\"\n"));
        assert!(content.contains("password=\"pa\\\"ss\"\n"));
        Ok(())
    }

    #[test]
    fn test_defaults_file_keeps_multiline_password_on_one_line() -> anyhow::Result<()> {
        let config = DatabaseConfig {
            password: "line1\nline2\\end".to_string(),
            ..sample_config()
        };
        let file = write_defaults_file(&config)?;
        let content = std::fs::read_to_string(file.path())?;
        assert_eq!(content.lines().count(), 5);
        assert!(content.contains("password=\"line1\\nline2\\\\end\"\n"));
        Ok(())
    }

    #[tokio::test]
    async fn test_dump_rejects_option_like_names() {
        let engine = MySqlEngine::new(sample_config());
        let dir = tempfile::tempdir().unwrap();
        let err = engine.dump("--all-databases", dir.path()).await.unwrap_err();
        assert!(matches!(err, BackupError::DumpFailed { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
