// mysql-backup-runner/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MYSQL_PORT: u16 = 3306;
const DEFAULT_FOLDER_PREFIX: &str = "mysql-backups";
const DEFAULT_LOCAL_RETENTION_DAYS: u32 = 3;
const DEFAULT_REMOTE_RETENTION_DAYS: u32 = 35;
const DEFAULT_LIST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_DUMP_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 30;

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
pub struct JsonDatabaseConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonS3StorageConfig {
    pub bucket_name: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint_url: Option<String>,
    pub folder_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonNotificationConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub sender: Option<String>,
    pub recipients: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRetentionConfig {
    pub local_days: Option<u32>,
    pub remote_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonTimeoutConfig {
    pub list_secs: Option<u64>,
    pub dump_secs: Option<u64>,
    pub upload_secs: Option<u64>,
    pub notify_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJsonConfig {
    pub database: Option<JsonDatabaseConfig>,
    pub include_databases: Option<serde_json::Value>,
    pub local_backup_dir: Option<PathBuf>,
    pub s3_storage: Option<JsonS3StorageConfig>,
    pub notification: Option<JsonNotificationConfig>,
    pub retention: Option<JsonRetentionConfig>,
    pub timeouts: Option<JsonTimeoutConfig>,
    pub log_file: Option<PathBuf>,
}

// Application's internal configuration structs
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

// Keeps the password out of log output.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct SpacesConfig {
    pub endpoint_url: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub folder_prefix: String,
}

impl std::fmt::Debug for SpacesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpacesConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("folder_prefix", &self.folder_prefix)
            .finish()
    }
}

#[derive(Clone)]
pub struct NotificationConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender: String,
    pub recipients: Vec<String>,
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("sender", &self.sender)
            .field("recipients", &self.recipients)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    pub local_days: u32,
    pub remote_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub list: Duration,
    pub dump: Duration,
    pub upload: Duration,
    pub notify: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            list: Duration::from_secs(DEFAULT_LIST_TIMEOUT_SECS),
            dump: Duration::from_secs(DEFAULT_DUMP_TIMEOUT_SECS),
            upload: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            notify: Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub include_databases: Vec<String>,
    pub local_backup_dir: PathBuf,
    pub spaces_config: SpacesConfig,
    pub notification: Option<NotificationConfig>,
    pub retention: RetentionConfig,
    pub timeouts: TimeoutConfig,
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;
        Self::from_raw(raw_json_config)
    }

    pub fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let database = load_database_config(raw.database.as_ref())?;
        let include_databases = parse_include_databases(&raw.include_databases)?;

        let local_backup_dir = raw
            .local_backup_dir
            .clone()
            .context("local_backup_dir must be set in config.json")?;
        if local_backup_dir.as_os_str().is_empty() {
            anyhow::bail!("local_backup_dir cannot be empty in config.json.");
        }

        let spaces_config = load_spaces_config(
            raw.s3_storage
                .as_ref()
                .context("s3_storage must be set in config.json")?,
        )?;
        let notification = raw
            .notification
            .as_ref()
            .map(load_notification_config)
            .transpose()?;
        let retention = load_retention_config(&raw.retention.clone().unwrap_or_default())?;
        let timeouts = load_timeout_config(&raw.timeouts.clone().unwrap_or_default())?;

        Ok(AppConfig {
            database,
            include_databases,
            local_backup_dir,
            spaces_config,
            notification,
            retention,
            timeouts,
            log_file: raw.log_file.filter(|p| !p.as_os_str().is_empty()),
        })
    }
}

fn required(value: &Option<String>, field: &str) -> Result<String> {
    value
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .with_context(|| format!("{} must be set and non-empty in config.json", field))
}

fn load_database_config(raw: Option<&JsonDatabaseConfig>) -> Result<DatabaseConfig> {
    let raw = raw.context("database section must be set in config.json")?;
    // Passwords are taken verbatim; surrounding spaces may be significant.
    let password = raw
        .password
        .clone()
        .filter(|p| !p.is_empty())
        .context("database.password must be set and non-empty in config.json")?;
    Ok(DatabaseConfig {
        host: required(&raw.host, "database.host")?,
        port: raw.port.unwrap_or(DEFAULT_MYSQL_PORT),
        user: required(&raw.user, "database.user")?,
        password,
    })
}

fn load_spaces_config(raw: &JsonS3StorageConfig) -> Result<SpacesConfig> {
    let folder_prefix = raw
        .folder_prefix
        .as_deref()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_FOLDER_PREFIX)
        .to_string();

    Ok(SpacesConfig {
        endpoint_url: required(&raw.endpoint_url, "s3_storage.endpoint_url")?,
        region: required(&raw.region, "s3_storage.region")?,
        access_key_id: required(&raw.access_key_id, "s3_storage.access_key_id")?,
        secret_access_key: required(&raw.secret_access_key, "s3_storage.secret_access_key")?,
        bucket_name: required(&raw.bucket_name, "s3_storage.bucket_name")?,
        folder_prefix,
    })
}

fn load_notification_config(raw: &JsonNotificationConfig) -> Result<NotificationConfig> {
    let recipients: Vec<String> = raw
        .recipients
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    if recipients.is_empty() {
        anyhow::bail!("notification.recipients must list at least one address");
    }

    Ok(NotificationConfig {
        api_url: required(&raw.api_url, "notification.api_url")?,
        api_key: required(&raw.api_key, "notification.api_key")?,
        sender: required(&raw.sender, "notification.sender")?,
        recipients,
    })
}

fn load_retention_config(raw: &JsonRetentionConfig) -> Result<RetentionConfig> {
    let local_days = raw.local_days.unwrap_or(DEFAULT_LOCAL_RETENTION_DAYS);
    let remote_days = raw.remote_days.unwrap_or(DEFAULT_REMOTE_RETENTION_DAYS);
    if local_days == 0 || remote_days == 0 {
        anyhow::bail!("retention.local_days and retention.remote_days must be greater than zero");
    }
    Ok(RetentionConfig {
        local_days,
        remote_days,
    })
}

fn load_timeout_config(raw: &JsonTimeoutConfig) -> Result<TimeoutConfig> {
    let defaults = TimeoutConfig::default();
    let pick = |value: Option<u64>, default: Duration, field: &str| -> Result<Duration> {
        match value {
            Some(0) => Err(anyhow::anyhow!("timeouts.{} must be greater than zero", field)),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(default),
        }
    };
    Ok(TimeoutConfig {
        list: pick(raw.list_secs, defaults.list, "list_secs")?,
        dump: pick(raw.dump_secs, defaults.dump, "dump_secs")?,
        upload: pick(raw.upload_secs, defaults.upload, "upload_secs")?,
        notify: pick(raw.notify_secs, defaults.notify, "notify_secs")?,
    })
}

/// Database names end up as mysqldump arguments, so only plain identifiers are accepted.
pub fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '$')
}

/// Parses include_databases, which is either an array of names or a mapping
/// whose keys are the names. Order is kept and duplicates are dropped.
fn parse_include_databases(include_databases: &Option<serde_json::Value>) -> Result<Vec<String>> {
    let value = include_databases
        .as_ref()
        .context("include_databases must be set in config.json")?;

    let names: Vec<String> = if value.is_array() {
        serde_json::from_value(value.clone())
            .context("Failed to parse include_databases as array")?
    } else if value.is_object() {
        let mapping: HashMap<String, serde_json::Value> = serde_json::from_value(value.clone())
            .context("Failed to parse include_databases as mapping object")?;
        let mut keys: Vec<String> = mapping.into_keys().collect();
        keys.sort();
        keys
    } else {
        anyhow::bail!("include_databases must be an array of names or a mapping object");
    };

    let mut databases: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim().to_string();
        if !is_valid_database_name(&name) {
            anyhow::bail!("Invalid database name in include_databases: {:?}", name);
        }
        if !databases.contains(&name) {
            databases.push(name);
        }
    }

    if databases.is_empty() {
        anyhow::bail!("include_databases cannot be empty in config.json.");
    }
    Ok(databases)
}
