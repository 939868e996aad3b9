pub(crate) mod archive;
pub(crate) mod db_dump;
pub(crate) mod logic;
pub(crate) mod model;
pub(crate) mod s3_storage;

use async_trait::async_trait;
use std::path::Path;

use crate::errors::Result;
use model::{Artifact, RemoteObject};

pub use logic::BackupOrchestrator;

/// The database server being backed up.
#[async_trait]
pub trait DatabaseEngine: Send + Sync {
    /// Names of all databases currently present on the server.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Writes a consistent dump of `database` below `backup_root`.
    async fn dump(&self, database: &str, backup_root: &Path) -> Result<Artifact>;
}

/// Packs a dump into a single transferable archive.
pub trait Archiver: Send + Sync {
    fn archive(&self, dump: &Artifact) -> Result<Artifact>;
}

/// Durable blob storage for archives.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upload(&self, archive: &Artifact, key: &str) -> Result<RemoteObject>;

    /// Every object under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>>;

    async fn delete(&self, key: &str) -> Result<()>;
}
