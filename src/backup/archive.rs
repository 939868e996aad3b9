// mysql-backup-runner/src/backup/archive.rs
use flate2::Compression;
use flate2::write::GzEncoder;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Builder;

use super::Archiver;
use super::model::{Artifact, ArtifactKind};
use crate::errors::{BackupError, Result};

/// Writes `<dump dir>.tar.gz` next to the dump's directory.
pub struct TarGzArchiver;

/// Archive path for a dump: the dump's parent directory name plus `.tar.gz`,
/// placed in the backup root. Falls back to the dump's file stem.
pub fn archive_path_for(dump_path: &Path) -> Option<PathBuf> {
    let dump_dir = dump_path.parent()?;
    let root = dump_dir.parent()?;
    let stem = dump_dir
        .file_name()
        .and_then(|n| n.to_str())
        .or_else(|| dump_path.file_stem().and_then(|n| n.to_str()))?;
    Some(root.join(format!("{}.tar.gz", stem)))
}

/// Creates a GZipped TAR archive holding exactly one entry: `source_file`
/// stored under its base name.
pub fn create_tar_gz_archive(
    source_file: &Path,
    archive_dest_path: &Path,
) -> std::io::Result<PathBuf> {
    let entry_name = source_file.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", source_file.display()),
        )
    })?;

    let archive_file = File::create(archive_dest_path)?;
    let enc = GzEncoder::new(archive_file, Compression::default());
    let mut tar_builder = Builder::new(enc);
    tar_builder.append_path_with_name(source_file, entry_name)?;

    let encoder = tar_builder.into_inner()?;
    let file = encoder.finish()?;
    file.sync_all()?;
    Ok(archive_dest_path.to_path_buf())
}

impl Archiver for TarGzArchiver {
    fn archive(&self, dump: &Artifact) -> Result<Artifact> {
        let fail = |message: String| BackupError::ArchiveFailed {
            database: dump.database.clone(),
            message,
        };

        if dump.kind != ArtifactKind::Dump {
            return Err(fail(format!("{} is not a dump", dump.path.display())));
        }
        let metadata = std::fs::metadata(&dump.path)
            .map_err(|e| fail(format!("cannot read dump {}: {}", dump.path.display(), e)))?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(fail(format!("dump {} is missing or empty", dump.path.display())));
        }

        let archive_dest_path = archive_path_for(&dump.path).ok_or_else(|| {
            fail(format!("cannot derive archive name from {}", dump.path.display()))
        })?;

        info!(
            "[{}] Compressing {} to {}",
            dump.database,
            dump.path.display(),
            archive_dest_path.display()
        );

        if let Err(e) = create_tar_gz_archive(&dump.path, &archive_dest_path) {
            // A half-written archive must not be mistaken for a good one.
            let _ = std::fs::remove_file(&archive_dest_path);
            return Err(fail(format!(
                "failed to write {}: {}",
                archive_dest_path.display(),
                e
            )));
        }

        Ok(Artifact::new(archive_dest_path, &dump.database, ArtifactKind::Archive))
    }
}
