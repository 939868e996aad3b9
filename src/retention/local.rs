// mysql-backup-runner/src/retention/local.rs
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::path::Path;
use walkdir::WalkDir;

use crate::backup::model::RetentionWindow;
use crate::errors::BackupError;

/// Deletes every file under `root` whose age at `now` exceeds `window`.
///
/// Never fails: unreadable entries and failed deletions are logged and skipped.
/// Directories left empty afterwards are removed, `root` itself is kept.
/// Returns the number of files deleted.
pub fn sweep_local(root: &Path, window: RetentionWindow, now: DateTime<Utc>) -> usize {
    sweep_local_with(root, window, now, |path| std::fs::remove_file(path))
}

/// Same as [`sweep_local`], with file removal done by `remove`.
pub fn sweep_local_with<F>(
    root: &Path,
    window: RetentionWindow,
    now: DateTime<Utc>,
    remove: F,
) -> usize
where
    F: Fn(&Path) -> std::io::Result<()>,
{
    if !root.is_dir() {
        warn!("Local sweep skipped: {} is not a directory", root.display());
        return 0;
    }

    let mut deleted = 0;
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Local sweep could not read an entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        // Artifacts are written once, so the modification time is their creation time.
        let written_at = match entry
            .metadata()
            .map_err(std::io::Error::from)
            .and_then(|m| m.modified())
        {
            Ok(time) => DateTime::<Utc>::from(time),
            Err(e) => {
                warn!("Local sweep could not stat {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !window.is_expired(written_at, now) {
            continue;
        }

        match remove(entry.path()) {
            Ok(()) => {
                debug!("Deleted expired local file {}", entry.path().display());
                deleted += 1;
            }
            Err(source) => {
                let err = BackupError::LocalDeleteError {
                    path: entry.path().to_path_buf(),
                    source,
                };
                warn!("{}", err);
            }
        }
    }

    remove_empty_dirs(root);
    info!(
        "Local sweep of {} deleted {} files older than {} days",
        root.display(),
        deleted,
        window.max_age().num_days()
    );
    deleted
}

fn remove_empty_dirs(root: &Path) {
    // contents_first yields children before their parent directory.
    for entry in WalkDir::new(root).min_depth(1).contents_first(true).into_iter().flatten() {
        if entry.file_type().is_dir() {
            // Fails harmlessly for non-empty directories.
            if std::fs::remove_dir(entry.path()).is_ok() {
                debug!("Removed empty directory {}", entry.path().display());
            }
        }
    }
}
