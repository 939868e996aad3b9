// mysql-backup-runner/src/retention/remote.rs
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::time::Duration;

use crate::backup::RemoteStore;
use crate::backup::model::RetentionWindow;
use crate::errors::{BackupError, Result};
use crate::utils::with_timeout;

/// Deletes objects under `prefix` whose last-modified time at `now` exceeds `window`.
///
/// A failed listing is returned as an error (hard). A failed delete is logged and
/// the sweep moves on. Every store call is bounded by `call_timeout`.
/// Returns the number of objects deleted.
pub async fn sweep_remote(
    store: &dyn RemoteStore,
    prefix: &str,
    window: RetentionWindow,
    now: DateTime<Utc>,
    call_timeout: Duration,
) -> Result<usize> {
    let objects = with_timeout(call_timeout, store.list(prefix), |message| {
        BackupError::RemoteListError {
            prefix: prefix.to_string(),
            message,
        }
    })
    .await?;
    debug!("Remote sweep examining {} objects under {}", objects.len(), prefix);

    let mut deleted = 0;
    for object in objects {
        let Some(last_modified) = object.last_modified else {
            warn!("Remote object {} has no last-modified time, skipping", object.key);
            continue;
        };
        if !window.is_expired(last_modified, now) {
            continue;
        }

        let outcome = with_timeout(call_timeout, store.delete(&object.key), |message| {
            BackupError::RemoteDeleteError {
                key: object.key.clone(),
                message,
            }
        })
        .await;
        match outcome {
            Ok(()) => {
                debug!("Deleted expired remote object {}", object.key);
                deleted += 1;
            }
            Err(e) => warn!("{}", e),
        }
    }

    info!(
        "Remote sweep of {} deleted {} objects older than {} days",
        prefix,
        deleted,
        window.max_age().num_days()
    );
    Ok(deleted)
}
