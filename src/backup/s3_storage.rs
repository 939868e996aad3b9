// mysql-backup-runner/src/backup/s3_storage.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use log::{debug, info};
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;

use super::RemoteStore;
use super::model::{Artifact, RemoteObject};
use crate::config::SpacesConfig;
use crate::errors::{BackupError, Result};

/// S3-compatible object storage (AWS, DigitalOcean Spaces, MinIO, ...).
pub struct S3RemoteStore {
    client: s3::Client,
    bucket: String,
}

impl S3RemoteStore {
    pub async fn connect(spaces_config: &SpacesConfig) -> Self {
        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(&spaces_config.endpoint_url)
            .region(Region::new(spaces_config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &spaces_config.access_key_id,
                &spaces_config.secret_access_key,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ))
            .load()
            .await;

        S3RemoteStore {
            client: s3::Client::new(&sdk_config),
            bucket: spaces_config.bucket_name.clone(),
        }
    }
}

fn to_chrono(timestamp: &s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait]
impl RemoteStore for S3RemoteStore {
    async fn upload(&self, archive: &Artifact, key: &str) -> Result<RemoteObject> {
        let fail = |message: String| BackupError::UploadFailed {
            key: key.to_string(),
            message,
        };

        let size = tokio::fs::metadata(&archive.path)
            .await
            .map_err(|e| fail(format!("cannot stat {}: {}", archive.path.display(), e)))?
            .len();
        let body = ByteStream::from_path(&archive.path)
            .await
            .map_err(|e| fail(format!("failed to read {}: {}", archive.path.display(), e)))?;

        info!(
            "[{}] Uploading {} ({} bytes) to s3://{}/{}",
            archive.database,
            archive.path.display(),
            size,
            self.bucket,
            key
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| fail(DisplayErrorContext(&e).to_string()))?;

        Ok(RemoteObject {
            key: key.to_string(),
            last_modified: Some(Utc::now()),
            size,
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| BackupError::RemoteListError {
                    prefix: prefix.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                })?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                objects.push(RemoteObject {
                    key: key.to_string(),
                    last_modified: object.last_modified().and_then(to_chrono),
                    size: object.size().unwrap_or(0).max(0) as u64,
                });
            }

            match (page.is_truncated(), page.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!("Listed {} objects under s3://{}/{}", objects.len(), self.bucket, prefix);
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| BackupError::RemoteDeleteError {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_chrono_keeps_seconds_and_nanos() {
        let ts = s3::primitives::DateTime::from_secs_and_nanos(1_700_000_000, 250_000_000);
        let converted = to_chrono(&ts).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
        assert_eq!(converted.timestamp_subsec_nanos(), 250_000_000);
    }
}
