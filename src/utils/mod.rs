use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;
use which::which;

/// Finds an executable in the system PATH.
pub fn find_executable(name: &str) -> Result<PathBuf, String> {
    which(name).map_err(|e| {
        format!(
            "{} executable not found in PATH ({}). Is the MySQL client installed?",
            name, e
        )
    })
}

/// Runs `operation`, turning an elapsed deadline into the caller's own error kind.
pub async fn with_timeout<T, E, F>(
    limit: Duration,
    operation: F,
    on_timeout: impl FnOnce(String) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!("operation timed out after {:?}", limit))),
    }
}
