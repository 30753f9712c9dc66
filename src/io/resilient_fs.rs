/// Resilient file system - retrying, atomic file operations
///
/// Every primitive runs through `execute_with_retry`:
/// 1. Run the operation
/// 2. On failure, classify it. Transient POSIX failures are retried locally
///    with exponential backoff
/// 3. Anything else goes to the shared `ErrorHandler`. Recovered data is
///    returned in place of the result, a bare success re-runs the operation,
///    and a failed recovery surfaces the original error
use super::atomic::{self, is_temp_file_name};
use super::{is_cross_device, is_retryable_code, space, IOError, IOResult};
use crate::error::{
    ErrorContext, ErrorFamily, ErrorHandler, ErrorKind, ExponentialBackoff, RecoveredData,
    ReportingError,
};
use crate::{FileSystemConfig, RawError};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;

/// Default age after which backups are removed
pub const DEFAULT_BACKUP_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Headroom required on top of the requested bytes
const SPACE_SAFETY_FACTOR: f64 = 1.1;

/// Conversion from a recovery artifact into an operation's output type
///
/// Types that cannot use any artifact keep the default, which makes the
/// retry loop re-run the operation instead.
pub trait FromRecovery: Sized {
    fn from_recovery(_data: RecoveredData) -> Option<Self> {
        None
    }
}

impl FromRecovery for () {}
impl FromRecovery for bool {}
impl FromRecovery for u64 {}
impl FromRecovery for String {}
impl FromRecovery for Vec<u8> {}
impl FromRecovery for std::fs::Metadata {}

impl FromRecovery for PathBuf {
    fn from_recovery(data: RecoveredData) -> Option<Self> {
        match data {
            RecoveredData::FallbackDirectory(dir) => Some(dir),
            _ => None,
        }
    }
}

pub struct ResilientFileSystem {
    config: FileSystemConfig,
    handler: Arc<ErrorHandler>,
    backoff: ExponentialBackoff,
}

impl ResilientFileSystem {
    pub fn new(config: FileSystemConfig, handler: Arc<ErrorHandler>) -> Self {
        let backoff = ExponentialBackoff::from_millis(config.base_delay_ms, config.max_delay_ms);
        Self {
            config,
            handler,
            backoff,
        }
    }

    pub fn config(&self) -> &FileSystemConfig {
        &self.config
    }

    pub fn handler(&self) -> &Arc<ErrorHandler> {
        &self.handler
    }

    /// Run `op` with local retries, handing persistent failures to the error handler
    pub async fn execute_with_retry<T, F, Fut>(&self, context: ErrorContext, mut op: F) -> IOResult<T>
    where
        T: FromRecovery,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::io::Result<T>>,
    {
        let mut attempt: u32 = 1;
        let mut recovery_rounds: u32 = 0;

        loop {
            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(
                            operation = %context.operation,
                            attempt = attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let classified = self
                .handler
                .classify(&RawError::from(&err), Some(context.clone()));

            if attempt < self.config.max_retries && Self::is_locally_retryable(&classified) {
                let delay = self.backoff.next_delay(attempt - 1);
                tracing::warn!(
                    operation = %context.operation,
                    path = ?context.file_path,
                    code = ?classified.code,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Transient file system error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let outcome = self.handler.handle_error(classified, None).await;
            if !outcome.success || recovery_rounds >= self.config.max_retries {
                return Err(IOError::operation(&context, err));
            }
            recovery_rounds += 1;

            if let Some(value) = outcome.recovered_data.and_then(T::from_recovery) {
                return Ok(value);
            }
            attempt += 1;
        }
    }

    fn is_locally_retryable(error: &ReportingError) -> bool {
        let kind_ok = error.kind.family() == ErrorFamily::FileIo || error.kind == ErrorKind::Unknown;
        kind_ok && is_retryable_code(error.code.as_deref())
    }

    /// Write a file, atomically when temp files are enabled
    pub async fn write_file(&self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> IOResult<()> {
        let path = path.as_ref();
        let content = content.as_ref();

        if let Some(parent) = parent_dir(path) {
            self.create_dir_all(parent).await?;
        }

        let context = ErrorContext::for_file("write_file", path);
        if self.config.enable_temp_files {
            let temp_dir = self.config.temp_directory.as_deref();
            self.execute_with_retry(context, || atomic::write_atomic(path, temp_dir, content))
                .await
        } else {
            self.execute_with_retry(context, || fs::write(path, content)).await
        }
    }

    pub async fn read_file(&self, path: impl AsRef<Path>) -> IOResult<Vec<u8>> {
        let path = path.as_ref();
        self.execute_with_retry(ErrorContext::for_file("read_file", path), || fs::read(path))
            .await
    }

    pub async fn read_to_string(&self, path: impl AsRef<Path>) -> IOResult<String> {
        let path = path.as_ref();
        self.execute_with_retry(ErrorContext::for_file("read_file", path), || {
            fs::read_to_string(path)
        })
        .await
    }

    /// Create a directory and its parents; returns the directory that was prepared
    pub async fn create_dir_all(&self, path: impl AsRef<Path>) -> IOResult<PathBuf> {
        let path = path.as_ref();
        self.execute_with_retry(ErrorContext::for_file("create_directory", path), || async move {
            fs::create_dir_all(path).await?;
            Ok(path.to_path_buf())
        })
        .await
    }

    /// Copy a file, creating the target's parent directory; returns bytes copied
    pub async fn copy_file(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> IOResult<u64> {
        let (from, to) = (from.as_ref(), to.as_ref());
        if let Some(parent) = parent_dir(to) {
            self.create_dir_all(parent).await?;
        }

        let context = ErrorContext::for_file("copy_file", from)
            .with_metadata("destination", to.display().to_string());
        self.execute_with_retry(context, || fs::copy(from, to)).await
    }

    /// Rename, falling back to copy + delete across devices
    pub async fn move_file(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> IOResult<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        if let Some(parent) = parent_dir(to) {
            self.create_dir_all(parent).await?;
        }

        let context = ErrorContext::for_file("move_file", from)
            .with_metadata("destination", to.display().to_string());
        self.execute_with_retry(context, || async move {
            match fs::rename(from, to).await {
                Ok(()) => Ok(()),
                Err(e) if is_cross_device(&e) => {
                    tracing::debug!(from = %from.display(), to = %to.display(), "Cross-device move");
                    fs::copy(from, to).await?;
                    fs::remove_file(from).await
                }
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Delete a file; `Ok(false)` if it did not exist
    pub async fn delete_file(&self, path: impl AsRef<Path>) -> IOResult<bool> {
        let path = path.as_ref();
        self.execute_with_retry(ErrorContext::for_file("delete_file", path), || async move {
            match fs::remove_file(path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
    }

    pub async fn stat(&self, path: impl AsRef<Path>) -> IOResult<std::fs::Metadata> {
        let path = path.as_ref();
        self.execute_with_retry(ErrorContext::for_file("stat", path), || fs::metadata(path))
            .await
    }

    /// Existence check, never retried
    pub async fn exists(&self, path: impl AsRef<Path>) -> bool {
        fs::metadata(path.as_ref()).await.is_ok()
    }

    /// Copy `path` into the backup directory; `None` if disabled, missing, or failed
    pub async fn create_backup(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let path = path.as_ref();
        if !self.config.enable_backup || !self.exists(path).await {
            return None;
        }

        let name = path.file_name()?.to_string_lossy();
        let backup = self
            .config
            .backup_directory
            .join(format!("{}.{}.backup", name, backup_timestamp()));

        match self.copy_file(path, &backup).await {
            Ok(bytes) => {
                tracing::info!(
                    source = %path.display(),
                    backup = %backup.display(),
                    bytes = bytes,
                    "Backup created"
                );
                Some(backup)
            }
            Err(e) => {
                tracing::warn!(source = %path.display(), error = %e, "Backup failed");
                None
            }
        }
    }

    /// Remove backups older than `max_age`; returns how many were deleted
    pub async fn cleanup_backups(&self, max_age: Duration) -> usize {
        let dir = &self.config.backup_directory;
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(dir = %dir.display(), error = %e, "Cannot list backups");
                }
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Backup listing interrupted");
                    break;
                }
            };

            let path = entry.path();
            if !entry.file_name().to_string_lossy().ends_with(".backup") {
                continue;
            }

            let age = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => now.duration_since(modified).unwrap_or(Duration::ZERO),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read backup age");
                    continue;
                }
            };

            if age >= max_age {
                match fs::remove_file(&path).await {
                    Ok(()) => {
                        tracing::debug!(path = %path.display(), "Old backup removed");
                        removed += 1;
                    }
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove backup"),
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed = removed, "Backup cleanup finished");
        }
        removed
    }

    /// Directory temp files are staged in for writes into `dir`
    pub fn temp_directory_for(&self, dir: &Path) -> PathBuf {
        self.config
            .temp_directory
            .clone()
            .unwrap_or_else(|| dir.to_path_buf())
    }

    /// Stray temp files (left by interrupted writes) in `dir`
    pub async fn find_temp_files(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let Ok(mut entries) = fs::read_dir(dir.as_ref()).await else {
            return found;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            if is_temp_file_name(&entry.file_name().to_string_lossy()) {
                found.push(entry.path());
            }
        }
        found.sort();
        found
    }

    /// Remove stray temp files in `dir`; returns the paths removed
    pub async fn cleanup_temp_files(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for path in self.find_temp_files(dir).await {
            match fs::remove_file(&path).await {
                Ok(()) => removed.push(path),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
            }
        }
        removed
    }

    /// True if `dir` has room for `required_bytes` plus 10%, or if free space is unknown
    pub async fn has_enough_space(&self, dir: impl AsRef<Path>, required_bytes: u64) -> bool {
        let dir = dir.as_ref().to_path_buf();
        let lookup = dir.clone();
        let available = tokio::task::spawn_blocking(move || space::available_space(&lookup))
            .await
            .ok()
            .flatten();

        match available {
            Some(available) => {
                let needed = required_bytes as f64 * SPACE_SAFETY_FACTOR;
                let enough = available as f64 >= needed;
                if !enough {
                    tracing::warn!(
                        dir = %dir.display(),
                        available = available,
                        required = required_bytes,
                        "Insufficient disk space"
                    );
                }
                enough
            }
            None => {
                tracing::debug!(dir = %dir.display(), "Free space unknown, assuming enough");
                true
            }
        }
    }

    /// Fail with `InsufficientSpace` unless `has_enough_space` holds
    pub async fn ensure_space(&self, dir: impl AsRef<Path>, required_bytes: u64) -> IOResult<()> {
        let dir = dir.as_ref();
        if self.has_enough_space(dir, required_bytes).await {
            Ok(())
        } else {
            Err(IOError::InsufficientSpace {
                path: dir.to_path_buf(),
                required: required_bytes,
            })
        }
    }
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// RFC 3339 timestamp with millisecond precision, filename-safe
fn backup_timestamp() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}
