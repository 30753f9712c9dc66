// Tests for the resilient file system
//
// Tests cover: atomic writes, temp-file cleanup, retry exhaustion, move/copy/delete,
// backups and their cleanup, free-space checks.

use super::atomic::is_temp_file_name;
use super::resilient_fs::DEFAULT_BACKUP_MAX_AGE;
use super::*;
use crate::error::ErrorHandler;
use crate::{ErrorHandlingConfig, FileSystemConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fast_fs(root: &Path) -> ResilientFileSystem {
    let handler = ErrorHandler::new(ErrorHandlingConfig {
        retry_delay_ms: 1,
        max_retries: 2,
        ..ErrorHandlingConfig::default()
    });
    ResilientFileSystem::new(
        FileSystemConfig {
            base_delay_ms: 1,
            max_delay_ms: 5,
            backup_directory: root.join("backups"),
            ..FileSystemConfig::default()
        },
        Arc::new(handler),
    )
}

fn temp_files_in(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| is_temp_file_name(name))
                .collect()
        })
        .unwrap_or_default()
}

// ==================== WRITE / READ TESTS ====================

#[tokio::test]
async fn test_write_then_read() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    let path = dir.path().join("report.json");

    fs.write_file(&path, "{\"ok\":true}").await.unwrap();

    assert_eq!(fs.read_to_string(&path).await.unwrap(), "{\"ok\":true}");
    assert!(temp_files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_write_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    let path = dir.path().join("nested/deeper/report.md");

    fs.write_file(&path, b"# Report").await.unwrap();

    assert_eq!(fs.read_file(&path).await.unwrap(), b"# Report");
}

#[tokio::test]
async fn test_write_without_temp_files() {
    let dir = TempDir::new().unwrap();
    let handler = Arc::new(ErrorHandler::default());
    let fs = ResilientFileSystem::new(
        FileSystemConfig {
            enable_temp_files: false,
            ..FileSystemConfig::default()
        },
        handler,
    );
    let path = dir.path().join("plain.txt");

    fs.write_file(&path, b"plain").await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"plain");
}

#[tokio::test]
async fn test_write_through_separate_temp_directory() {
    let dir = TempDir::new().unwrap();
    let staging = dir.path().join("staging");
    let handler = Arc::new(ErrorHandler::default());
    let fs = ResilientFileSystem::new(
        FileSystemConfig {
            temp_directory: Some(staging.clone()),
            ..FileSystemConfig::default()
        },
        handler,
    );
    let path = dir.path().join("out/report.html");

    fs.write_file(&path, b"<html></html>").await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"<html></html>");
    assert!(temp_files_in(&staging).is_empty());
}

#[tokio::test]
async fn test_failed_write_leaves_no_temp_file() {
    let dir = TempDir::new().unwrap();
    let staging = dir.path().join("staging");
    let handler = Arc::new(ErrorHandler::new(ErrorHandlingConfig {
        retry_delay_ms: 1,
        max_retries: 1,
        ..ErrorHandlingConfig::default()
    }));
    let fs = ResilientFileSystem::new(
        FileSystemConfig {
            base_delay_ms: 1,
            max_delay_ms: 2,
            temp_directory: Some(staging.clone()),
            ..FileSystemConfig::default()
        },
        handler,
    );

    // Destination is a non-empty directory, so the final rename always fails
    let dest = dir.path().join("occupied");
    std::fs::create_dir_all(dest.join("child")).unwrap();

    let result = fs.write_file(&dest, b"data").await;

    assert!(matches!(result, Err(IOError::OperationFailed { .. })));
    assert!(dest.join("child").is_dir());
    assert!(temp_files_in(&staging).is_empty());
}

#[tokio::test]
async fn test_read_missing_file_exhausts_retries() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    let missing = dir.path().join("missing.json");

    let err = fs.read_file(&missing).await.unwrap_err();

    assert_eq!(err.kind(), Some(std::io::ErrorKind::NotFound));
    match &err {
        IOError::OperationFailed { operation, path, .. } => {
            assert_eq!(operation, "read_file");
            assert_eq!(path, &missing);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Every handler-level retry went into one bucket
    let stats = fs.handler().error_statistics();
    assert_eq!(stats.recovery_attempts, 2);
}

#[tokio::test]
async fn test_permission_failure_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    let calls = std::sync::atomic::AtomicU32::new(0);

    let ctx = crate::error::ErrorContext::for_file("write_file", dir.path().join("x"));
    let result: IOResult<()> = fs
        .execute_with_retry(ctx, || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(std::io::Error::from_raw_os_error(libc::EACCES)) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    let calls = std::sync::atomic::AtomicU32::new(0);

    let ctx = crate::error::ErrorContext::for_file("read_file", dir.path().join("x"));
    let result = fs
        .execute_with_retry(ctx, || {
            let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(std::io::Error::from_raw_os_error(libc::EBUSY))
                } else {
                    Ok(42u64)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    // Local retries never reach the handler
    assert_eq!(fs.handler().error_statistics().total_errors, 0);
}

// ==================== COPY / MOVE / DELETE TESTS ====================

#[tokio::test]
async fn test_copy_and_move() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    let src = dir.path().join("a.txt");
    std::fs::write(&src, b"abc").unwrap();

    let copied = fs.copy_file(&src, dir.path().join("copies/b.txt")).await.unwrap();
    assert_eq!(copied, 3);

    let moved = dir.path().join("moved/c.txt");
    fs.move_file(&src, &moved).await.unwrap();
    assert!(!src.exists());
    assert_eq!(std::fs::read(&moved).unwrap(), b"abc");
}

#[tokio::test]
async fn test_delete_file() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    let path = dir.path().join("gone.txt");
    std::fs::write(&path, b"x").unwrap();

    assert!(fs.delete_file(&path).await.unwrap());
    assert!(!fs.delete_file(&path).await.unwrap());
    assert!(!fs.exists(&path).await);
}

#[tokio::test]
async fn test_stat_reports_size() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    let path = dir.path().join("sized.txt");
    std::fs::write(&path, b"12345").unwrap();

    assert_eq!(fs.stat(&path).await.unwrap().len(), 5);
}

// ==================== BACKUP TESTS ====================

#[tokio::test]
async fn test_backup_of_existing_file() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    let path = dir.path().join("report.html");
    std::fs::write(&path, b"old report").unwrap();

    let backup = fs.create_backup(&path).await.unwrap();

    assert!(backup.starts_with(dir.path().join("backups")));
    let name = backup.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("report.html."));
    assert!(name.ends_with(".backup"));
    assert_eq!(std::fs::read(&backup).unwrap(), b"old report");
}

#[tokio::test]
async fn test_backup_skipped_when_missing_or_disabled() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    assert!(fs.create_backup(dir.path().join("nope")).await.is_none());

    let handler = Arc::new(ErrorHandler::default());
    let disabled = ResilientFileSystem::new(
        FileSystemConfig {
            enable_backup: false,
            backup_directory: dir.path().join("backups"),
            ..FileSystemConfig::default()
        },
        handler,
    );
    let path = dir.path().join("exists.txt");
    std::fs::write(&path, b"x").unwrap();
    assert!(disabled.create_backup(&path).await.is_none());
}

#[tokio::test]
async fn test_cleanup_backups_by_age() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    let path = dir.path().join("report.md");
    std::fs::write(&path, b"# old").unwrap();
    fs.create_backup(&path).await.unwrap();

    // Unrelated files in the backup directory are left alone
    std::fs::write(dir.path().join("backups/notes.txt"), b"keep").unwrap();

    assert_eq!(fs.cleanup_backups(Duration::from_secs(3600)).await, 0);
    assert_eq!(fs.cleanup_backups(Duration::ZERO).await, 1);
    assert!(dir.path().join("backups/notes.txt").exists());
}

#[tokio::test]
async fn test_cleanup_backups_without_directory() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    assert_eq!(fs.cleanup_backups(DEFAULT_BACKUP_MAX_AGE).await, 0);
}

// ==================== TEMP FILE / SPACE TESTS ====================

#[tokio::test]
async fn test_cleanup_stray_temp_files() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());
    std::fs::write(dir.path().join("report.html.1700000000000.aB3dE9.tmp"), b"x").unwrap();
    std::fs::write(dir.path().join("user.tmp"), b"keep").unwrap();

    let found = fs.find_temp_files(dir.path()).await;
    assert_eq!(found.len(), 1);

    let removed = fs.cleanup_temp_files(dir.path()).await;
    assert_eq!(removed, found);
    assert!(dir.path().join("user.tmp").exists());
}

#[tokio::test]
async fn test_has_enough_space() {
    let dir = TempDir::new().unwrap();
    let fs = fast_fs(dir.path());

    assert!(fs.has_enough_space(dir.path(), 0).await);
    assert!(fs.has_enough_space(dir.path().join("not/yet/created"), 1024).await);

    #[cfg(unix)]
    {
        assert!(!fs.has_enough_space(dir.path(), u64::MAX / 2).await);
        assert!(matches!(
            fs.ensure_space(dir.path(), u64::MAX / 2).await,
            Err(IOError::InsufficientSpace { .. })
        ));
    }
}

// ==================== ERROR CONVERSION TESTS ====================

#[test]
fn test_posix_code_from_raw_os_error() {
    let err = std::io::Error::from_raw_os_error(libc::ENOENT);
    assert_eq!(posix_code(&err).as_deref(), Some("ENOENT"));

    let err = std::io::Error::from_raw_os_error(libc::EXDEV);
    assert!(is_cross_device(&err));
}

#[test]
fn test_posix_code_from_kind() {
    let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
    assert_eq!(posix_code(&err).as_deref(), Some("EACCES"));

    let err = std::io::Error::new(std::io::ErrorKind::Other, "other");
    assert_eq!(posix_code(&err), None);
}

#[test]
fn test_insufficient_space_converts_to_enospc() {
    let err = IOError::InsufficientSpace {
        path: "/out".into(),
        required: 10,
    };
    let raw = crate::RawError::from(&err);
    assert!(raw.has_code("ENOSPC"));
}
