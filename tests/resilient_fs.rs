/// Integration tests for the resilient file system
///
/// Exercises atomic writes, backups, temp-file housekeeping and the error
/// handler hand-off against a real temp directory.

mod common;

use common::{list_dir, Harness};
use resilient_reporter::error::ErrorKind;
use resilient_reporter::io::atomic::temp_file_name;
use std::time::Duration;

#[tokio::test]
async fn test_write_creates_parents_and_round_trips() {
    let h = Harness::new();
    let path = h.path("deep/nested/dir/report.json");

    h.fs.write_file(&path, r#"{"ok":true}"#).await.unwrap();

    assert_eq!(h.fs.read_to_string(&path).await.unwrap(), r#"{"ok":true}"#);
    assert_eq!(list_dir(path.parent().unwrap()), vec!["report.json"]);
}

#[tokio::test]
async fn test_backup_holds_content_from_before_overwrite() {
    let h = Harness::new();
    let path = h.path("report.md");
    h.fs.write_file(&path, "# First").await.unwrap();

    let backup = h.fs.create_backup(&path).await.unwrap();
    h.fs.write_file(&path, "# Second").await.unwrap();

    assert!(backup.starts_with(h.backups_dir()));
    assert_eq!(std::fs::read_to_string(&backup).unwrap(), "# First");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Second");
}

#[tokio::test]
async fn test_backup_skips_missing_files() {
    let h = Harness::new();
    assert!(h.fs.create_backup(h.path("never-written.html")).await.is_none());
    assert!(!h.backups_dir().exists());
}

#[tokio::test]
async fn test_cleanup_backups_respects_age() {
    let h = Harness::new();
    let path = h.path("report.html");
    h.fs.write_file(&path, "<html></html>").await.unwrap();
    h.fs.create_backup(&path).await.unwrap();

    assert_eq!(h.fs.cleanup_backups(Duration::from_secs(3600)).await, 0);
    assert_eq!(h.fs.cleanup_backups(Duration::ZERO).await, 1);
    assert!(list_dir(&h.backups_dir()).is_empty());
}

#[tokio::test]
async fn test_stray_temp_files_are_found_and_removed() {
    let h = Harness::new();
    let dir = h.path("out");
    let stray = dir.join(temp_file_name(&dir.join("report.html")));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(&stray, "half a report").unwrap();
    std::fs::write(dir.join("report.html.notes"), "keep me").unwrap();

    assert_eq!(h.fs.find_temp_files(&dir).await, vec![stray.clone()]);
    assert_eq!(h.fs.cleanup_temp_files(&dir).await, vec![stray.clone()]);
    assert!(!stray.exists());
    assert_eq!(list_dir(&dir), vec!["report.html.notes"]);
}

#[tokio::test]
async fn test_copy_move_and_delete() {
    let h = Harness::new();
    let original = h.path("a.txt");
    h.fs.write_file(&original, "payload").await.unwrap();

    let copied = h.path("copies/b.txt");
    assert_eq!(h.fs.copy_file(&original, &copied).await.unwrap(), 7);

    let moved = h.path("moved/c.txt");
    h.fs.move_file(&copied, &moved).await.unwrap();
    assert!(!copied.exists());
    assert_eq!(std::fs::read_to_string(&moved).unwrap(), "payload");

    assert!(h.fs.delete_file(&moved).await.unwrap());
    assert!(!h.fs.delete_file(&moved).await.unwrap());
}

#[tokio::test]
async fn test_missing_file_read_gives_up_and_is_recorded() {
    let h = Harness::new();
    let missing = h.path("missing.json");

    let err = h.fs.read_file(&missing).await.unwrap_err();

    assert_eq!(err.kind(), Some(std::io::ErrorKind::NotFound));
    assert!(err.to_string().contains("missing.json"));

    let stats = h.handler.error_statistics();
    assert!(stats.total_errors >= 1);
    assert!(stats.by_type.contains_key(&ErrorKind::FileSystem));
}

#[tokio::test]
async fn test_space_check_on_real_directory() {
    let h = Harness::new();

    assert!(h.fs.has_enough_space(h.dir.path(), 1).await);
    assert!(h.fs.ensure_space(h.dir.path(), 1).await.is_ok());
    assert!(!h.fs.has_enough_space(h.dir.path(), u64::MAX / 2).await);
    assert!(h.fs.ensure_space(h.dir.path(), u64::MAX / 2).await.is_err());
}
