#![allow(dead_code)]
//! Common test utilities for integration tests
//!
//! This module provides:
//! - A temp-dir harness wiring handler, file system and factory together
//! - Fast retry configurations so failure paths finish quickly
//! - Jest and coverage fixtures, clean and damaged

pub mod fixtures;

use resilient_reporter::{
    ErrorHandler, ErrorHandlingConfig, FileSystemConfig, GenerationConfig, ReportGeneratorFactory,
    ResilientFileSystem,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Handler config with millisecond retry delays
pub fn fast_handler_config() -> ErrorHandlingConfig {
    ErrorHandlingConfig {
        max_retries: 2,
        retry_delay_ms: 1,
        ..ErrorHandlingConfig::default()
    }
}

/// File system config with millisecond backoff and backups inside `dir`
pub fn fast_fs_config(dir: &TempDir) -> FileSystemConfig {
    FileSystemConfig {
        base_delay_ms: 1,
        max_delay_ms: 5,
        backup_directory: dir.path().join("backups"),
        ..FileSystemConfig::default()
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub handler: Arc<ErrorHandler>,
    pub fs: Arc<ResilientFileSystem>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_handler_config(fast_handler_config())
    }

    pub fn with_handler_config(config: ErrorHandlingConfig) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let handler = Arc::new(ErrorHandler::new(config));
        let fs = Arc::new(ResilientFileSystem::new(fast_fs_config(&dir), handler.clone()));
        Self { dir, handler, fs }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.path("reports")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.path("backups")
    }

    pub fn factory(&self) -> ReportGeneratorFactory {
        ReportGeneratorFactory::new(
            self.fs.clone(),
            GenerationConfig {
                max_concurrency: 2,
                ..GenerationConfig::default()
            },
        )
    }
}

/// Entries directly inside `dir`, sorted by name
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
