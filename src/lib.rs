// Allow complex types where needed for comprehensive error handling and configuration
#![allow(clippy::type_complexity)]

pub mod config;
pub mod error;
pub mod io;
pub mod recovery;
pub mod report;
pub mod ui;

// Re-export the main entry points for convenience
pub use error::{ErrorClassifier, ErrorContext, ErrorHandler, ReportingError};
pub use io::ResilientFileSystem;
pub use recovery::{MalformedDataRecovery, TestResultRecovery};
pub use report::{GenerationOptions, GenerationResult, ReportGeneratorFactory};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A raw failure as observed at an I/O or collaborator boundary, before
/// classification.
///
/// `code` carries the POSIX-style error code (`ENOENT`, `EACCES`, ...) when one
/// is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawError {
    pub name: String,
    pub message: String,
    pub code: Option<String>,
    pub stack: Option<String>,
}

impl RawError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            code: None,
            stack: None,
        }
    }

    /// Plain error with the generic `Error` name
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Check whether the error carries the given POSIX code
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

impl fmt::Display for RawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} [{}]: {}", self.name, code, self.message),
            None => write!(f, "{}: {}", self.name, self.message),
        }
    }
}

impl From<&std::io::Error> for RawError {
    fn from(err: &std::io::Error) -> Self {
        let name = match err.kind() {
            std::io::ErrorKind::TimedOut => "TimeoutError",
            std::io::ErrorKind::OutOfMemory => "RangeError",
            _ => "Error",
        };
        let mut raw = RawError::new(name, err.to_string());
        raw.code = io::posix_code(err);
        raw
    }
}

impl From<std::io::Error> for RawError {
    fn from(err: std::io::Error) -> Self {
        RawError::from(&err)
    }
}

impl From<&anyhow::Error> for RawError {
    fn from(err: &anyhow::Error) -> Self {
        // Surface the first io::Error in the chain so the POSIX code survives
        let code = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<std::io::Error>())
            .and_then(io::posix_code);
        let mut raw = RawError::msg(format!("{:#}", err));
        raw.code = code;
        raw
    }
}

impl From<anyhow::Error> for RawError {
    fn from(err: anyhow::Error) -> Self {
        RawError::from(&err)
    }
}

impl From<serde_json::Error> for RawError {
    fn from(err: serde_json::Error) -> Self {
        RawError::new("SyntaxError", err.to_string())
    }
}

/// Output formats the report factory knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Html,
    Markdown,
    Json,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 3] = [ReportFormat::Html, ReportFormat::Markdown, ReportFormat::Json];

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }

    /// Scheduling priority for parallel generation, higher starts first.
    /// Cheapest formats go first.
    pub fn priority(&self) -> u8 {
        match self {
            ReportFormat::Json => 3,
            ReportFormat::Markdown => 2,
            ReportFormat::Html => 1,
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Html => write!(f, "html"),
            ReportFormat::Markdown => write!(f, "markdown"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(ReportFormat::Html),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format: {}", other)),
        }
    }
}

/// Minimum level the error handler emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandlingConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub enable_fallbacks: bool,
    pub enable_partial_reports: bool,
    pub log_level: LogLevel,
    pub enable_detailed_logging: bool,
    pub enable_stack_traces: bool,
    pub enable_actionable_guidance: bool,
    pub fail_on_critical_errors: bool,
    /// Deadline for a single generator invocation, 0 disables it
    pub timeout_ms: u64,
    /// Oldest entries are evicted past this many errors
    pub max_history: usize,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            enable_fallbacks: true,
            enable_partial_reports: true,
            log_level: LogLevel::Info,
            enable_detailed_logging: false,
            enable_stack_traces: false,
            enable_actionable_guidance: true,
            fail_on_critical_errors: true,
            timeout_ms: 30_000,
            max_history: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSystemConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub enable_backup: bool,
    pub backup_directory: PathBuf,
    pub enable_temp_files: bool,
    /// `None` stages temp files next to their destination
    pub temp_directory: Option<PathBuf>,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            enable_backup: true,
            backup_directory: PathBuf::from(".test-reports-backup"),
            enable_temp_files: true,
            temp_directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub enable_partial_recovery: bool,
    pub enable_data_sanitization: bool,
    pub enable_schema_validation: bool,
    pub max_recovery_attempts: u32,
    pub fallback_to_minimal_data: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enable_partial_recovery: true,
            enable_data_sanitization: true,
            enable_schema_validation: true,
            max_recovery_attempts: 5,
            fallback_to_minimal_data: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_concurrency: usize,
    pub cleanup_temp_files: bool,
    pub file_stem: String,
    pub title: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: num_cpus::get().max(1),
            cleanup_temp_files: true,
            file_stem: "test-report".to_string(),
            title: "Test Report".to_string(),
        }
    }
}
