/// Report generation
///
/// Generators render `AggregatedData` into a format-specific string. The
/// factory owns the rest: output directory preparation, atomic writes through
/// `ResilientFileSystem`, structural validation, progress events, and routing
/// generator failures through the `ErrorHandler`.
///
/// ```text
///   AggregatedData ──► ReportGenerator::generate_report ──► content
///                                                             │
///        validate ◄── read back ◄── write_file (atomic) ◄─────┘
/// ```
pub mod basic;
pub mod data;
pub mod factory;
pub mod json;
pub mod pool;
pub mod progress;
pub mod validation;


pub use basic::{BasicHtmlGenerator, BasicMarkdownGenerator};
pub use data::{AggregatedData, SuiteStatus, SuiteSummary, TestSummary};
pub use factory::{GenerationFailure, GenerationOptions, GenerationResult, ReportGeneratorFactory};
pub use json::JsonGenerator;
pub use pool::{PoolTask, TaskError, TaskPool};
pub use progress::{ChannelObserver, ProgressEvent, ProgressObserver, ProgressStage};
pub use validation::{validate_report, ValidationError};

use crate::io::IOError;
use crate::ReportFormat;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-run settings handed to every generator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportConfig {
    pub title: String,
    pub output_directory: PathBuf,
    pub file_stem: String,
}

impl ReportConfig {
    pub fn new(title: impl Into<String>, output_directory: impl AsRef<Path>) -> Self {
        Self {
            title: title.into(),
            output_directory: output_directory.as_ref().to_path_buf(),
            file_stem: "test-report".to_string(),
        }
    }

    pub fn with_file_stem(mut self, stem: impl Into<String>) -> Self {
        self.file_stem = stem.into();
        self
    }

    /// `<output_directory>/<file_stem>.<ext>`
    pub fn file_path(&self, format: ReportFormat) -> PathBuf {
        self.output_directory
            .join(format!("{}.{}", self.file_stem, format.extension()))
    }
}

/// Renders one report format
///
/// Implementations are synchronous; the factory runs them on the blocking
/// pool under the configured deadline.
#[cfg_attr(test, mockall::automock)]
pub trait ReportGenerator: Send + Sync {
    fn format(&self) -> ReportFormat;

    fn generate_report(&self, data: &AggregatedData, config: &ReportConfig) -> anyhow::Result<String>;
}

/// Outcome for one written report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub format: ReportFormat,
    pub success: bool,
    pub file_path: PathBuf,
    pub size: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub generation_time: Duration,
    pub error: Option<String>,
    pub fallback_used: bool,
}

pub(crate) fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Errors that stop `generate_reports` before any format runs
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("no report formats requested")]
    NoFormats,

    #[error("output directory is empty")]
    MissingOutputDirectory,

    #[error("no generator registered for format {0}")]
    UnregisteredFormat(ReportFormat),

    #[error("output directory {} is not writable: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: IOError,
    },
}
