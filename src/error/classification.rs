/// Error classification system for recovery strategy selection
///
/// This module turns raw failures (I/O errors, collaborator errors, parse
/// failures) into structured `ReportingError`s. The rule table is evaluated in
/// a fixed order, so the same input always yields the same kind, severity and
/// recovery strategy.
use super::retry::ExponentialBackoff;
use crate::RawError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Base delay used by `ErrorClassifier::retry_delay`
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(1000);

/// Upper bound for any computed retry delay
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(30_000);

/// Failure taxonomy for the reporting pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    // Parsing
    TestResultParsing,
    MalformedTestData,

    // Report generation
    TemplateRendering,
    TemplateNotFound,
    ReportGeneration,

    // File / IO
    FileSystem,
    OutputDirectory,
    Permission,
    DiskSpace,

    // Configuration
    Configuration,
    ConfigurationNotFound,
    InvalidFormat,

    // Dependency / environment
    Dependency,
    MissingDependency,
    Environment,

    // Network
    Network,
    ExternalService,

    // Performance
    Memory,
    Timeout,
    ResourceExhaustion,

    // Catch-all
    Unknown,
    Internal,
}

/// Coarse grouping of error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorFamily {
    Parsing,
    ReportGeneration,
    FileIo,
    Configuration,
    Environment,
    Network,
    Performance,
    Other,
}

impl ErrorKind {
    pub fn family(&self) -> ErrorFamily {
        match self {
            ErrorKind::TestResultParsing | ErrorKind::MalformedTestData => ErrorFamily::Parsing,
            ErrorKind::TemplateRendering
            | ErrorKind::TemplateNotFound
            | ErrorKind::ReportGeneration => ErrorFamily::ReportGeneration,
            ErrorKind::FileSystem
            | ErrorKind::OutputDirectory
            | ErrorKind::Permission
            | ErrorKind::DiskSpace => ErrorFamily::FileIo,
            ErrorKind::Configuration
            | ErrorKind::ConfigurationNotFound
            | ErrorKind::InvalidFormat => ErrorFamily::Configuration,
            ErrorKind::Dependency | ErrorKind::MissingDependency | ErrorKind::Environment => {
                ErrorFamily::Environment
            }
            ErrorKind::Network | ErrorKind::ExternalService => ErrorFamily::Network,
            ErrorKind::Memory | ErrorKind::Timeout | ErrorKind::ResourceExhaustion => {
                ErrorFamily::Performance
            }
            ErrorKind::Unknown | ErrorKind::Internal => ErrorFamily::Other,
        }
    }

    /// Kinds that tend to clear up on their own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::FileSystem | ErrorKind::ExternalService
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::TestResultParsing => "TestResultParsingError",
            ErrorKind::MalformedTestData => "MalformedTestDataError",
            ErrorKind::TemplateRendering => "TemplateRenderingError",
            ErrorKind::TemplateNotFound => "TemplateNotFoundError",
            ErrorKind::ReportGeneration => "ReportGenerationError",
            ErrorKind::FileSystem => "FileSystemError",
            ErrorKind::OutputDirectory => "OutputDirectoryError",
            ErrorKind::Permission => "PermissionError",
            ErrorKind::DiskSpace => "DiskSpaceError",
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::ConfigurationNotFound => "ConfigurationNotFoundError",
            ErrorKind::InvalidFormat => "InvalidFormatError",
            ErrorKind::Dependency => "DependencyError",
            ErrorKind::MissingDependency => "MissingDependencyError",
            ErrorKind::Environment => "EnvironmentError",
            ErrorKind::Network => "NetworkError",
            ErrorKind::ExternalService => "ExternalServiceError",
            ErrorKind::Memory => "MemoryError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::ResourceExhaustion => "ResourceExhaustionError",
            ErrorKind::Unknown => "UnknownError",
            ErrorKind::Internal => "InternalError",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// How the handler should respond to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecoveryStrategy {
    Retry,
    Fallback,
    Partial,
    Skip,
    Fail,
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryStrategy::Retry => write!(f, "retry"),
            RecoveryStrategy::Fallback => write!(f, "fallback"),
            RecoveryStrategy::Partial => write!(f, "partial"),
            RecoveryStrategy::Skip => write!(f, "skip"),
            RecoveryStrategy::Fail => write!(f, "fail"),
        }
    }
}

/// Where an error happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Operation name (e.g., "write_file", "generate_report")
    pub operation: String,

    /// Component that observed the failure (e.g., "ResilientFileSystem")
    pub component: String,

    pub file_path: Option<PathBuf>,
    pub test_suite: Option<String>,
    pub report_format: Option<crate::ReportFormat>,
    pub config_section: Option<String>,

    /// Anything else worth keeping
    pub metadata: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            component: component.into(),
            file_path: None,
            test_suite: None,
            report_format: None,
            config_section: None,
            metadata: HashMap::new(),
        }
    }

    /// Context for a file system operation on a path
    pub fn for_file(operation: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(operation, "ResilientFileSystem").with_file_path(path)
    }

    /// Context for one format's generator; each format gets its own retry bucket
    pub fn for_format(operation: impl Into<String>, format: crate::ReportFormat) -> Self {
        let mut ctx = Self::new(operation, format!("{}-generator", format));
        ctx.report_format = Some(format);
        ctx
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_test_suite(mut self, suite: impl Into<String>) -> Self {
        self.test_suite = Some(suite.into());
        self
    }

    pub fn with_report_format(mut self, format: crate::ReportFormat) -> Self {
        self.report_format = Some(format);
        self
    }

    pub fn with_config_section(mut self, section: impl Into<String>) -> Self {
        self.config_section = Some(section.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Classified error with recovery information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,

    /// Free-form payload (e.g. `partialData` for parsing errors)
    pub details: serde_json::Value,

    pub timestamp: DateTime<Utc>,
    pub recoverable: bool,
    pub recovery_strategy: RecoveryStrategy,
    pub context: Option<ErrorContext>,
    pub actionable_guidance: Vec<String>,
    pub retry_count: u32,
    pub max_retries: u32,

    /// POSIX code of the underlying failure, if any
    pub code: Option<String>,
    pub stack: Option<String>,
}

impl ReportingError {
    /// Build an error directly, bypassing the rule table
    pub fn new(
        kind: ErrorKind,
        severity: Severity,
        strategy: RecoveryStrategy,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            details: serde_json::Value::Null,
            timestamp: Utc::now(),
            recoverable: !matches!(strategy, RecoveryStrategy::Fail) && severity != Severity::Critical,
            recovery_strategy: strategy,
            context: None,
            actionable_guidance: Vec::new(),
            retry_count: 0,
            max_retries: 3,
            code: None,
            stack: None,
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.actionable_guidance.push(guidance.into());
        self
    }

    /// Key used to track retry attempts: `{type}-{operation}-{component}`
    pub fn bucket_key(&self) -> String {
        let (operation, component) = match &self.context {
            Some(ctx) => (ctx.operation.as_str(), ctx.component.as_str()),
            None => ("unknown", "unknown"),
        };
        format!("{}-{}-{}", self.kind, operation, component)
    }

    pub fn can_retry(&self) -> bool {
        self.recoverable && self.retry_count < self.max_retries
    }

    pub fn remaining_retries(&self) -> u32 {
        self.max_retries.saturating_sub(self.retry_count)
    }
}

impl fmt::Display for ReportingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(
                f,
                "{} ({}) in {}/{}: {}",
                self.kind, self.severity, ctx.component, ctx.operation, self.message
            ),
            None => write!(f, "{} ({}): {}", self.kind, self.severity, self.message),
        }
    }
}

/// One row of the rule table
struct Rule {
    kind: ErrorKind,
    severity: Severity,
    recoverable: bool,
    strategy: RecoveryStrategy,
    guidance: &'static [&'static str],
}

/// Error classifier - deterministic, stateless mapping from raw failures
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    max_retries: u32,
    backoff: ExponentialBackoff,
}

impl ErrorClassifier {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: ExponentialBackoff::new(DEFAULT_RETRY_BASE, MAX_RETRY_DELAY),
        }
    }

    /// Use a different backoff base (e.g. `retry_delay_ms` from config)
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.backoff = ExponentialBackoff::new(base, MAX_RETRY_DELAY);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Classify a raw error into a `ReportingError`
    pub fn classify(&self, error: &RawError, context: Option<ErrorContext>) -> ReportingError {
        let rule = Self::match_rule(error);

        ReportingError {
            kind: rule.kind,
            severity: rule.severity,
            message: error.message.clone(),
            details: serde_json::json!({ "name": error.name }),
            timestamp: Utc::now(),
            recoverable: rule.recoverable,
            recovery_strategy: rule.strategy,
            context,
            actionable_guidance: rule.guidance.iter().map(|s| s.to_string()).collect(),
            retry_count: 0,
            max_retries: self.max_retries,
            code: error.code.clone(),
            stack: error.stack.clone(),
        }
    }

    fn match_rule(error: &RawError) -> Rule {
        let message = error.message.to_lowercase();
        let name = error.name.as_str();
        let code = error.code.as_deref().unwrap_or("");

        if message.contains("configuration") {
            return Rule {
                kind: ErrorKind::Configuration,
                severity: Severity::High,
                recoverable: true,
                strategy: RecoveryStrategy::Fallback,
                guidance: &[
                    "Check the reporter configuration file for syntax errors",
                    "Verify that every configured option has a valid value",
                    "Remove custom settings to fall back to defaults",
                ],
            };
        }

        if code == "ENOENT" {
            return Rule {
                kind: ErrorKind::FileSystem,
                severity: Severity::Medium,
                recoverable: true,
                strategy: RecoveryStrategy::Retry,
                guidance: &[
                    "Verify that the file or directory exists",
                    "Check that the output path is spelled correctly",
                ],
            };
        }

        if code == "EACCES" || code == "EPERM" {
            return Rule {
                kind: ErrorKind::Permission,
                severity: Severity::High,
                recoverable: false,
                strategy: RecoveryStrategy::Fail,
                guidance: &[
                    "Check write permissions on the output directory",
                    "Run the reporter as a user that owns the target path",
                    "Choose an output directory inside the workspace",
                ],
            };
        }

        if code == "ENOSPC" {
            return Rule {
                kind: ErrorKind::DiskSpace,
                severity: Severity::Critical,
                recoverable: false,
                strategy: RecoveryStrategy::Fail,
                guidance: &[
                    "Free up disk space on the output volume",
                    "Remove old reports and backups",
                    "Write reports to a different volume",
                ],
            };
        }

        if message.contains("timeout")
            || message.contains("timed out")
            || name.contains("Timeout")
            || code == "ETIMEDOUT"
        {
            return Rule {
                kind: ErrorKind::Timeout,
                severity: Severity::Medium,
                recoverable: true,
                strategy: RecoveryStrategy::Retry,
                guidance: &[
                    "Increase the configured timeout",
                    "Reduce the amount of data included in the report",
                ],
            };
        }

        if message.contains("memory") || name == "RangeError" {
            return Rule {
                kind: ErrorKind::Memory,
                severity: Severity::High,
                recoverable: true,
                strategy: RecoveryStrategy::Partial,
                guidance: &[
                    "Generate fewer report formats at once",
                    "Disable detailed sections for very large test runs",
                    "Raise the memory limit of the test process",
                ],
            };
        }

        if message.contains("template") || message.contains("handlebars") {
            return Rule {
                kind: ErrorKind::TemplateRendering,
                severity: Severity::Medium,
                recoverable: true,
                strategy: RecoveryStrategy::Fallback,
                guidance: &[
                    "Check the report template for syntax errors",
                    "Verify that the template directory is readable",
                ],
            };
        }

        if message.contains("jest") || message.contains("test result") {
            return Rule {
                kind: ErrorKind::TestResultParsing,
                severity: Severity::Medium,
                recoverable: true,
                strategy: RecoveryStrategy::Partial,
                guidance: &[
                    "Check that the test runner produced valid JSON output",
                    "Re-run the test suite to regenerate results",
                ],
            };
        }

        if message.contains("network") || code == "ENOTFOUND" {
            return Rule {
                kind: ErrorKind::Network,
                severity: Severity::Low,
                recoverable: true,
                strategy: RecoveryStrategy::Retry,
                guidance: &[
                    "Check network connectivity",
                    "Retry once the remote service is reachable",
                ],
            };
        }

        Rule {
            kind: ErrorKind::Unknown,
            severity: Severity::Medium,
            recoverable: true,
            strategy: RecoveryStrategy::Retry,
            guidance: &[
                "Retry the operation",
                "Enable detailed logging to capture more context",
            ],
        }
    }

    /// True iff the error is of a transient kind and still has retries left
    pub fn is_transient_error(&self, error: &ReportingError) -> bool {
        error.kind.is_transient() && error.recoverable && error.retry_count < error.max_retries
    }

    /// Exponential backoff with up to 10% jitter, capped at 30 seconds
    pub fn retry_delay(&self, error: &ReportingError) -> Duration {
        self.backoff.next_delay(error.retry_count)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(3)
    }
}
