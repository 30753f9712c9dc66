/// Error recovery system for the reporting pipeline
///
/// This module provides the error side of report generation:
/// - Classification of raw failures into a typed taxonomy
/// - Exponential backoff with jitter
/// - A single dispatcher (`ErrorHandler`) that applies one of five recovery
///   strategies and tracks history, retry buckets and degradation
/// - Typed fallback and partial artifacts
///
/// # Architecture
///
/// ```text
/// ┌─────────────────────────────────────────┐
/// │   ResilientFileSystem / DataRecovery /   │
/// │        ReportGeneratorFactory            │
/// └────────────────┬────────────────────────┘
///                  │ raw failure + context
///                  ↓
/// ┌─────────────────────────────────────────┐
/// │     ErrorHandler (strategy dispatch)     │
/// └──────┬──────────────────────┬───────────┘
///        ↓                      ↓
/// ┌──────────────┐      ┌──────────────────┐
/// │Classification│      │   Mechanisms     │
/// │  & Backoff   │      │ - Fallback       │
/// └──────────────┘      │ - Partial        │
///                       └──────────────────┘
/// ```
///
/// # Usage Example
///
/// ```rust,ignore
/// use resilient_reporter::error::{ErrorContext, ErrorHandler};
/// use resilient_reporter::ErrorHandlingConfig;
///
/// let handler = ErrorHandler::new(ErrorHandlingConfig::default());
/// let context = ErrorContext::for_file("write_file", "reports/index.html");
///
/// let outcome = handler.handle_error(io_error, Some(context)).await;
/// if outcome.success {
///     // re-run the operation, or use outcome.recovered_data
/// }
/// ```

pub mod classification;
pub mod handler;
pub mod mechanisms;
pub mod retry;

// Re-export main types for convenience
pub use classification::{
    ErrorClassifier, ErrorContext, ErrorFamily, ErrorKind, RecoveryStrategy, ReportingError,
    Severity,
};
pub use handler::{ErrorHandler, ErrorRecoveryResult, ErrorStatistics, Failure};
pub use mechanisms::RecoveredData;
pub use retry::ExponentialBackoff;
