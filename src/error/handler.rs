/// Error handler - single dispatcher for every classified failure
///
/// This module provides the orchestration layer that:
/// - Classifies raw failures exactly once
/// - Keeps an append-only error history and per-bucket retry counters
/// - Dispatches to one of five recovery strategies
/// - Derives an aggregate degradation signal from recent errors
///
/// `handle_error` never fails: every outcome is an `ErrorRecoveryResult` and
/// callers branch on `success`.
use super::classification::{
    ErrorClassifier, ErrorContext, ErrorKind, RecoveryStrategy, ReportingError, Severity,
    MAX_RETRY_DELAY,
};
use super::mechanisms::{fallback_for, partial_for, RecoveredData};
use super::retry::ExponentialBackoff;
use crate::{ErrorHandlingConfig, LogLevel, RawError};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Number of recent errors considered by `is_system_degraded`
const DEGRADATION_WINDOW: usize = 5;

/// High-severity errors in the window that mark the system degraded
const DEGRADATION_HIGH_THRESHOLD: usize = 3;

/// Input to the handler: either a raw failure or an already classified one
#[derive(Debug, Clone)]
pub enum Failure {
    Raw(RawError),
    Classified(ReportingError),
}

impl From<RawError> for Failure {
    fn from(err: RawError) -> Self {
        Failure::Raw(err)
    }
}

impl From<ReportingError> for Failure {
    fn from(err: ReportingError) -> Self {
        Failure::Classified(err)
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Failure::Raw(RawError::from(err))
    }
}

impl From<&std::io::Error> for Failure {
    fn from(err: &std::io::Error) -> Self {
        Failure::Raw(RawError::from(err))
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Failure::Raw(RawError::from(err))
    }
}

/// Outcome of a recovery attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecoveryResult {
    pub success: bool,
    pub partial_success: bool,
    pub recovered_data: Option<RecoveredData>,
    pub fallback_used: bool,
    pub message: String,

    /// The error as updated by the handler (e.g. with its new retry count)
    pub new_error: Option<ReportingError>,
}

impl ErrorRecoveryResult {
    fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            partial_success: false,
            recovered_data: None,
            fallback_used: false,
            message: message.into(),
            new_error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::succeeded(message)
        }
    }
}

/// Aggregate view of the error history
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStatistics {
    pub total_errors: usize,
    pub by_type: BTreeMap<ErrorKind, usize>,
    pub by_severity: BTreeMap<Severity, usize>,

    /// Sum of all retry bucket counters
    pub recovery_attempts: u32,
}

#[derive(Debug, Default)]
struct HandlerState {
    history: VecDeque<ReportingError>,
    recovery_attempts: HashMap<String, u32>,
}

pub struct ErrorHandler {
    config: ErrorHandlingConfig,
    classifier: ErrorClassifier,
    backoff: ExponentialBackoff,

    /// History and retry counters; never held across an await point
    state: Mutex<HandlerState>,
}

impl ErrorHandler {
    pub fn new(config: ErrorHandlingConfig) -> Self {
        let classifier = ErrorClassifier::new(config.max_retries)
            .with_retry_base(Duration::from_millis(config.retry_delay_ms));
        let backoff = ExponentialBackoff::new(
            Duration::from_millis(config.retry_delay_ms),
            MAX_RETRY_DELAY,
        );

        Self {
            config,
            classifier,
            backoff,
            state: Mutex::new(HandlerState::default()),
        }
    }

    pub fn config(&self) -> &ErrorHandlingConfig {
        &self.config
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Classify without recording
    pub fn classify(&self, error: &RawError, context: Option<ErrorContext>) -> ReportingError {
        self.classifier.classify(error, context)
    }

    fn state(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an error to the history and log it, without attempting recovery
    pub fn record(&self, error: ReportingError) {
        self.log_error(&error);

        let mut state = self.state();
        state.history.push_back(error);
        while state.history.len() > self.config.max_history.max(1) {
            state.history.pop_front();
        }
    }

    /// Classify (if needed), record, and dispatch to the error's recovery strategy
    pub async fn handle_error(
        &self,
        failure: impl Into<Failure>,
        context: Option<ErrorContext>,
    ) -> ErrorRecoveryResult {
        let mut error = match failure.into() {
            Failure::Raw(raw) => self.classifier.classify(&raw, context),
            Failure::Classified(mut classified) => {
                if classified.context.is_none() {
                    classified.context = context;
                }
                classified
            }
        };

        self.record(error.clone());

        if self.should_fail_immediately(&error) {
            tracing::error!(
                kind = %error.kind,
                severity = %error.severity,
                "Critical error, skipping recovery"
            );
            let mut result = ErrorRecoveryResult::failed(format!("Critical error: {}", error.message));
            result.new_error = Some(error);
            return result;
        }

        let mut result = match error.recovery_strategy {
            RecoveryStrategy::Retry => self.handle_retry(&mut error).await,
            RecoveryStrategy::Fallback => self.handle_fallback(&error),
            RecoveryStrategy::Partial => self.handle_partial(&error),
            RecoveryStrategy::Skip => self.handle_skip(&error),
            RecoveryStrategy::Fail => self.handle_fail(&error),
        };

        tracing::debug!(
            kind = %error.kind,
            strategy = %error.recovery_strategy,
            success = result.success,
            message = %result.message,
            "Recovery finished"
        );

        result.new_error = Some(error);
        result
    }

    fn should_fail_immediately(&self, error: &ReportingError) -> bool {
        self.config.fail_on_critical_errors
            && (error.severity == Severity::Critical
                || !error.recoverable
                || matches!(error.kind, ErrorKind::Permission | ErrorKind::DiskSpace))
    }

    async fn handle_retry(&self, error: &mut ReportingError) -> ErrorRecoveryResult {
        let key = error.bucket_key();

        let attempt = {
            let mut state = self.state();
            let count = state.recovery_attempts.entry(key.clone()).or_insert(0);
            if *count >= self.config.max_retries {
                error.retry_count = *count;
                return ErrorRecoveryResult::failed(format!(
                    "Max retries exceeded for {} ({}/{})",
                    error.kind, count, self.config.max_retries
                ));
            }
            *count += 1;
            *count
        };

        error.retry_count = attempt;
        error.max_retries = self.config.max_retries;

        let delay = self.backoff.next_delay(attempt - 1);
        tracing::info!(
            bucket = %key,
            attempt = attempt,
            max_attempts = self.config.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Retrying after delay"
        );
        tokio::time::sleep(delay).await;

        ErrorRecoveryResult::succeeded(format!("Retry scheduled (attempt {})", attempt))
    }

    fn handle_fallback(&self, error: &ReportingError) -> ErrorRecoveryResult {
        if !self.config.enable_fallbacks {
            return ErrorRecoveryResult::failed("Fallbacks disabled");
        }

        match fallback_for(error) {
            Some(data) => {
                tracing::info!(kind = %error.kind, artifact = ?data, "Using fallback");
                ErrorRecoveryResult {
                    recovered_data: Some(data),
                    fallback_used: true,
                    ..ErrorRecoveryResult::succeeded(format!("Fallback used for {}", error.kind))
                }
            }
            None => ErrorRecoveryResult::failed("No fallback mechanism available"),
        }
    }

    fn handle_partial(&self, error: &ReportingError) -> ErrorRecoveryResult {
        if !self.config.enable_partial_reports {
            return ErrorRecoveryResult::failed("Partial reports disabled");
        }

        ErrorRecoveryResult {
            partial_success: true,
            recovered_data: Some(partial_for(error)),
            ..ErrorRecoveryResult::succeeded(format!("Partial result produced for {}", error.kind))
        }
    }

    fn handle_skip(&self, error: &ReportingError) -> ErrorRecoveryResult {
        ErrorRecoveryResult::succeeded(format!("Operation skipped due to {}", error.kind))
    }

    fn handle_fail(&self, error: &ReportingError) -> ErrorRecoveryResult {
        ErrorRecoveryResult::failed(format!("Operation failed: {}", error.message))
    }

    fn log_error(&self, error: &ReportingError) {
        let level = match error.severity {
            Severity::Critical | Severity::High => LogLevel::Error,
            Severity::Medium => LogLevel::Warn,
            Severity::Low => LogLevel::Info,
        };
        if level > self.config.log_level {
            return;
        }

        let guidance = if self.config.enable_actionable_guidance {
            error.actionable_guidance.join("; ")
        } else {
            String::new()
        };
        let context = if self.config.enable_detailed_logging {
            error
                .context
                .as_ref()
                .map(|ctx| format!("{:?}", ctx))
                .unwrap_or_default()
        } else {
            String::new()
        };
        let stack = if self.config.enable_stack_traces {
            error.stack.clone().unwrap_or_default()
        } else {
            String::new()
        };

        match level {
            LogLevel::Error => tracing::error!(
                kind = %error.kind,
                severity = %error.severity,
                code = ?error.code,
                guidance = %guidance,
                context = %context,
                stack = %stack,
                "{}",
                error.message
            ),
            LogLevel::Warn => tracing::warn!(
                kind = %error.kind,
                severity = %error.severity,
                code = ?error.code,
                guidance = %guidance,
                context = %context,
                stack = %stack,
                "{}",
                error.message
            ),
            LogLevel::Info | LogLevel::Debug => tracing::info!(
                kind = %error.kind,
                severity = %error.severity,
                code = ?error.code,
                guidance = %guidance,
                context = %context,
                stack = %stack,
                "{}",
                error.message
            ),
        }
    }

    /// Counts by type and severity plus total recovery attempts
    pub fn error_statistics(&self) -> ErrorStatistics {
        let state = self.state();
        let mut stats = ErrorStatistics {
            total_errors: state.history.len(),
            recovery_attempts: state.recovery_attempts.values().fold(0, |acc, n| acc.saturating_add(*n)),
            ..ErrorStatistics::default()
        };

        for error in &state.history {
            *stats.by_type.entry(error.kind).or_insert(0) += 1;
            *stats.by_severity.entry(error.severity).or_insert(0) += 1;
        }

        stats
    }

    /// True iff the 5 most recent errors hold a Critical one or at least 3 High ones
    pub fn is_system_degraded(&self) -> bool {
        let state = self.state();
        let recent = state.history.iter().rev().take(DEGRADATION_WINDOW);

        let mut high = 0;
        for error in recent {
            match error.severity {
                Severity::Critical => return true,
                Severity::High => high += 1,
                _ => {}
            }
        }
        high >= DEGRADATION_HIGH_THRESHOLD
    }

    /// Most recent `n` errors, oldest first
    pub fn recent_errors(&self, n: usize) -> Vec<ReportingError> {
        let state = self.state();
        let skip = state.history.len().saturating_sub(n);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// Current retry count of a bucket
    pub fn attempts_for(&self, bucket_key: &str) -> u32 {
        self.state()
            .recovery_attempts
            .get(bucket_key)
            .copied()
            .unwrap_or(0)
    }

    /// Drop history and reset every retry counter
    pub fn clear_error_history(&self) {
        let mut state = self.state();
        state.history.clear();
        state.recovery_attempts.clear();
        tracing::debug!("Error history cleared");
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(ErrorHandlingConfig::default())
    }
}
