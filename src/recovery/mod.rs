/// Malformed test-data recovery
///
/// Turns arbitrary, possibly corrupt test-runner output into a canonical
/// Jest-style structure. Each stage guards against the previous one failing:
///
/// ```text
/// raw payload
///     │
///     ├─ null ─────────────────────────────────┐
///     ↓                                        │
/// parse strategies (direct → repair → extract  │
///   → fragments → lines)                       │
///     ↓                                        │
/// structural sanitization                      │
///     ↓                                        │
/// schema check (warn only)                     │
///     ↓                                        ↓
/// required fields ──→ recovered_data     minimal fallback ──→ partial_data
/// ```
///
/// Recovery never fails outright: total failure still produces a usable,
/// empty result set unless `fallback_to_minimal_data` is turned off.
pub mod coverage;
pub mod parsers;
pub mod repair;
pub mod sanitize;

#[cfg(test)]
mod recovery_tests;

use crate::error::mechanisms::minimal_test_results;
use crate::error::{ErrorContext, ErrorHandler, ErrorKind, RecoveryStrategy, ReportingError, Severity};
use crate::RecoveryConfig;
use parsers::{parse_with_strategies, ParseOptions};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Internal pipeline failures; always converted into a fallback
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("No test data provided")]
    MissingInput,

    #[error("Unable to parse data after {attempted} strategies")]
    Unparseable { attempted: usize },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
}

/// Outcome of a recovery run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultRecovery {
    pub success: bool,

    /// Set when the input could be reconstructed, possibly lossily
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered_data: Option<Value>,

    /// Set only when everything failed and the minimal fallback was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_data: Option<Value>,

    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl TestResultRecovery {
    /// Recovered data if any, else the fallback
    pub fn data(&self) -> Option<&Value> {
        self.recovered_data.as_ref().or(self.partial_data.as_ref())
    }

    pub fn used_fallback(&self) -> bool {
        self.recovered_data.is_none() && self.partial_data.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
enum Payload {
    TestResults,
    Coverage,
}

impl Payload {
    fn label(&self) -> &'static str {
        match self {
            Payload::TestResults => "test result",
            Payload::Coverage => "coverage",
        }
    }
}

pub struct MalformedDataRecovery {
    config: RecoveryConfig,
    handler: Option<Arc<ErrorHandler>>,
}

impl MalformedDataRecovery {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            handler: None,
        }
    }

    /// Record total failures with a shared error handler
    pub fn with_handler(mut self, handler: Arc<ErrorHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Recover Jest-style results from any JSON value (strings are parsed)
    pub fn recover_jest_results(&self, raw: &Value) -> TestResultRecovery {
        self.recover(raw, Payload::TestResults)
    }

    /// Recover Jest-style results from raw text
    pub fn recover_jest_text(&self, text: &str) -> TestResultRecovery {
        self.recover(&Value::String(text.to_string()), Payload::TestResults)
    }

    /// Recover a coverage summary from any JSON value (strings are parsed)
    pub fn recover_coverage_data(&self, raw: &Value) -> TestResultRecovery {
        self.recover(raw, Payload::Coverage)
    }

    pub fn recover_coverage_text(&self, text: &str) -> TestResultRecovery {
        self.recover(&Value::String(text.to_string()), Payload::Coverage)
    }

    fn recover(&self, raw: &Value, payload: Payload) -> TestResultRecovery {
        let mut warnings = Vec::new();

        match self.run_pipeline(raw, payload, &mut warnings) {
            Ok(data) => {
                tracing::debug!(
                    payload = payload.label(),
                    warnings = warnings.len(),
                    "Data recovered"
                );
                TestResultRecovery {
                    success: true,
                    recovered_data: Some(data),
                    partial_data: None,
                    warnings,
                    errors: Vec::new(),
                }
            }
            Err(err) => self.fallback(payload, err, warnings),
        }
    }

    fn run_pipeline(
        &self,
        raw: &Value,
        payload: Payload,
        warnings: &mut Vec<String>,
    ) -> Result<Value, RecoveryError> {
        let parsed = match raw {
            Value::Null => return Err(RecoveryError::MissingInput),
            Value::String(text) => parse_with_strategies(text, self.parse_options(), warnings)?.0,
            other => other.clone(),
        };

        match payload {
            Payload::TestResults => self.normalize_test_results(parsed, warnings),
            Payload::Coverage => self.normalize_coverage(parsed, warnings),
        }
    }

    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            allow_lossy: self.config.enable_partial_recovery,
            max_attempts: self.config.max_recovery_attempts as usize,
        }
    }

    fn normalize_test_results(&self, parsed: Value, warnings: &mut Vec<String>) -> Result<Value, RecoveryError> {
        let mut data = if self.config.enable_data_sanitization {
            sanitize::sanitize_test_results(parsed, warnings)
        } else if parsed.is_object() {
            parsed
        } else {
            return Err(RecoveryError::InvalidStructure(
                "test results must be a JSON object".to_string(),
            ));
        };

        if self.config.enable_schema_validation {
            for field in sanitize::missing_required_fields(&data) {
                warnings.push(format!("Schema: missing required field {}", field));
            }
        }

        fill_required_fields(&mut data, warnings);
        Ok(data)
    }

    fn normalize_coverage(&self, parsed: Value, warnings: &mut Vec<String>) -> Result<Value, RecoveryError> {
        if self.config.enable_data_sanitization {
            return Ok(coverage::sanitize_coverage(parsed, warnings));
        }
        if !parsed.is_object() {
            return Err(RecoveryError::InvalidStructure(
                "coverage data must be a JSON object".to_string(),
            ));
        }
        if self.config.enable_schema_validation && parsed.get("total").is_none() {
            warnings.push("Schema: missing required field total".to_string());
        }
        Ok(parsed)
    }

    fn fallback(&self, payload: Payload, err: RecoveryError, warnings: Vec<String>) -> TestResultRecovery {
        let message = format!("Failed to recover {} data: {}", payload.label(), err);
        tracing::warn!(payload = payload.label(), error = %err, "Recovery fell back to minimal data");

        let minimal = match payload {
            Payload::TestResults => minimal_test_results(),
            Payload::Coverage => coverage::minimal_coverage(),
        };
        self.record_failure(payload, &message, &minimal);

        let errors = vec![message];
        if !self.config.fallback_to_minimal_data {
            return TestResultRecovery {
                success: false,
                recovered_data: None,
                partial_data: None,
                warnings,
                errors,
            };
        }

        TestResultRecovery {
            success: true,
            recovered_data: None,
            partial_data: Some(minimal),
            warnings,
            errors,
        }
    }

    fn record_failure(&self, payload: Payload, message: &str, minimal: &Value) {
        let Some(handler) = &self.handler else {
            return;
        };

        let kind = match payload {
            Payload::TestResults => ErrorKind::TestResultParsing,
            Payload::Coverage => ErrorKind::MalformedTestData,
        };
        let error = ReportingError::new(kind, Severity::Medium, RecoveryStrategy::Partial, message)
            .with_context(ErrorContext::new("recover_data", "MalformedDataRecovery"))
            .with_details(json!({ "partialData": minimal }))
            .with_guidance("Check that the test runner produced valid JSON output");
        handler.record(error);
    }
}

impl Default for MalformedDataRecovery {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}

/// `startTime`/`endTime` default to one minute ago / now, `success` to "no failed tests"
fn fill_required_fields(data: &mut Value, warnings: &mut Vec<String>) {
    let Some(root) = data.as_object_mut() else {
        return;
    };

    let now = chrono::Utc::now().timestamp_millis();
    if !root.get("startTime").map(Value::is_number).unwrap_or(false) {
        warnings.push("Missing startTime, defaulted to one minute ago".to_string());
        root.insert("startTime".to_string(), json!(now - 60_000));
    }
    if !root.get("endTime").map(Value::is_number).unwrap_or(false) {
        warnings.push("Missing endTime, defaulted to now".to_string());
        root.insert("endTime".to_string(), json!(now));
    }
    if !root.get("success").map(Value::is_boolean).unwrap_or(false) {
        let failed = root.get("numFailedTests").and_then(Value::as_u64).unwrap_or(0);
        warnings.push("Missing success flag, derived from failed test count".to_string());
        root.insert("success".to_string(), json!(failed == 0));
    }
}
