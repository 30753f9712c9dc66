/// Aggregated view of a test run, handed to every report generator
use crate::recovery::sanitize::suite_failed;
use crate::recovery::TestResultRecovery;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub total_suites: u64,
    pub passed_suites: u64,
    pub failed_suites: u64,
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub pending_tests: u64,
    pub success: bool,
    pub duration_ms: u64,
}

impl TestSummary {
    /// Share of passing tests, 0-100
    pub fn pass_rate(&self) -> f64 {
        if self.total_tests == 0 {
            return 0.0;
        }
        self.passed_tests as f64 / self.total_tests as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSummary {
    pub path: String,
    pub status: SuiteStatus,
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub pending: u64,
    pub duration_ms: u64,

    /// Titles of failing tests
    pub failed_tests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedData {
    pub summary: TestSummary,
    pub suites: Vec<SuiteSummary>,
    pub coverage: Option<Value>,
    pub generated_at: DateTime<Utc>,

    /// Problems found while recovering the input
    pub warnings: Vec<String>,
}

impl AggregatedData {
    /// Build from canonical (sanitized) Jest results
    pub fn from_results(results: &Value) -> Self {
        let suites: Vec<SuiteSummary> = results
            .get("testResults")
            .and_then(Value::as_array)
            .map(|items| items.iter().enumerate().map(|(i, s)| summarize_suite(i, s)).collect())
            .unwrap_or_default();

        let counter = |field: &str| results.get(field).and_then(Value::as_u64);
        let failed_suites = suites.iter().filter(|s| s.status == SuiteStatus::Failed).count() as u64;

        let summary = TestSummary {
            total_suites: counter("numTotalTestSuites").unwrap_or(suites.len() as u64),
            passed_suites: counter("numPassedTestSuites")
                .unwrap_or(suites.len() as u64 - failed_suites),
            failed_suites: counter("numFailedTestSuites").unwrap_or(failed_suites),
            total_tests: counter("numTotalTests").unwrap_or_else(|| suites.iter().map(|s| s.total).fold(0, u64::saturating_add)),
            passed_tests: counter("numPassedTests").unwrap_or_else(|| suites.iter().map(|s| s.passed).fold(0, u64::saturating_add)),
            failed_tests: counter("numFailedTests").unwrap_or_else(|| suites.iter().map(|s| s.failed).fold(0, u64::saturating_add)),
            pending_tests: counter("numPendingTests").unwrap_or_else(|| suites.iter().map(|s| s.pending).fold(0, u64::saturating_add)),
            success: results
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(failed_suites == 0),
            duration_ms: span_ms(results.get("startTime"), results.get("endTime")),
        };

        Self {
            summary,
            suites,
            coverage: None,
            generated_at: Utc::now(),
            warnings: Vec::new(),
        }
    }

    /// Build from a recovery outcome, carrying its warnings and errors along
    pub fn from_recovery(recovery: &TestResultRecovery) -> Self {
        let mut data = match recovery.data() {
            Some(results) => Self::from_results(results),
            None => Self::from_results(&Value::Null),
        };
        data.warnings.extend(recovery.warnings.iter().cloned());
        data.warnings.extend(recovery.errors.iter().cloned());
        data
    }

    pub fn with_coverage(mut self, coverage: Value) -> Self {
        self.coverage = Some(coverage);
        self
    }

    /// `total.<metric>.pct` from the coverage summary
    pub fn coverage_pct(&self, metric: &str) -> Option<f64> {
        self.coverage
            .as_ref()?
            .get("total")?
            .get(metric)?
            .get("pct")?
            .as_f64()
    }
}

fn summarize_suite(index: usize, suite: &Value) -> SuiteSummary {
    let assertions = suite
        .get("assertionResults")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let count = |field: &str| suite.get(field).and_then(Value::as_u64).unwrap_or(0);

    let failed_tests = assertions
        .iter()
        .filter(|a| a.get("status").and_then(Value::as_str) == Some("failed"))
        .map(|a| {
            a.get("fullName")
                .or_else(|| a.get("title"))
                .and_then(Value::as_str)
                .unwrap_or("unnamed test")
                .to_string()
        })
        .collect();

    let perf = suite.get("perfStats");
    SuiteSummary {
        path: suite
            .get("testFilePath")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("unknown-test-{}.test.js", index)),
        status: if suite_failed(suite) {
            SuiteStatus::Failed
        } else {
            SuiteStatus::Passed
        },
        total: count("numTotalTests"),
        passed: count("numPassingTests"),
        failed: count("numFailingTests"),
        pending: count("numPendingTests"),
        duration_ms: span_ms(
            perf.and_then(|p| p.get("start")),
            perf.and_then(|p| p.get("end")),
        ),
        failed_tests,
    }
}

fn span_ms(start: Option<&Value>, end: Option<&Value>) -> u64 {
    match (start.and_then(Value::as_f64), end.and_then(Value::as_f64)) {
        (Some(start), Some(end)) if end > start => (end - start) as u64,
        _ => 0,
    }
}
