/// Partial artifacts - best-effort results when full data is unavailable
use super::RecoveredData;
use crate::error::{ErrorKind, ReportingError};

/// Build the partial artifact for an error
pub fn partial_for(error: &ReportingError) -> RecoveredData {
    match error.kind {
        ErrorKind::TestResultParsing | ErrorKind::MalformedTestData => {
            let available_data = error
                .details
                .get("partialData")
                .cloned()
                .unwrap_or_else(minimal_test_results);
            RecoveredData::PartialTestData { available_data }
        }
        ErrorKind::Memory | ErrorKind::ResourceExhaustion => RecoveredData::LightweightSummary {
            summary: serde_json::json!({
                "lightweight": true,
                "reason": error.message,
                "detailLevel": "summary",
            }),
        },
        _ => RecoveredData::BasicReport {
            error: error.message.clone(),
        },
    }
}

/// Canonical empty Jest-style result set
pub fn minimal_test_results() -> serde_json::Value {
    let now = chrono::Utc::now().timestamp_millis();
    serde_json::json!({
        "testResults": [],
        "numTotalTests": 0,
        "numPassedTests": 0,
        "numFailedTests": 0,
        "numPendingTests": 0,
        "numTotalTestSuites": 0,
        "numPassedTestSuites": 0,
        "numFailedTestSuites": 0,
        "startTime": now,
        "endTime": now,
        "success": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RecoveryStrategy, Severity};

    #[test]
    fn test_parsing_error_uses_partial_data_from_details() {
        let err = ReportingError::new(
            ErrorKind::TestResultParsing,
            Severity::Medium,
            RecoveryStrategy::Partial,
            "bad jest output",
        )
        .with_details(serde_json::json!({ "partialData": { "testResults": [1] } }));

        match partial_for(&err) {
            RecoveredData::PartialTestData { available_data } => {
                assert_eq!(available_data["testResults"][0], 1);
            }
            other => panic!("unexpected artifact: {:?}", other),
        }
    }

    #[test]
    fn test_parsing_error_without_details_gets_minimal_structure() {
        let err = ReportingError::new(
            ErrorKind::MalformedTestData,
            Severity::Medium,
            RecoveryStrategy::Partial,
            "garbage",
        );
        match partial_for(&err) {
            RecoveredData::PartialTestData { available_data } => {
                assert_eq!(available_data["testResults"], serde_json::json!([]));
                assert_eq!(available_data["success"], false);
            }
            other => panic!("unexpected artifact: {:?}", other),
        }
    }

    #[test]
    fn test_memory_and_generic_artifacts() {
        let mem = ReportingError::new(ErrorKind::Memory, Severity::High, RecoveryStrategy::Partial, "oom");
        assert!(matches!(partial_for(&mem), RecoveredData::LightweightSummary { .. }));

        let generic = ReportingError::new(
            ErrorKind::ReportGeneration,
            Severity::Medium,
            RecoveryStrategy::Partial,
            "render failed",
        );
        assert_eq!(
            partial_for(&generic),
            RecoveredData::BasicReport { error: "render failed".to_string() }
        );
        assert!(partial_for(&generic).is_partial());
    }
}
