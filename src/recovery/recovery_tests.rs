// Tests for malformed data recovery
//
// Tests cover: the end-to-end pipeline on broken Jest output, fallback behaviour,
// config toggles, failure recording, and property tests for the never-fails,
// counter and idempotence guarantees.

use super::*;
use crate::error::{ErrorHandler, ErrorKind};
use crate::RecoveryConfig;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn recovery() -> MalformedDataRecovery {
    MalformedDataRecovery::default()
}

// ==================== PIPELINE TESTS ====================

#[test]
fn test_repairs_js_literal_output() {
    let input = r#"{"testResults":[{testFilePath: '/a.test.js', 'assertionResults':[{title:"t1",status:"passed",duration:100,}]}],}"#;

    let result = recovery().recover_jest_text(input);

    assert!(result.success);
    let data = result.recovered_data.as_ref().unwrap();
    assert_eq!(data["testResults"][0]["testFilePath"], "/a.test.js");
    assert_eq!(data["testResults"][0]["assertionResults"][0]["status"], "passed");
    assert_eq!(data["numTotalTests"], 1);
    assert_eq!(data["success"], true);
    assert!(result.partial_data.is_none());
    assert!(result.warnings.iter().any(|w| w.contains("syntax repair")));
}

#[test]
fn test_garbage_falls_back_to_minimal_data() {
    let result = recovery().recover_jest_text("not json at all! @#$%");

    assert!(result.success);
    assert!(result.recovered_data.is_none());
    assert!(result.used_fallback());
    let partial = result.partial_data.as_ref().unwrap();
    assert_eq!(partial["testResults"], json!([]));
    assert_eq!(partial["numTotalTests"], 0);
    assert_eq!(partial["success"], false);
    assert!(!result.errors.is_empty());
}

#[test]
fn test_null_input_falls_back_immediately() {
    let result = recovery().recover_jest_results(&Value::Null);

    assert!(result.success);
    assert!(result.warnings.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("No test data provided"));
}

#[test]
fn test_parsed_object_is_sanitized_without_parsing() {
    let input = json!({
        "testResults": [{
            "testFilePath": "/b.test.js",
            "assertionResults": [
                {"title": "ok", "status": "passed"},
                {"title": "bad", "status": "failed"}
            ]
        }],
        "startTime": 1000,
        "endTime": 2000
    });

    let result = recovery().recover_jest_results(&input);
    let data = result.recovered_data.unwrap();

    assert_eq!(data["numTotalTests"], 2);
    assert_eq!(data["numFailedTests"], 1);
    assert_eq!(data["numFailedTestSuites"], 1);
    assert_eq!(data["success"], false);
    assert_eq!(data["startTime"], 1000);
}

#[test]
fn test_required_times_are_filled() {
    let result = recovery().recover_jest_results(&json!({"testResults": []}));
    let data = result.recovered_data.unwrap();

    let start = data["startTime"].as_i64().unwrap();
    let end = data["endTime"].as_i64().unwrap();
    assert_eq!(end - start, 60_000);
    assert_eq!(data["success"], true);
}

#[test]
fn test_log_wrapped_output_is_extracted() {
    let text = "yarn run v1.22\n$ jest --json\n{\"testResults\": [], \"numTotalTests\": 0}\nDone in 1.2s.";
    let result = recovery().recover_jest_text(text);

    assert!(result.success);
    assert!(result.recovered_data.is_some());
    assert!(result.warnings.iter().any(|w| w.contains("JSON block extraction")));
}

// ==================== CONFIG TESTS ====================

#[test]
fn test_fallback_disabled_reports_failure() {
    let recovery = MalformedDataRecovery::new(RecoveryConfig {
        fallback_to_minimal_data: false,
        ..RecoveryConfig::default()
    });

    let result = recovery.recover_jest_text("%%%");

    assert!(!result.success);
    assert!(result.data().is_none());
    assert!(!result.errors.is_empty());
}

#[test]
fn test_partial_recovery_disabled_skips_lossy_strategies() {
    let recovery = MalformedDataRecovery::new(RecoveryConfig {
        enable_partial_recovery: false,
        ..RecoveryConfig::default()
    });

    let result = recovery.recover_jest_text("prefix {\"testResults\": []} suffix");
    assert!(result.used_fallback());
}

#[test]
fn test_sanitization_disabled_rejects_non_objects() {
    let recovery = MalformedDataRecovery::new(RecoveryConfig {
        enable_data_sanitization: false,
        ..RecoveryConfig::default()
    });

    assert!(recovery.recover_jest_results(&json!([1, 2])).used_fallback());

    let result = recovery.recover_jest_results(&json!({"numTotalTests": 1}));
    assert!(result.recovered_data.is_some());
    assert!(result
        .warnings
        .iter()
        .any(|w| w == "Schema: missing required field testResults"));
}

// ==================== HANDLER INTEGRATION ====================

#[test]
fn test_total_failure_is_recorded_with_handler() {
    let handler = Arc::new(ErrorHandler::default());
    let recovery = MalformedDataRecovery::default().with_handler(handler.clone());

    recovery.recover_jest_text("@@@");

    let recorded = handler.recent_errors(1);
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].kind, ErrorKind::TestResultParsing);
    assert_eq!(recorded[0].details["partialData"]["testResults"], json!([]));
    assert_eq!(handler.error_statistics().recovery_attempts, 0);
}

#[test]
fn test_successful_recovery_records_nothing() {
    let handler = Arc::new(ErrorHandler::default());
    let recovery = MalformedDataRecovery::default().with_handler(handler.clone());

    recovery.recover_jest_text("{\"testResults\": []}");
    assert_eq!(handler.error_statistics().total_errors, 0);
}

// ==================== COVERAGE TESTS ====================

#[test]
fn test_coverage_text_recovery() {
    let text = "{total: {lines: {total: 10, covered: 7, skipped: 0, pct: 70,},},}";
    let result = recovery().recover_coverage_text(text);

    let data = result.recovered_data.unwrap();
    assert_eq!(data["total"]["lines"]["pct"], 70.0);
    assert_eq!(data["total"]["branches"]["total"], 0);
}

#[test]
fn test_coverage_null_falls_back() {
    let result = recovery().recover_coverage_data(&Value::Null);
    assert!(result.success);
    assert_eq!(
        result.partial_data.unwrap(),
        coverage::minimal_coverage()
    );
}

// ==================== LARGE COUNTER TESTS ====================

#[test]
fn test_suite_totals_saturate_instead_of_overflowing() {
    let text = format!(
        r#"{{"testResults": [
            {{"testFilePath": "/a.test.js", "numTotalTests": {}, "assertionResults": []}},
            {{"testFilePath": "/b.test.js", "numTotalTests": 1, "assertionResults": []}}
        ]}}"#,
        u64::MAX
    );

    let result = recovery().recover_jest_text(&text);

    assert!(result.success);
    let data = result.recovered_data.unwrap();
    assert_eq!(data["numTotalTests"].as_u64(), Some(u64::MAX));
}

#[test]
fn test_coverage_file_totals_saturate_instead_of_overflowing() {
    let text = format!(
        r#"{{
            "/src/a.js": {{"lines": {{"total": {max}, "covered": {max}, "skipped": 0, "pct": 100}}}},
            "/src/b.js": {{"lines": {{"total": 1, "covered": 1, "skipped": 0, "pct": 100}}}}
        }}"#,
        max = u64::MAX
    );

    let result = recovery().recover_coverage_text(&text);

    assert!(result.success);
    let data = result.recovered_data.unwrap();
    assert_eq!(data["total"]["lines"]["total"].as_u64(), Some(u64::MAX));
    assert_eq!(data["total"]["lines"]["covered"].as_u64(), Some(u64::MAX));
}

// ==================== PROPERTY TESTS ====================

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-zA-Z ]{0,8}".prop_map(Value::String),
        prop_oneof![
            Just("passed"),
            Just("failed"),
            Just("todo"),
            Just("FAILED")
        ]
        .prop_map(|s| Value::String(s.to_string())),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(
                prop_oneof![
                    Just("status".to_string()),
                    Just("duration".to_string()),
                    Just("testFilePath".to_string()),
                    Just("assertionResults".to_string()),
                    Just("numTotalTests".to_string()),
                    "[a-z]{1,8}",
                ],
                inner,
                0..4
            )
            .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_suite() -> impl Strategy<Value = Value> {
    prop::collection::vec(0usize..5, 0..6).prop_map(|statuses| {
        let names = ["passed", "failed", "pending", "todo", "skipped"];
        let assertions: Vec<Value> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| json!({"title": format!("t{}", i), "status": names[*s], "duration": i}))
            .collect();
        json!({"testFilePath": "/x.test.js", "assertionResults": assertions})
    })
}

proptest! {
    #[test]
    fn prop_recovery_never_fails(text in ".{0,200}") {
        let result = MalformedDataRecovery::default().recover_jest_text(&text);
        prop_assert!(result.success);
        prop_assert!(result.data().is_some());
    }

    #[test]
    fn prop_total_tests_is_sum_of_suites(suites in prop::collection::vec(arb_suite(), 0..5)) {
        let expected: usize = suites
            .iter()
            .map(|s| s["assertionResults"].as_array().map(Vec::len).unwrap_or(0))
            .sum();

        let text = serde_json::to_string(&json!({"testResults": suites})).unwrap();
        let result = MalformedDataRecovery::default().recover_jest_text(&text);
        let data = result.recovered_data.unwrap();

        prop_assert_eq!(data["numTotalTests"].as_u64(), Some(expected as u64));
    }

    #[test]
    fn prop_sanitize_is_idempotent(entries in prop::collection::vec(arb_json(), 0..4), root in arb_json()) {
        let input = match root {
            Value::Object(mut map) => {
                map.insert("testResults".to_string(), Value::Array(entries));
                Value::Object(map)
            }
            other => other,
        };

        let once = sanitize::sanitize_test_results(input, &mut Vec::new());
        let mut warnings = Vec::new();
        let twice = sanitize::sanitize_test_results(once.clone(), &mut warnings);

        prop_assert_eq!(once, twice);
        prop_assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }
}
