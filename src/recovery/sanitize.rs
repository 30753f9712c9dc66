/// Structural sanitization of Jest-style test results
///
/// Every substitution is reported in `warnings`. Sanitizing an already
/// sanitized value changes nothing and reports nothing.
use serde_json::{json, Map, Value};

/// Assertion statuses kept as-is; anything else becomes `unknown`
pub const VALID_STATUSES: [&str; 5] = ["passed", "failed", "skipped", "pending", "todo"];

const UNKNOWN_STATUS: &str = "unknown";

/// Top-level fields a result set must carry
pub const REQUIRED_FIELDS: [&str; 1] = ["testResults"];

/// Normalize a parsed value into an object with a well-formed `testResults` array
pub fn sanitize_test_results(value: Value, warnings: &mut Vec<String>) -> Value {
    let mut root = match value {
        Value::Object(map) => map,
        Value::Array(items) => {
            warnings.push("Wrapped bare array in testResults".to_string());
            let mut map = Map::new();
            map.insert("testResults".to_string(), Value::Array(items));
            map
        }
        other => {
            warnings.push(format!(
                "Expected an object but found {}, using empty testResults",
                type_name(&other)
            ));
            Map::new()
        }
    };

    let suites = match root.remove("testResults") {
        Some(Value::Array(items)) => items,
        Some(other) => {
            warnings.push(format!(
                "testResults was {}, replaced with an empty array",
                type_name(&other)
            ));
            Vec::new()
        }
        None => {
            warnings.push("Missing testResults, using an empty array".to_string());
            Vec::new()
        }
    };

    let suites: Vec<Value> = suites
        .into_iter()
        .enumerate()
        .map(|(index, suite)| Value::Object(sanitize_suite(index, suite, warnings)))
        .collect();

    fill_aggregate_counters(&mut root, &suites, warnings);
    root.insert("testResults".to_string(), Value::Array(suites));
    Value::Object(root)
}

fn sanitize_suite(index: usize, suite: Value, warnings: &mut Vec<String>) -> Map<String, Value> {
    let mut suite = match suite {
        Value::Object(map) => map,
        other => {
            warnings.push(format!(
                "Test result {} was {}, replaced with an empty entry",
                index,
                type_name(&other)
            ));
            Map::new()
        }
    };

    if !suite.get("testFilePath").map(Value::is_string).unwrap_or(false) {
        let path = format!("unknown-test-{}.test.js", index);
        warnings.push(format!("Test result {} has no testFilePath, using {}", index, path));
        suite.insert("testFilePath".to_string(), Value::String(path));
    }

    let assertions = match suite.remove("assertionResults") {
        Some(Value::Array(items)) => items,
        Some(_) | None => {
            warnings.push(format!("Test result {} has no assertionResults, using an empty array", index));
            Vec::new()
        }
    };

    let assertions: Vec<Value> = assertions
        .into_iter()
        .enumerate()
        .map(|(position, assertion)| sanitize_assertion(index, position, assertion, warnings))
        .collect();

    let count = |wanted: &[&str]| {
        assertions
            .iter()
            .filter(|a| {
                a.get("status")
                    .and_then(Value::as_str)
                    .map(|s| wanted.contains(&s))
                    .unwrap_or(false)
            })
            .count()
    };
    let counters = [
        ("numTotalTests", assertions.len()),
        ("numPassingTests", count(&["passed"])),
        ("numFailingTests", count(&["failed"])),
        ("numPendingTests", count(&["pending", "skipped", "todo"])),
    ];
    for (field, computed) in counters {
        if !suite.get(field).map(Value::is_u64).unwrap_or(false) {
            warnings.push(format!("Test result {} missing {}, computed {}", index, field, computed));
            suite.insert(field.to_string(), json!(computed));
        }
    }

    if !suite.get("perfStats").map(Value::is_object).unwrap_or(false) {
        let duration: f64 = assertions
            .iter()
            .filter_map(|a| a.get("duration").and_then(Value::as_f64))
            .sum();
        let end = chrono::Utc::now().timestamp_millis();
        let start = end.saturating_sub(duration.max(0.0) as i64);
        warnings.push(format!("Test result {} missing perfStats, synthesized", index));
        suite.insert("perfStats".to_string(), json!({ "start": start, "end": end }));
    }

    suite.insert("assertionResults".to_string(), Value::Array(assertions));
    suite
}

fn sanitize_assertion(suite: usize, position: usize, assertion: Value, warnings: &mut Vec<String>) -> Value {
    let mut assertion = match assertion {
        Value::Object(map) => map,
        other => {
            warnings.push(format!(
                "Assertion {} of test result {} was {}, replaced",
                position,
                suite,
                type_name(&other)
            ));
            let mut map = Map::new();
            map.insert("title".to_string(), json!(format!("unknown-assertion-{}", position)));
            map
        }
    };

    let status = assertion.get("status").and_then(Value::as_str);
    let normalized = match status {
        Some(s) if VALID_STATUSES.contains(&s) || s == UNKNOWN_STATUS => None,
        Some(s) => {
            let lower = s.trim().to_ascii_lowercase();
            if VALID_STATUSES.contains(&lower.as_str()) {
                Some(lower)
            } else {
                Some(UNKNOWN_STATUS.to_string())
            }
        }
        None => Some(UNKNOWN_STATUS.to_string()),
    };

    if let Some(new_status) = normalized {
        warnings.push(format!(
            "Assertion {} of test result {} had status {}, normalized to {}",
            position,
            suite,
            status.map(|s| format!("'{}'", s)).unwrap_or_else(|| "none".to_string()),
            new_status
        ));
        assertion.insert("status".to_string(), Value::String(new_status));
    }

    Value::Object(assertion)
}

/// Recompute top-level counters that the input left out
fn fill_aggregate_counters(root: &mut Map<String, Value>, suites: &[Value], warnings: &mut Vec<String>) {
    let sum = |field: &str| -> u64 {
        suites
            .iter()
            .filter_map(|s| s.get(field).and_then(Value::as_u64))
            .fold(0u64, u64::saturating_add)
    };
    let failed_suites = suites.iter().filter(|s| suite_failed(s)).count() as u64;
    let total_suites = suites.len() as u64;

    let counters = [
        ("numTotalTests", sum("numTotalTests")),
        ("numPassedTests", sum("numPassingTests")),
        ("numFailedTests", sum("numFailingTests")),
        ("numPendingTests", sum("numPendingTests")),
        ("numTotalTestSuites", total_suites),
        ("numPassedTestSuites", total_suites - failed_suites),
        ("numFailedTestSuites", failed_suites),
    ];
    for (field, computed) in counters {
        if !root.get(field).map(Value::is_u64).unwrap_or(false) {
            warnings.push(format!("Missing {}, computed {}", field, computed));
            root.insert(field.to_string(), json!(computed));
        }
    }
}

/// A suite failed if Jest said so, or if any of its tests failed
pub fn suite_failed(suite: &Value) -> bool {
    match suite.get("status").and_then(Value::as_str) {
        Some(status) => status == "failed",
        None => suite.get("numFailingTests").and_then(Value::as_u64).unwrap_or(0) > 0,
    }
}

/// Required top-level fields absent from `value`
pub fn missing_required_fields(value: &Value) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| value.get(*field).is_none())
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
