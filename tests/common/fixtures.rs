/// Test-runner output fixtures
use serde_json::{json, Value};

/// Three suites: two passing, one with a failing assertion
pub fn jest_results() -> Value {
    json!({
        "numTotalTestSuites": 3,
        "numPassedTestSuites": 2,
        "numFailedTestSuites": 1,
        "numTotalTests": 6,
        "numPassedTests": 5,
        "numFailedTests": 1,
        "numPendingTests": 0,
        "success": false,
        "startTime": 1_700_000_000_000_i64,
        "endTime": 1_700_000_004_500_i64,
        "testResults": [
            {
                "testFilePath": "/repo/src/parser.test.js",
                "status": "passed",
                "numTotalTests": 2,
                "numPassingTests": 2,
                "numFailingTests": 0,
                "numPendingTests": 0,
                "assertionResults": [
                    {"title": "parses numbers", "status": "passed", "duration": 4},
                    {"title": "parses strings", "status": "passed", "duration": 3}
                ]
            },
            {
                "testFilePath": "/repo/src/render.test.js",
                "status": "failed",
                "numTotalTests": 2,
                "numPassingTests": 1,
                "numFailingTests": 1,
                "numPendingTests": 0,
                "assertionResults": [
                    {"title": "renders header", "status": "passed", "duration": 12},
                    {"title": "renders footer", "status": "failed", "duration": 9,
                     "failureMessages": ["expected <footer> to exist"]}
                ]
            },
            {
                "testFilePath": "/repo/src/store.test.js",
                "status": "passed",
                "numTotalTests": 2,
                "numPassingTests": 2,
                "numFailingTests": 0,
                "numPendingTests": 0,
                "assertionResults": [
                    {"title": "saves", "status": "passed", "duration": 1},
                    {"title": "loads", "status": "passed", "duration": 2}
                ]
            }
        ]
    })
}

pub fn jest_text() -> String {
    serde_json::to_string_pretty(&jest_results()).expect("fixture serializes")
}

/// Trailing commas and single quotes, as hand-edited output tends to have
pub fn jest_text_with_syntax_errors() -> String {
    r#"{
        'numTotalTests': 2,
        'numPassedTests': 2,
        'numFailedTests': 0,
        'testResults': [
            {'testFilePath': '/repo/a.test.js', 'assertionResults': [
                {'title': 'one', 'status': 'passed'},
                {'title': 'two', 'status': 'passed'},
            ]},
        ],
    }"#
    .to_string()
}

/// Valid JSON surrounded by console noise from the runner
pub fn jest_text_with_log_noise() -> String {
    format!(
        "console.log: warming cache\n{}\nTest Suites: 1 failed, 2 passed, 3 total\n",
        serde_json::to_string(&jest_results()).expect("fixture serializes")
    )
}

pub fn coverage_summary() -> Value {
    json!({
        "total": {
            "lines": {"total": 200, "covered": 170, "skipped": 0, "pct": 85.0},
            "statements": {"total": 220, "covered": 180, "skipped": 0, "pct": 81.82},
            "functions": {"total": 40, "covered": 30, "skipped": 0, "pct": 75.0},
            "branches": {"total": 60, "covered": 42, "skipped": 0, "pct": 70.0}
        }
    })
}
