use super::{AggregatedData, ReportConfig, ReportGenerator};
use crate::ReportFormat;
use serde_json::json;

/// Machine-readable report: the aggregated data plus run metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonGenerator;

impl ReportGenerator for JsonGenerator {
    fn format(&self) -> ReportFormat {
        ReportFormat::Json
    }

    fn generate_report(&self, data: &AggregatedData, config: &ReportConfig) -> anyhow::Result<String> {
        let report = json!({
            "title": config.title,
            "generatedAt": data.generated_at.to_rfc3339(),
            "summary": data.summary,
            "passRate": (data.summary.pass_rate() * 100.0).round() / 100.0,
            "testSuites": data.suites,
            "coverage": data.coverage,
            "warnings": data.warnings,
        });
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_json_report_parses() {
        let data = AggregatedData::from_results(&json!({
            "testResults": [{"testFilePath": "/a.test.js", "numTotalTests": 2, "numPassingTests": 1, "numFailingTests": 1}],
            "numTotalTests": 2,
            "numPassedTests": 1,
            "numFailedTests": 1
        }));
        let config = ReportConfig::new("Nightly", "/tmp");

        let content = JsonGenerator.generate_report(&data, &config).unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();

        assert_eq!(value["title"], "Nightly");
        assert_eq!(value["summary"]["totalTests"], 2);
        assert_eq!(value["passRate"], 50.0);
        assert_eq!(value["testSuites"][0]["path"], "/a.test.js");
        assert!(value["coverage"].is_null());
    }
}
