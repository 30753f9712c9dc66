/// Built-in HTML and Markdown generators
///
/// Plain string rendering with no template engine. Richer generators can be
/// registered on the factory in their place.
use super::{AggregatedData, ReportConfig, ReportGenerator, SuiteStatus};
use crate::error::mechanisms::fallback::escape_html;
use crate::recovery::coverage::COVERAGE_METRICS;
use crate::ReportFormat;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, Default)]
pub struct BasicHtmlGenerator;

impl ReportGenerator for BasicHtmlGenerator {
    fn format(&self) -> ReportFormat {
        ReportFormat::Html
    }

    fn generate_report(&self, data: &AggregatedData, config: &ReportConfig) -> anyhow::Result<String> {
        let summary = &data.summary;
        let title = escape_html(&config.title);
        let mut out = String::with_capacity(4096);

        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html lang=\"en\">")?;
        writeln!(out, "<head>")?;
        writeln!(out, "<meta charset=\"utf-8\">")?;
        writeln!(out, "<title>{}</title>", title)?;
        writeln!(out, "<style>{}</style>", STYLE)?;
        writeln!(out, "</head>")?;
        writeln!(out, "<body>")?;
        writeln!(out, "<h1>{}</h1>", title)?;
        writeln!(
            out,
            "<p class=\"{}\">{}</p>",
            if summary.success { "passed" } else { "failed" },
            if summary.success { "All tests passed" } else { "Some tests failed" }
        )?;

        writeln!(out, "<table class=\"summary\">")?;
        for (label, value) in [
            ("Test suites", summary.total_suites),
            ("Tests", summary.total_tests),
            ("Passed", summary.passed_tests),
            ("Failed", summary.failed_tests),
            ("Pending", summary.pending_tests),
        ] {
            writeln!(out, "<tr><th>{}</th><td>{}</td></tr>", label, value)?;
        }
        writeln!(
            out,
            "<tr><th>Pass rate</th><td>{:.1}%</td></tr>",
            summary.pass_rate()
        )?;
        writeln!(out, "<tr><th>Duration</th><td>{} ms</td></tr>", summary.duration_ms)?;
        writeln!(out, "</table>")?;

        if data.coverage.is_some() {
            writeln!(out, "<h2>Coverage</h2>")?;
            writeln!(out, "<table class=\"coverage\">")?;
            for metric in COVERAGE_METRICS {
                if let Some(pct) = data.coverage_pct(metric) {
                    writeln!(out, "<tr><th>{}</th><td>{:.2}%</td></tr>", metric, pct)?;
                }
            }
            writeln!(out, "</table>")?;
        }

        writeln!(out, "<h2>Test suites</h2>")?;
        writeln!(out, "<ul class=\"suites\">")?;
        for suite in &data.suites {
            let status = match suite.status {
                SuiteStatus::Passed => "passed",
                SuiteStatus::Failed => "failed",
            };
            writeln!(
                out,
                "<li class=\"{}\">{} ({}/{} passed, {} ms)",
                status,
                escape_html(&suite.path),
                suite.passed,
                suite.total,
                suite.duration_ms
            )?;
            if !suite.failed_tests.is_empty() {
                writeln!(out, "<ul>")?;
                for name in &suite.failed_tests {
                    writeln!(out, "<li>{}</li>", escape_html(name))?;
                }
                writeln!(out, "</ul>")?;
            }
            writeln!(out, "</li>")?;
        }
        writeln!(out, "</ul>")?;

        if !data.warnings.is_empty() {
            writeln!(out, "<h2>Data recovery warnings</h2>")?;
            writeln!(out, "<ul class=\"warnings\">")?;
            for warning in &data.warnings {
                writeln!(out, "<li>{}</li>", escape_html(warning))?;
            }
            writeln!(out, "</ul>")?;
        }

        writeln!(out, "<footer>Generated {}</footer>", data.generated_at.to_rfc3339())?;
        writeln!(out, "</body>")?;
        writeln!(out, "</html>")?;
        Ok(out)
    }
}

const STYLE: &str = "body{font-family:sans-serif;margin:2rem}\
table{border-collapse:collapse}th,td{padding:.25rem .75rem;text-align:left}\
.passed{color:#1a7f37}.failed{color:#cf222e}";

#[derive(Debug, Clone, Copy, Default)]
pub struct BasicMarkdownGenerator;

impl ReportGenerator for BasicMarkdownGenerator {
    fn format(&self) -> ReportFormat {
        ReportFormat::Markdown
    }

    fn generate_report(&self, data: &AggregatedData, config: &ReportConfig) -> anyhow::Result<String> {
        let summary = &data.summary;
        let mut out = String::with_capacity(2048);

        writeln!(out, "# {}", config.title)?;
        writeln!(out)?;
        writeln!(
            out,
            "**Status:** {}",
            if summary.success { "passed" } else { "failed" }
        )?;
        writeln!(out)?;
        writeln!(out, "| Metric | Value |")?;
        writeln!(out, "| --- | --- |")?;
        writeln!(out, "| Test suites | {} |", summary.total_suites)?;
        writeln!(out, "| Tests | {} |", summary.total_tests)?;
        writeln!(out, "| Passed | {} |", summary.passed_tests)?;
        writeln!(out, "| Failed | {} |", summary.failed_tests)?;
        writeln!(out, "| Pending | {} |", summary.pending_tests)?;
        writeln!(out, "| Pass rate | {:.1}% |", summary.pass_rate())?;
        writeln!(out, "| Duration | {} ms |", summary.duration_ms)?;

        if data.coverage.is_some() {
            writeln!(out)?;
            writeln!(out, "## Coverage")?;
            writeln!(out)?;
            for metric in COVERAGE_METRICS {
                if let Some(pct) = data.coverage_pct(metric) {
                    writeln!(out, "- {}: {:.2}%", metric, pct)?;
                }
            }
        }

        writeln!(out)?;
        writeln!(out, "## Test suites")?;
        writeln!(out)?;
        for suite in &data.suites {
            let marker = match suite.status {
                SuiteStatus::Passed => "PASS",
                SuiteStatus::Failed => "FAIL",
            };
            writeln!(
                out,
                "- **{}** `{}` ({}/{} passed)",
                marker, suite.path, suite.passed, suite.total
            )?;
            for name in &suite.failed_tests {
                writeln!(out, "  - {}", name)?;
            }
        }

        if !data.warnings.is_empty() {
            writeln!(out)?;
            writeln!(out, "## Data recovery warnings")?;
            writeln!(out)?;
            for warning in &data.warnings {
                writeln!(out, "- {}", warning)?;
            }
        }

        writeln!(out)?;
        writeln!(out, "_Generated {}_", data.generated_at.to_rfc3339())?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::validate_report;
    use serde_json::json;

    fn sample() -> AggregatedData {
        AggregatedData::from_results(&json!({
            "testResults": [{
                "testFilePath": "/src/<widget>.test.js",
                "status": "failed",
                "numTotalTests": 2,
                "numPassingTests": 1,
                "numFailingTests": 1,
                "assertionResults": [
                    {"title": "renders", "status": "passed"},
                    {"title": "handles <empty>", "status": "failed"}
                ]
            }],
            "numTotalTests": 2,
            "numPassedTests": 1,
            "numFailedTests": 1,
            "success": false
        }))
        .with_coverage(json!({"total": {"lines": {"pct": 75.0}, "branches": {"pct": 50.0}}}))
    }

    #[test]
    fn test_html_report_is_valid_and_escaped() {
        let content = BasicHtmlGenerator
            .generate_report(&sample(), &ReportConfig::new("Run <1>", "/tmp"))
            .unwrap();

        assert_eq!(validate_report(ReportFormat::Html, &content), Ok(()));
        assert!(content.contains("<title>Run &lt;1&gt;</title>"));
        assert!(content.contains("/src/&lt;widget&gt;.test.js"));
        assert!(content.contains("handles &lt;empty&gt;"));
        assert!(content.contains("<th>lines</th><td>75.00%</td>"));
    }

    #[test]
    fn test_markdown_report_is_valid() {
        let content = BasicMarkdownGenerator
            .generate_report(&sample(), &ReportConfig::new("Nightly", "/tmp"))
            .unwrap();

        assert_eq!(validate_report(ReportFormat::Markdown, &content), Ok(()));
        assert!(content.starts_with("# Nightly\n"));
        assert!(content.contains("| Failed | 1 |"));
        assert!(content.contains("- **FAIL** `/src/<widget>.test.js` (1/2 passed)"));
        assert!(content.contains("- branches: 50.00%"));
    }

    #[test]
    fn test_warnings_section_only_when_present() {
        let mut data = sample();
        let config = ReportConfig::new("T", "/tmp");
        let without = BasicMarkdownGenerator.generate_report(&data, &config).unwrap();
        assert!(!without.contains("Data recovery warnings"));

        data.warnings.push("Missing numTotalTests, computed 2".to_string());
        let with = BasicMarkdownGenerator.generate_report(&data, &config).unwrap();
        assert!(with.contains("## Data recovery warnings"));
    }
}
