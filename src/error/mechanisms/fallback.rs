/// Fallback artifacts - synthetic substitutes for things that could not be produced
use super::RecoveredData;
use crate::error::{ErrorKind, ReportingError};
use crate::ReportFormat;
use std::path::PathBuf;

/// Build the fallback artifact for an error, if its kind has one
pub fn fallback_for(error: &ReportingError) -> Option<RecoveredData> {
    match error.kind {
        ErrorKind::TemplateRendering | ErrorKind::TemplateNotFound => {
            let format = error
                .context
                .as_ref()
                .and_then(|ctx| ctx.report_format)
                .unwrap_or(ReportFormat::Html);
            Some(RecoveredData::FallbackTemplate {
                format,
                content: fallback_template(format, &error.message),
            })
        }
        ErrorKind::Configuration | ErrorKind::ConfigurationNotFound | ErrorKind::InvalidFormat => {
            Some(RecoveredData::DefaultConfig(default_config()))
        }
        ErrorKind::OutputDirectory => Some(RecoveredData::FallbackDirectory(fallback_directory())),
        ErrorKind::Dependency | ErrorKind::MissingDependency => Some(RecoveredData::BasicMode),
        _ => None,
    }
}

/// Minimal report body that passes structural validation for its format
pub fn fallback_template(format: ReportFormat, reason: &str) -> String {
    let generated = chrono::Utc::now().to_rfc3339();
    match format {
        ReportFormat::Html => format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Test Report</title></head>\n\
             <body>\n<h1>Test Report</h1>\n<p>The full report could not be rendered: {}</p>\n\
             <p>Generated {}</p>\n</body>\n</html>\n",
            escape_html(reason),
            generated
        ),
        ReportFormat::Markdown => format!(
            "# Test Report\n\nThe full report could not be rendered: {}\n\n_Generated {}_\n",
            reason, generated
        ),
        ReportFormat::Json => serde_json::json!({
            "fallback": true,
            "reason": reason,
            "generatedAt": generated,
        })
        .to_string(),
    }
}

/// Canonical configuration used when the real one cannot be loaded
pub fn default_config() -> serde_json::Value {
    serde_json::json!({
        "outputDirectory": "test-reports",
        "formats": ["html", "json"],
        "includeCoverage": true,
        "includePerformance": false,
        "theme": "default",
    })
}

/// Fresh directory name under the system temp dir
pub fn fallback_directory() -> PathBuf {
    let millis = chrono::Utc::now().timestamp_millis();
    std::env::temp_dir().join(format!("test-reports-fallback-{}", millis))
}

pub(crate) fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
