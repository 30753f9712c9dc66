/// Structural checks on generated report content
use crate::ReportFormat;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("report is empty")]
    Empty,

    #[error("HTML report is missing {0}")]
    MissingHtmlMarker(&'static str),

    #[error("Markdown report has no heading")]
    MissingHeading,

    #[error("JSON report does not parse: {0}")]
    InvalidJson(String),
}

/// Validate report content for its format
pub fn validate_report(format: ReportFormat, content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    match format {
        ReportFormat::Html => {
            let lower = content.to_ascii_lowercase();
            if !lower.contains("<!doctype html>") {
                return Err(ValidationError::MissingHtmlMarker("<!DOCTYPE html>"));
            }
            if !lower.contains("</html>") {
                return Err(ValidationError::MissingHtmlMarker("</html>"));
            }
            Ok(())
        }
        ReportFormat::Markdown => {
            if content.lines().any(|line| line.trim_start().starts_with('#')) {
                Ok(())
            } else {
                Err(ValidationError::MissingHeading)
            }
        }
        ReportFormat::Json => serde_json::from_str::<serde_json::Value>(content)
            .map(|_| ())
            .map_err(|e| ValidationError::InvalidJson(e.to_string())),
    }
}
