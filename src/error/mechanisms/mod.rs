/// Recovery artifacts produced by the error handler
///
/// When an operation cannot complete normally the handler hands back a
/// typed artifact instead of an untyped blob, so callers pattern-match on
/// what they received.
pub mod fallback;
pub mod partial;

use crate::ReportFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use fallback::{default_config, fallback_directory, fallback_for, fallback_template};
pub use partial::{minimal_test_results, partial_for};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RecoveredData {
    /// Minimal template that renders without the real template engine
    FallbackTemplate { format: ReportFormat, content: String },

    /// Canonical default configuration
    DefaultConfig(serde_json::Value),

    /// Freshly named directory to write into instead
    FallbackDirectory(PathBuf),

    /// Continue without the missing dependency
    BasicMode,

    /// Whatever test data could be salvaged
    PartialTestData { available_data: serde_json::Value },

    /// Summary-only payload for memory or resource pressure
    LightweightSummary { summary: serde_json::Value },

    /// Bare report carrying only the error
    BasicReport { error: String },
}

impl RecoveredData {
    /// True for the artifacts produced by the Partial strategy
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            RecoveredData::PartialTestData { .. }
                | RecoveredData::LightweightSummary { .. }
                | RecoveredData::BasicReport { .. }
        )
    }
}
