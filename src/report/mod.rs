//! JSON snapshot of reassembler state for the CLI

use serde::Serialize;

use crate::psi::AitOutcome;
use crate::stats::{DropCounters, ReassemblyStats};

/// JSON structure for a report (internal serialization)
#[derive(Serialize)]
struct ReportJson<'a> {
    ts_time: String,
    stats: &'a ReassemblyStats,
    counters: &'a DropCounters,
    #[serde(skip_serializing_if = "Option::is_none")]
    ait: Option<&'a AitOutcome>,
}

/// Report generator for reassembly snapshots
pub struct Reporter;

impl Reporter {
    /// Generate pretty-printed JSON string for CLI output
    pub fn generate_json_report(
        stats: &ReassemblyStats,
        counters: &DropCounters,
        ait: Option<&AitOutcome>,
    ) -> String {
        let rep = ReportJson {
            ts_time: chrono::Utc::now().to_rfc3339(),
            stats,
            counters,
            ait,
        };
        serde_json::to_string_pretty(&rep)
            .unwrap_or_else(|_| "{\"error\": \"JSON serialization failed\"}".to_string())
    }
}
