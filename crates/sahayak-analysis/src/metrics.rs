use std::time::Duration;

use schemars::JsonSchema;
use serde::Serialize;

/// Rolling performance metrics consumed by the dashboard view. Mutated only
/// by the orchestrator, and only after a run completes successfully.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    /// Catalog size; constant for the life of the process.
    pub schemes_analyzed: usize,
    /// Number of completed analysis runs. +1 per run, not per program.
    pub checks_performed: u64,
    /// Wall-clock time of the most recent run, e.g. "3.2s".
    pub avg_response_time: String,
    /// Eligible verdicts in the most recent result set.
    pub eligible_count: usize,
}

impl DashboardMetrics {
    pub fn new(schemes_analyzed: usize) -> Self {
        Self {
            schemes_analyzed,
            checks_performed: 0,
            avg_response_time: format_seconds(Duration::ZERO),
            eligible_count: 0,
        }
    }

    pub fn record_run(&mut self, elapsed: Duration, eligible_count: usize) {
        self.checks_performed += 1;
        self.avg_response_time = format_seconds(elapsed);
        self.eligible_count = eligible_count;
    }
}

/// One decimal place of seconds, the format the dashboard displays.
pub fn format_seconds(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}
