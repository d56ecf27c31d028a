//! Per-operator and run-level build statistics.
//!
//! Every recovered problem (skipped rows, dropped routes, deduplicated
//! patterns, unrecognized mode codes) is counted here so the run can report
//! a single summary instead of flooding the log.

use std::collections::BTreeSet;

use serde::Serialize;

/// Parsed/skipped row counts for one feed table.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct TableCounts {
    pub parsed: usize,
    pub skipped: usize,
}

/// Statistics for one operator's Feed Reader -> Shape Resolver -> Geometry
/// Builder chain.
#[derive(Debug, Default, Serialize)]
pub struct OperatorSummary {
    pub operator: String,

    pub stops: TableCounts,
    pub routes: TableCounts,
    pub trips: TableCounts,
    pub shape_points: TableCounts,
    pub stop_times: TableCounts,

    pub routes_emitted: usize,
    pub routes_dropped_no_shape: usize,
    pub patterns_emitted: usize,
    pub patterns_deduplicated: usize,

    /// Distinct unrecognized route_type codes seen in this feed.
    pub unknown_mode_codes: BTreeSet<i32>,

    /// Set when the whole feed was unusable (mandatory table missing).
    pub error: Option<String>,
}

impl OperatorSummary {
    pub fn new(operator: &str) -> Self {
        OperatorSummary {
            operator: operator.to_string(),
            ..Default::default()
        }
    }

    pub fn from_error(operator: &str, error: &str) -> Self {
        OperatorSummary {
            operator: operator.to_string(),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn total_skipped_rows(&self) -> usize {
        self.stops.skipped
            + self.routes.skipped
            + self.trips.skipped
            + self.shape_points.skipped
            + self.stop_times.skipped
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate over all operators; drives the process exit code.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub operators: Vec<OperatorSummary>,
}

impl RunSummary {
    pub fn failed_operators(&self) -> usize {
        self.operators.iter().filter(|o| o.failed()).count()
    }

    pub fn all_failed(&self) -> bool {
        !self.operators.is_empty() && self.failed_operators() == self.operators.len()
    }

    /// Distinct unrecognized route_type codes across the whole run.
    pub fn unknown_mode_codes(&self) -> BTreeSet<i32> {
        self.operators
            .iter()
            .flat_map(|o| o.unknown_mode_codes.iter().copied())
            .collect()
    }
}
