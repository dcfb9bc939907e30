//! Per-record comparison rows and the aggregate savings of a replay batch.

use crate::normalize::SkippedRun;
use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Share of the original wall-clock time saved by the replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Savings {
    /// Percentage of the original duration, negative when the replay was slower
    Percent(f64),
    /// The original batch took no measurable time
    Undefined,
}

impl Savings {
    pub fn percent(&self) -> Option<f64> {
        match self {
            Savings::Percent(percent) => Some(*percent),
            Savings::Undefined => None,
        }
    }
}

impl fmt::Display for Savings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Savings::Percent(percent) => write!(f, "{percent:.1}%"),
            Savings::Undefined => f.write_str("N/A"),
        }
    }
}

/// Serialized as the percentage, or `null` when undefined.
impl Serialize for Savings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.percent().serialize(serializer)
    }
}

pub fn compute_savings(total_original: f64, total_replay: f64) -> Savings {
    if total_original == 0.0 {
        return Savings::Undefined;
    }
    Savings::Percent(100.0 * (total_original - total_replay) / total_original)
}

/// One successfully replayed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayResult {
    /// Position in the batch
    pub index: usize,
    pub run_id: Uuid,
    pub input_preview: String,
    pub original_duration: f64,
    /// Wall-clock seconds measured around the backend call
    pub replay_duration: f64,
    /// Seconds the backend says it spent, if it says
    pub reported_duration: Option<f64>,
    pub original_output: String,
    pub replay_output: String,
}

/// A record whose backend call failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayFailure {
    pub index: usize,
    pub run_id: Uuid,
    pub input_preview: String,
    pub error: String,
    /// Upstream HTTP status, when there was a response
    pub status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_original_duration: f64,
    pub total_replay_duration: f64,
    pub savings: Savings,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The full outcome of a replay batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsReport {
    /// In batch order
    pub rows: Vec<ReplayResult>,
    pub failures: Vec<ReplayFailure>,
    pub skipped: Vec<SkippedRun>,
    pub summary: BatchSummary,
}

impl SavingsReport {
    /// Totals cover the successful rows only.
    pub fn new(mut rows: Vec<ReplayResult>, mut failures: Vec<ReplayFailure>, skipped: Vec<SkippedRun>) -> Self {
        rows.sort_by_key(|row| row.index);
        failures.sort_by_key(|failure| failure.index);

        let total_original_duration: f64 = rows.iter().fold(0.0, |acc, row| acc + row.original_duration);
        let total_replay_duration: f64 = rows.iter().fold(0.0, |acc, row| acc + row.replay_duration);

        let summary = BatchSummary {
            total_original_duration,
            total_replay_duration,
            savings: compute_savings(total_original_duration, total_replay_duration),
            succeeded: rows.len(),
            failed: failures.len(),
            skipped: skipped.len(),
        };

        Self {
            rows,
            failures,
            skipped,
            summary,
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Saved {}, replay time: {:.1} vs. original time: {:.1} seconds",
            self.summary.savings, self.summary.total_replay_duration, self.summary.total_original_duration
        )
    }
}
