//! The replay loop: every normalized conversation is sent to the inference backend once and
//! the wall-clock time of each call is compared with the time the original run took.
//!
//! Calls run one at a time unless `replay.concurrency` allows more. Outcomes are always
//! consumed in batch order, so rows, progress counts and totals do not depend on which call
//! finishes first.

use crate::config::ReplayConfig;
use crate::conversation::build_conversation;
use crate::errors::{Error, Result};
use crate::inference::InferenceBackend;
use crate::normalize::{NormalizationReport, NormalizedConversationRecord};
use crate::savings::{ReplayFailure, ReplayResult, SavingsReport};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Running,
    Completed,
    Failed,
}

/// Where a batch stands after each finished call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub status: ProgressStatus,
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
}

impl ProgressUpdate {
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }
}

/// Receives progress while a batch runs.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate);
}

/// Logs "Finished i of n calls".
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, update: &ProgressUpdate) {
        match update.status {
            ProgressStatus::Running if update.completed > 0 => info!(
                percent = update.percent_complete().round(),
                "Finished {} of {} calls", update.completed, update.total
            ),
            ProgressStatus::Running => {}
            ProgressStatus::Completed => info!(failed = update.failed, "Replay finished, {} calls", update.total),
            ProgressStatus::Failed => warn!("Replay aborted after {} of {} calls", update.completed, update.total),
        }
    }
}

enum RecordOutcome {
    Replayed(ReplayResult),
    Failed { failure: ReplayFailure, error: Error },
}

pub struct ReplayEngine<B> {
    backend: B,
    concurrency: usize,
    fail_fast: bool,
    preview_chars: usize,
}

impl<B: InferenceBackend> ReplayEngine<B> {
    pub fn new(backend: B, config: &ReplayConfig) -> Self {
        Self {
            backend,
            concurrency: config.concurrency.max(1),
            fail_fast: config.fail_fast,
            preview_chars: config.preview_chars,
        }
    }

    /// Replays every record of `batch` and builds the savings report.
    ///
    /// A failed call is recorded and excluded from the totals; with `fail_fast` it aborts the
    /// batch instead and its error is returned.
    #[instrument(skip_all, fields(records = batch.records.len(), model = %self.backend.model(), concurrency = self.concurrency))]
    pub async fn run(&self, batch: NormalizationReport, progress: &dyn ProgressSink) -> Result<SavingsReport> {
        let NormalizationReport { records, skipped } = batch;
        let total = records.len();
        let mut update = ProgressUpdate {
            status: ProgressStatus::Running,
            completed: 0,
            total,
            failed: 0,
        };
        progress.report(&update);

        let mut rows = Vec::with_capacity(total);
        let mut failures = Vec::new();

        let calls: Vec<_> = records
            .iter()
            .enumerate()
            .map(|(index, record)| self.replay_record(index, record))
            .collect();
        let mut outcomes = stream::iter(calls).buffered(self.concurrency);

        while let Some(outcome) = outcomes.next().await {
            update.completed += 1;
            match outcome {
                RecordOutcome::Replayed(row) => rows.push(row),
                RecordOutcome::Failed { failure, error } => {
                    update.failed += 1;
                    if self.fail_fast {
                        update.status = ProgressStatus::Failed;
                        progress.report(&update);
                        return Err(error);
                    }
                    failures.push(failure);
                }
            }
            progress.report(&update);
        }

        update.status = ProgressStatus::Completed;
        progress.report(&update);

        let report = SavingsReport::new(rows, failures, skipped);
        info!(
            savings = %report.summary.savings,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            "{}",
            report.summary_line()
        );
        Ok(report)
    }

    async fn replay_record(&self, index: usize, record: &NormalizedConversationRecord) -> RecordOutcome {
        let conversation = build_conversation(&record.messages);
        let input_preview = record.input_preview(self.preview_chars);

        let start = Instant::now();
        let result = self.backend.complete(&conversation).await;
        let replay_duration = start.elapsed().as_secs_f64();

        match result {
            Ok(completion) => {
                debug!(
                    index,
                    run_id = %record.run_id,
                    original_duration = record.original_duration_seconds,
                    replay_duration,
                    replay_output = %completion.content,
                    "Replayed record"
                );
                RecordOutcome::Replayed(ReplayResult {
                    index,
                    run_id: record.run_id,
                    input_preview,
                    original_duration: record.original_duration_seconds,
                    replay_duration,
                    reported_duration: completion.reported_total_time,
                    original_output: record.original_output.clone(),
                    replay_output: completion.content,
                })
            }
            Err(error) => {
                warn!(index, run_id = %record.run_id, error = %error, "Replay call failed");
                RecordOutcome::Failed {
                    failure: ReplayFailure {
                        index,
                        run_id: record.run_id,
                        input_preview,
                        error: error.to_string(),
                        status: error.upstream_status(),
                    },
                    error,
                }
            }
        }
    }
}
