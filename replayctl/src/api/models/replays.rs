use crate::replay::{ProgressSink, ProgressStatus, ProgressUpdate};
use crate::savings::SavingsReport;
use moka::Expiry;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use uuid::Uuid;

/// Body of `POST /api/v1/runs/{id}/replay`. Unset fields fall back to the `replay` config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplayRequest {
    /// Run in the background and report progress over SSE instead of answering with the report
    pub stream_progress: bool,
    pub concurrency: Option<usize>,
    pub fail_fast: Option<bool>,
}

/// Answer to a streamed replay request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayAccepted {
    pub replay_id: Uuid,
    /// Number of backend calls the replay will make
    pub total: usize,
}

/// One server-sent event of a streamed replay. The last event is `completed` or `failed`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    Progress {
        completed: usize,
        total: usize,
        failed: usize,
        percent: f64,
    },
    Completed {
        report: SavingsReport,
    },
    Failed {
        message: String,
    },
}

impl ReplayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ReplayEvent::Progress { .. } => "progress",
            ReplayEvent::Completed { .. } => "completed",
            ReplayEvent::Failed { .. } => "failed",
        }
    }
}

impl From<&ProgressUpdate> for ReplayEvent {
    fn from(update: &ProgressUpdate) -> Self {
        ReplayEvent::Progress {
            completed: update.completed,
            total: update.total,
            failed: update.failed,
            percent: update.percent_complete(),
        }
    }
}

/// A replay running in the background, owned by one session.
#[derive(Clone)]
pub struct StreamedReplay {
    pub session_id: Uuid,
    pub events: watch::Receiver<ReplayEvent>,
    /// Set once the final event has been published
    pub finished: bool,
}

/// Expiry for the replay registry: running replays never expire, finished ones are kept for
/// the retention period counted from completion.
pub struct ReplayRetention(pub Duration);

impl ReplayRetention {
    fn remaining(&self, replay: &StreamedReplay) -> Option<Duration> {
        replay.finished.then_some(self.0)
    }
}

impl Expiry<Uuid, StreamedReplay> for ReplayRetention {
    fn expire_after_create(&self, _id: &Uuid, replay: &StreamedReplay, _created_at: Instant) -> Option<Duration> {
        self.remaining(replay)
    }

    fn expire_after_update(
        &self,
        _id: &Uuid,
        replay: &StreamedReplay,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.remaining(replay)
    }
}

/// Publishes progress to SSE subscribers. Only the latest update is kept; slow subscribers
/// skip intermediate ones.
pub struct WatchProgress(pub watch::Sender<ReplayEvent>);

impl ProgressSink for WatchProgress {
    fn report(&self, update: &ProgressUpdate) {
        // completion is published with the report once the engine returns
        if update.status == ProgressStatus::Running {
            self.0.send_replace(ReplayEvent::from(update));
        }
    }
}
