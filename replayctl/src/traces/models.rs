//! Wire types of the tracing service.
//!
//! Only the envelope of a run is typed here. `inputs` and `outputs` stay loosely typed JSON
//! because their shape depends on the traced framework; [`crate::normalize`] validates them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracing project (LangSmith calls these "sessions").
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One recorded execution unit, either a root invocation or a nested one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    /// "llm", "chain", "tool", ... Only "llm" runs are replayed.
    #[serde(default)]
    pub run_type: String,
    #[serde(default)]
    pub inputs: serde_json::Value,
    #[serde(default)]
    pub outputs: Option<serde_json::Value>,
    /// `None` when the service recorded no children at all
    #[serde(default)]
    pub child_run_ids: Option<Vec<Uuid>>,
    /// ISO-8601, as reported by the service
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub events: Vec<RunEvent>,
}

/// A timestamped lifecycle event ("start", "new_token", "end", ...).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunEvent {
    pub name: String,
    #[serde(default)]
    pub time: Option<String>,
}

/// A root run as shown in a run picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub start_time: Option<String>,
    /// Start time followed by the beginning of the run's output
    pub label: String,
}

/// Characters of the output payload shown in a run label.
pub const RUN_LABEL_OUTPUT_CHARS: usize = 30;

impl RunSummary {
    pub fn from_run(run: &RunRecord) -> Self {
        let start_time = run.start_time.clone().unwrap_or_default();
        let outputs = match &run.outputs {
            Some(outputs) => outputs.to_string(),
            None => "null".to_string(),
        };
        let preview: String = outputs.chars().take(RUN_LABEL_OUTPUT_CHARS).collect();

        Self {
            id: run.id,
            start_time: run.start_time.clone(),
            label: format!("{start_time} {preview}"),
        }
    }
}

/// Body of `POST /api/v1/runs/query`.
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct RunQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_root: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<&'static str>>,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// One page of a run query.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RunsPage {
    #[serde(default)]
    pub runs: Vec<RunRecord>,
    #[serde(default)]
    pub cursors: Cursors,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Cursors {
    #[serde(default)]
    pub next: Option<String>,
}
