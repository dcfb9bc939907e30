//! Trace normalization: a root run and its children become a flat list of replayable
//! conversation records.
//!
//! Each `llm` child run contributes one record built from three places in the loosely-typed
//! payload:
//!
//! - `inputs.messages[0]`: the message group, each element's `kwargs` is a [`MessageDescriptor`]
//! - `outputs.generations[0][0].text`: the original completion
//! - the first `start` and first `end` lifecycle events: the original duration
//!
//! Every lookup failure is reported as a [`DataShapeError`] naming the run and the missing path.

use crate::conversation::MessageDescriptor;
use crate::errors::{DataShapeError, Error, Result};
use crate::traces::{RunEvent, RunRecord, TraceSource};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub const LLM_RUN_TYPE: &str = "llm";

/// A replayable conversation taken from one `llm` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedConversationRecord {
    pub run_id: Uuid,
    /// Never empty
    pub messages: Vec<MessageDescriptor>,
    pub original_output: String,
    pub original_duration_seconds: f64,
}

impl NormalizedConversationRecord {
    /// The first `max_chars` characters of the record's input messages.
    pub fn input_preview(&self, max_chars: usize) -> String {
        let rendered = serde_json::to_string(&self.messages).unwrap_or_default();
        rendered.chars().take(max_chars).collect()
    }
}

/// A run that could not be normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRun {
    pub run_id: Uuid,
    pub reason: String,
}

/// Records in service order, plus the runs that were left out because of their shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub records: Vec<NormalizedConversationRecord>,
    pub skipped: Vec<SkippedRun>,
}

/// Fetches the runs that make up a trace.
///
/// A root run without recorded children (`child_run_ids` is null) is its own leaf execution
/// and is returned as the only run. An explicitly empty child list yields no runs.
#[instrument(skip(source))]
pub async fn fetch_trace<S: TraceSource + ?Sized>(source: &S, root_run_id: Uuid) -> Result<Vec<RunRecord>> {
    let mut roots = source.list_runs_by_id(&[root_run_id]).await?;
    let root = match roots.iter().position(|run| run.id == root_run_id) {
        Some(index) => roots.swap_remove(index),
        None => {
            return Err(Error::NotFound {
                resource: "Run".to_string(),
                id: root_run_id.to_string(),
            });
        }
    };

    let Some(child_ids) = root.child_run_ids.clone() else {
        debug!("Root run has no children, treating it as its own leaf");
        return Ok(vec![root]);
    };

    if child_ids.is_empty() {
        return Ok(Vec::new());
    }
    source.list_runs_by_id(&child_ids).await
}

/// Fetches a trace and normalizes it.
pub async fn load_conversations<S: TraceSource + ?Sized>(
    source: &S,
    root_run_id: Uuid,
    strict: bool,
) -> Result<NormalizationReport> {
    let runs = fetch_trace(source, root_run_id).await?;
    Ok(normalize_trace(&runs, strict)?)
}

/// Normalizes every `llm` run, preserving order.
///
/// In strict mode the first malformed run aborts normalization. Otherwise malformed runs are
/// logged and listed in [`NormalizationReport::skipped`].
pub fn normalize_trace(runs: &[RunRecord], strict: bool) -> std::result::Result<NormalizationReport, DataShapeError> {
    let mut report = NormalizationReport::default();

    for run in runs {
        match normalize_run(run) {
            Ok(Some(record)) => report.records.push(record),
            Ok(None) => {}
            Err(e) if strict => return Err(e),
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "Skipping malformed run");
                report.skipped.push(SkippedRun {
                    run_id: run.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        records = report.records.len(),
        skipped = report.skipped.len(),
        runs = runs.len(),
        "Normalized trace"
    );
    Ok(report)
}

/// Normalizes a single run. Returns `Ok(None)` for runs that are not `llm` runs.
pub fn normalize_run(run: &RunRecord) -> std::result::Result<Option<NormalizedConversationRecord>, DataShapeError> {
    if run.run_type != LLM_RUN_TYPE {
        return Ok(None);
    }

    Ok(Some(NormalizedConversationRecord {
        run_id: run.id,
        messages: extract_messages(run)?,
        original_output: extract_output(run)?,
        original_duration_seconds: original_duration(run)?,
    }))
}

fn missing(run: &RunRecord, path: impl Into<String>) -> DataShapeError {
    DataShapeError::MissingField {
        run_id: run.id,
        path: path.into(),
    }
}

fn extract_messages(run: &RunRecord) -> std::result::Result<Vec<MessageDescriptor>, DataShapeError> {
    let group = run
        .inputs
        .get("messages")
        .and_then(|groups| groups.get(0))
        .and_then(Value::as_array)
        .ok_or_else(|| missing(run, "inputs.messages[0]"))?;

    if group.is_empty() {
        return Err(DataShapeError::EmptyConversation { run_id: run.id });
    }

    group
        .iter()
        .enumerate()
        .map(|(i, message)| {
            let kwargs = message
                .get("kwargs")
                .and_then(Value::as_object)
                .ok_or_else(|| missing(run, format!("inputs.messages[0][{i}].kwargs")))?;
            let content = kwargs
                .get("content")
                .and_then(content_text)
                .ok_or_else(|| missing(run, format!("inputs.messages[0][{i}].kwargs.content")))?;

            Ok(MessageDescriptor {
                message_type: kwargs.get("type").and_then(Value::as_str).map(str::to_owned),
                content,
            })
        })
        .collect()
}

/// Message content is either a string or a list of content parts; text parts are joined.
fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.as_str()),
                    Value::Object(part) => part.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn extract_output(run: &RunRecord) -> std::result::Result<String, DataShapeError> {
    run.outputs
        .as_ref()
        .and_then(|outputs| outputs.get("generations"))
        .and_then(|generations| generations.get(0))
        .and_then(|candidates| candidates.get(0))
        .and_then(|generation| generation.get("text"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| missing(run, "outputs.generations[0][0].text"))
}

/// Seconds between the first `start` and the first `end` event, or zero when either is absent.
fn original_duration(run: &RunRecord) -> std::result::Result<f64, DataShapeError> {
    let start = run.events.iter().find(|event| event.name == "start");
    let end = run.events.iter().find(|event| event.name == "end");

    let (Some(start), Some(end)) = (start, end) else {
        warn!(run_id = %run.id, "Run has no start/end event pair, original duration counts as zero");
        return Ok(0.0);
    };

    let elapsed = event_time(run, end)? - event_time(run, start)?;
    if elapsed < TimeDelta::zero() {
        return Err(DataShapeError::EndBeforeStart { run_id: run.id });
    }
    Ok(match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => elapsed.num_milliseconds() as f64 / 1_000.0,
    })
}

fn event_time(run: &RunRecord, event: &RunEvent) -> std::result::Result<DateTime<Utc>, DataShapeError> {
    let value = event
        .time
        .as_deref()
        .ok_or_else(|| missing(run, format!("events[{}].time", event.name)))?;

    parse_timestamp(value).ok_or_else(|| DataShapeError::InvalidTimestamp {
        run_id: run.id,
        event: event.name.clone(),
        value: value.to_string(),
    })
}

/// Parses an ISO-8601 timestamp. Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
