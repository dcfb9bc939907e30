use crate::AppState;
use crate::api::models::replays::{ReplayAccepted, ReplayEvent, ReplayRequest, StreamedReplay, WatchProgress};
use crate::auth::CurrentSession;
use crate::errors::Error;
use crate::normalize::{NormalizationReport, load_conversations};
use crate::replay::{LogProgress, ReplayEngine};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

// GET /runs/{id}/conversations - Normalized conversations of a trace, before any replay
pub async fn list_conversations(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(run_id): Path<Uuid>,
) -> Result<Json<NormalizationReport>, Error> {
    let report = load_conversations(session.traces(), run_id, state.config.replay.strict_normalization).await?;
    Ok(Json(report))
}

// POST /runs/{id}/replay - Replay every conversation of a trace against the inference backend
pub async fn replay_run(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(run_id): Path<Uuid>,
    Json(request): Json<ReplayRequest>,
) -> Result<Response, Error> {
    // checked before any call to either service
    let backend = state.backend.clone().ok_or_else(|| Error::MissingCredential {
        credential: "inference backend API key".to_string(),
    })?;

    let mut replay_config = state.config.replay.clone();
    if let Some(concurrency) = request.concurrency {
        if concurrency == 0 {
            return Err(Error::BadRequest {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        replay_config.concurrency = concurrency;
    }
    if let Some(fail_fast) = request.fail_fast {
        replay_config.fail_fast = fail_fast;
    }

    let batch = load_conversations(session.traces(), run_id, replay_config.strict_normalization).await?;
    let engine = ReplayEngine::new(backend, &replay_config);

    if !request.stream_progress {
        let report = engine.run(batch, &LogProgress).await?;
        return Ok(Json(report).into_response());
    }

    let replay_id = Uuid::new_v4();
    let total = batch.records.len();
    let (sender, events) = watch::channel(ReplayEvent::Progress {
        completed: 0,
        total,
        failed: 0,
        percent: 0.0,
    });
    state
        .replays
        .insert(
            replay_id,
            StreamedReplay {
                session_id: session.id,
                events,
                finished: false,
            },
        )
        .await;

    info!(%replay_id, %run_id, total, "Starting streamed replay");
    let replays = state.replays.clone();
    let session_id = session.id;
    tokio::spawn(async move {
        let progress = WatchProgress(sender);
        let event = match engine.run(batch, &progress).await {
            Ok(report) => ReplayEvent::Completed { report },
            Err(e) => {
                warn!(%replay_id, error = %e, "Streamed replay failed");
                ReplayEvent::Failed {
                    message: e.user_message(),
                }
            }
        };
        progress.0.send_replace(event);

        // retention is counted from here
        replays
            .insert(
                replay_id,
                StreamedReplay {
                    session_id,
                    events: progress.0.subscribe(),
                    finished: true,
                },
            )
            .await;
    });

    Ok((StatusCode::ACCEPTED, Json(ReplayAccepted { replay_id, total })).into_response())
}
