use crate::AppState;
use crate::auth::CurrentSession;
use crate::errors::Error;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt, wrappers::WatchStream};
use uuid::Uuid;

// GET /replays/{id}/events - Progress of a streamed replay; the final event carries the report
pub async fn replay_events(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(replay_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    let replay = state
        .replays
        .get(&replay_id)
        .await
        .filter(|replay| replay.session_id == session.id)
        .ok_or_else(|| Error::NotFound {
            resource: "Replay".to_string(),
            id: replay_id.to_string(),
        })?;

    // Ends once the replay task drops its sender, after the final event
    let stream = WatchStream::new(replay.events).map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().event(event.name()).data(json))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
