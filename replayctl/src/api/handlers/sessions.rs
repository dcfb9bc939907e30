use crate::AppState;
use crate::api::models::sessions::{CreateSession, SessionCreated};
use crate::auth::CurrentSession;
use crate::errors::Error;
use axum::{Json, extract::State, http::StatusCode};

// POST /sessions - Open a session for a tracing service API key
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSession>,
) -> Result<(StatusCode, Json<SessionCreated>), Error> {
    let api_key = request.api_key.trim();
    if api_key.is_empty() {
        return Err(Error::BadRequest {
            message: "api_key cannot be empty".to_string(),
        });
    }

    let session = state.sessions.create(api_key).await?;
    Ok((StatusCode::CREATED, Json(SessionCreated { session_id: session.id })))
}

// DELETE /sessions/current - End the caller's session and drop its cached data
pub async fn end_session(State(state): State<AppState>, session: CurrentSession) -> Result<StatusCode, Error> {
    state.sessions.remove(session.id).await;
    Ok(StatusCode::NO_CONTENT)
}
