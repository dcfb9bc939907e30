use crate::{
    AppState,
    errors::{Error, Result},
    session::Session,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::{ops::Deref, sync::Arc};
use tracing::{instrument, trace};
use uuid::Uuid;

/// Header carrying the id returned by `POST /api/v1/sessions`.
pub const SESSION_HEADER: &str = "x-session-id";

/// The live session of the caller.
///
/// A missing, malformed, unknown or expired session id is rejected the same way: the caller has
/// to supply a tracing-service API key (again) before doing anything else.
pub struct CurrentSession(pub Arc<Session>);

impl Deref for CurrentSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.0
    }
}

fn credential_required() -> Error {
    Error::MissingCredential {
        credential: "tracing service API key".to_string(),
    }
}

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Some(header) = parts.headers.get(SESSION_HEADER) else {
            trace!("No session header");
            return Err(credential_required());
        };

        let session_id = header
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| {
                trace!("Malformed session header");
                credential_required()
            })?;

        match state.sessions.get(session_id).await {
            Some(session) => Ok(CurrentSession(session)),
            None => {
                trace!(%session_id, "Unknown or expired session");
                Err(credential_required())
            }
        }
    }
}
