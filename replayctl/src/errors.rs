use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// A trace record that does not have the shape a conversation is rebuilt from.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum DataShapeError {
    /// An expected key is absent (or has the wrong JSON type)
    #[error("run {run_id} is missing `{path}`")]
    MissingField { run_id: Uuid, path: String },

    /// The message group exists but holds no messages
    #[error("run {run_id} has an empty message group")]
    EmptyConversation { run_id: Uuid },

    /// A lifecycle event carries a timestamp that is not ISO-8601
    #[error("run {run_id} has an unparseable `{event}` timestamp: {value:?}")]
    InvalidTimestamp { run_id: Uuid, event: String, value: String },

    /// The `end` event is timestamped before the `start` event
    #[error("run {run_id} ends before it starts")]
    EndBeforeStart { run_id: Uuid },
}

#[derive(ThisError, Debug)]
pub enum Error {
    /// A credential needed to enter the replay flow was not supplied
    #[error("{credential} is required")]
    MissingCredential { credential: String },

    /// Trace payload could not be normalized
    #[error(transparent)]
    DataShape(#[from] DataShapeError),

    /// The inference backend call failed (HTTP error, timeout, unreadable body)
    #[error("Inference backend request failed: {message}")]
    Backend { status: Option<u16>, message: String },

    /// The tracing service call failed
    #[error("Tracing service request failed: {message}")]
    TraceService { status: Option<u16>, message: String },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingCredential { .. } => StatusCode::UNAUTHORIZED,
            Error::DataShape(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Backend { .. } => StatusCode::BAD_GATEWAY,
            Error::TraceService { status, .. } => match status {
                Some(401) | Some(403) => StatusCode::UNAUTHORIZED,
                Some(404) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            },
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::MissingCredential { credential } => format!("{credential} is required"),
            Error::DataShape(e) => e.to_string(),
            Error::Backend { status: Some(status), .. } => format!("Inference backend returned HTTP {status}"),
            Error::Backend { status: None, .. } => "Inference backend request failed".to_string(),
            Error::TraceService { status: Some(401), .. } | Error::TraceService { status: Some(403), .. } => {
                "Tracing service rejected the API key".to_string()
            }
            Error::TraceService { status: Some(status), .. } => format!("Tracing service returned HTTP {status}"),
            Error::TraceService { status: None, .. } => "Tracing service request failed".to_string(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }

    /// HTTP status reported by the upstream service, if the error came from one
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Error::Backend { status, .. } | Error::TraceService { status, .. } => *status,
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Backend { .. } | Error::TraceService { .. } => {
                tracing::warn!("Upstream error: {}", self);
            }
            Error::MissingCredential { .. } => {
                tracing::info!("Credential error: {}", self);
            }
            Error::DataShape(_) | Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, axum::response::Json(json!({ "message": self.user_message() }))).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
