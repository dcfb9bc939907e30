//! HTTP surface over the replay core.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response bodies
//!
//! # API Structure
//!
//! - **Sessions** (`/api/v1/sessions`): open a session with a tracing-service API key, end it
//! - **Projects** (`/api/v1/projects/*`): project list and root runs of a project
//! - **Runs** (`/api/v1/runs/{id}/*`): normalized conversations of a trace, replay
//! - **Replays** (`/api/v1/replays/{id}/events`): progress of a streamed replay (SSE)
//!
//! Every route except session creation and `/healthz` needs the `x-session-id` header.

pub mod handlers;
pub mod models;
