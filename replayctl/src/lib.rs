//! # replayctl: replay LLM traces against a faster backend
//!
//! `replayctl` reads historical language-model conversations from a LangSmith-compatible tracing
//! service, sends every captured prompt to an OpenAI-compatible inference backend (Groq by
//! default), and reports how much wall-clock time the replay saved compared with the original
//! run, next to both outputs.
//!
//! ## Architecture
//!
//! Data flows one way through the core:
//!
//! 1. **[`traces`]**: fetches projects and runs from the tracing service
//! 2. **[`normalize`]**: turns a root run and its children into conversation records, each with
//!    its messages, original output and original duration
//! 3. **[`conversation`]**: rebuilds role-typed messages from a record
//! 4. **[`replay`]**: calls the backend once per record and times each call
//! 5. **[`savings`]**: aggregates totals and the percentage of time saved
//!
//! Two thin surfaces sit on top: an HTTP API ([`api`], served by [`Application`]) and one-shot
//! terminal commands ([`cli`]). Per-user state lives in [`session::SessionStore`], never in
//! globals.
//!
//! ## Configuration
//!
//! See [`config`] for the YAML file and the environment variables that override it.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod inference;
pub mod normalize;
pub mod replay;
pub mod savings;
pub mod session;
pub mod telemetry;
pub mod traces;

#[cfg(test)]
mod test_utils;

use crate::api::models::replays::{ReplayRetention, StreamedReplay};
use crate::inference::{InferenceBackend, OpenAiCompatibleBackend};
use crate::session::SessionStore;
use crate::traces::{LangSmithConnector, TraceConnector};
use axum::{
    Router,
    routing::{delete, get, post},
};
use bon::Builder;
pub use config::Config;
use moka::future::Cache;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, warn};
use uuid::Uuid;

/// Application state shared across all request handlers.
///
/// - `config`: Application configuration loaded from file/environment
/// - `sessions`: Live sessions and their cached project lists
/// - `backend`: The inference backend, `None` when no API key is configured
/// - `replays`: Streamed replays, kept for `sessions.replay_retention` after they finish
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    pub backend: Option<Arc<dyn InferenceBackend>>,
    pub replays: Cache<Uuid, StreamedReplay>,
}

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/sessions", post(api::handlers::sessions::create_session))
        .route("/sessions/current", delete(api::handlers::sessions::end_session))
        .route("/projects", get(api::handlers::projects::list_projects))
        .route("/projects/{name}/runs", get(api::handlers::projects::list_runs))
        .route("/runs/{id}/conversations", get(api::handlers::runs::list_conversations))
        .route("/runs/{id}/replay", post(api::handlers::runs::replay_run))
        .route("/replays/{id}/events", get(api::handlers::replays::replay_events))
        .with_state(state);

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The HTTP server.
///
/// 1. **Create**: [`Application::new`] connects the configured services and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown signal resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application using the tracing service and backend from `config`
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!(
            tracing_service = %config.tracing_service.url,
            inference = %config.inference.url,
            model = %config.inference.model,
            "Starting replayctl"
        );

        let connector = Arc::new(LangSmithConnector::new(config.tracing_service.clone()));
        let backend: Option<Arc<dyn InferenceBackend>> = match OpenAiCompatibleBackend::new(&config.inference) {
            Ok(backend) => Some(Arc::new(backend)),
            Err(errors::Error::MissingCredential { .. }) => {
                warn!("No inference backend API key configured, replays will be refused");
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::new_with_services(config, connector, backend))
    }

    /// Create an application around the given tracing connector and backend
    pub fn new_with_services(
        config: Config,
        connector: Arc<dyn TraceConnector>,
        backend: Option<Arc<dyn InferenceBackend>>,
    ) -> Self {
        let sessions = SessionStore::new(&config.sessions, connector);
        let replays = Cache::builder()
            .expire_after(ReplayRetention(config.sessions.replay_retention))
            .max_capacity(config.sessions.max_sessions)
            .build();

        let app_state = AppState::builder()
            .config(config.clone())
            .sessions(sessions)
            .maybe_backend(backend)
            .replays(replays)
            .build();

        Self {
            router: build_router(app_state),
            config,
        }
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "replayctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}
