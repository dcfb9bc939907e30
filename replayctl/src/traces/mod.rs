//! Read access to the tracing service.
//!
//! The [`TraceSource`] trait is the boundary the rest of the crate depends on; the production
//! implementation is [`client::LangSmithClient`]. A [`TraceConnector`] turns a per-session API
//! key into a ready source, so sessions never share credentials.

pub mod client;
pub mod models;

use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub use client::{LangSmithClient, LangSmithConnector};
pub use models::{Project, RunEvent, RunRecord, RunSummary};

#[async_trait]
pub trait TraceSource: Send + Sync {
    /// All projects visible to the API key.
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Root runs of a project, without errored runs.
    async fn list_root_runs(&self, project: &Project) -> Result<Vec<RunRecord>>;

    /// Runs with the given ids, without errored runs, in the order the service returns them.
    async fn list_runs_by_id(&self, ids: &[Uuid]) -> Result<Vec<RunRecord>>;
}

/// Builds a [`TraceSource`] bound to one API key.
pub trait TraceConnector: Send + Sync {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn TraceSource>>;
}
