//! Per-user session context.
//!
//! A session binds one tracing-service API key to a connected [`TraceSource`] and caches the
//! project list for the session's lifetime. Sessions expire after `sessions.idle_timeout`
//! without use; removing or expiring a session drops its cache with it.

use crate::config::SessionConfig;
use crate::errors::{Error, Result};
use crate::traces::{Project, TraceConnector, TraceSource};
use moka::future::Cache;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

pub struct Session {
    pub id: Uuid,
    traces: Arc<dyn TraceSource>,
    projects: OnceCell<Vec<Project>>,
}

impl Session {
    pub fn new(traces: Arc<dyn TraceSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            traces,
            projects: OnceCell::new(),
        }
    }

    pub fn traces(&self) -> &dyn TraceSource {
        self.traces.as_ref()
    }

    /// The project list, fetched on first use and cached for the rest of the session.
    pub async fn projects(&self) -> Result<&[Project]> {
        let projects = self
            .projects
            .get_or_try_init(|| async {
                debug!(session_id = %self.id, "Project list not cached, fetching");
                self.traces.list_projects().await
            })
            .await?;
        Ok(projects.as_slice())
    }

    pub async fn project_by_name(&self, name: &str) -> Result<Project> {
        self.projects()
            .await?
            .iter()
            .find(|project| project.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                resource: "Project".to_string(),
                id: name.to_string(),
            })
    }
}

/// Live sessions, keyed by session id.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<Uuid, Arc<Session>>,
    connector: Arc<dyn TraceConnector>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig, connector: Arc<dyn TraceConnector>) -> Self {
        let sessions = Cache::builder()
            .time_to_idle(config.idle_timeout)
            .max_capacity(config.max_sessions)
            .build();
        Self { sessions, connector }
    }

    /// Opens a session for `api_key`. The key is not checked against the service until the
    /// session first uses it.
    pub async fn create(&self, api_key: &str) -> Result<Arc<Session>> {
        let session = Arc::new(Session::new(self.connector.connect(api_key)?));
        self.sessions.insert(session.id, session.clone()).await;
        info!(session_id = %session.id, "Session created");
        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.get(&id).await
    }

    /// Ends a session. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.remove(&id).await.is_some();
        if removed {
            info!(session_id = %id, "Session ended");
        }
        removed
    }
}
