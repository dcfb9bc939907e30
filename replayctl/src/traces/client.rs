//! reqwest client for the LangSmith REST API.

use super::models::{Project, RunQuery, RunRecord, RunsPage};
use super::{TraceConnector, TraceSource};
use crate::config::TracingServiceConfig;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

const API_KEY_HEADER: &str = "x-api-key";

/// Fields requested when listing the root runs of a project.
const ROOT_RUN_FIELDS: &[&str] = &["id", "name", "run_type", "inputs", "outputs", "start_time"];

/// Fields requested when expanding a trace; normalization needs the children and timing events.
const RUN_DETAIL_FIELDS: &[&str] = &[
    "id",
    "name",
    "run_type",
    "inputs",
    "outputs",
    "child_run_ids",
    "start_time",
    "error",
    "events",
];

#[derive(Clone)]
pub struct LangSmithClient {
    client: Client,
    base_url: Url,
    api_key: String,
    page_size: usize,
}

impl LangSmithClient {
    pub fn new(config: &TracingServiceConfig, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::MissingCredential {
                credential: "tracing service API key".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build tracing service HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            api_key: api_key.to_string(),
            page_size: config.page_size,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn read_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| Error::TraceService {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::TraceService {
            status: Some(status.as_u16()),
            message: format!("Failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(Error::TraceService {
                status: Some(status.as_u16()),
                message: format!("HTTP {} - {}", status.as_u16(), body),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::TraceService {
            status: Some(status.as_u16()),
            message: format!("Failed to parse response as JSON: {e}"),
        })
    }

    /// Runs a query to exhaustion, following `cursors.next`.
    async fn query_runs(&self, mut query: RunQuery) -> Result<Vec<RunRecord>> {
        query.limit = self.page_size;
        let mut runs = Vec::new();

        loop {
            let page: RunsPage = self.read_json(self.client.post(self.endpoint("runs/query")).json(&query)).await?;
            debug!(page_len = page.runs.len(), has_next = page.cursors.next.is_some(), "Fetched runs page");
            runs.extend(page.runs);

            match page.cursors.next {
                Some(cursor) => query.cursor = Some(cursor),
                None => break,
            }
        }

        Ok(runs)
    }
}

#[async_trait]
impl TraceSource for LangSmithClient {
    #[instrument(skip(self))]
    async fn list_projects(&self) -> Result<Vec<Project>> {
        let projects: Vec<Project> = self.read_json(self.client.get(self.endpoint("sessions"))).await?;
        debug!(count = projects.len(), "Listed projects");
        Ok(projects)
    }

    #[instrument(skip(self, project), fields(project = %project.name))]
    async fn list_root_runs(&self, project: &Project) -> Result<Vec<RunRecord>> {
        self.query_runs(RunQuery {
            session: Some(vec![project.id]),
            is_root: Some(true),
            error: Some(false),
            select: Some(ROOT_RUN_FIELDS.to_vec()),
            ..Default::default()
        })
        .await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn list_runs_by_id(&self, ids: &[Uuid]) -> Result<Vec<RunRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.query_runs(RunQuery {
            id: Some(ids.to_vec()),
            error: Some(false),
            select: Some(RUN_DETAIL_FIELDS.to_vec()),
            ..Default::default()
        })
        .await
    }
}

/// Connects sessions to the configured LangSmith instance.
#[derive(Clone)]
pub struct LangSmithConnector {
    config: TracingServiceConfig,
}

impl LangSmithConnector {
    pub fn new(config: TracingServiceConfig) -> Self {
        Self { config }
    }
}

impl TraceConnector for LangSmithConnector {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn TraceSource>> {
        Ok(Arc::new(LangSmithClient::new(&self.config, api_key)?))
    }
}
