//! Shared fixtures: an in-memory tracing service holding one demo trace, fake inference
//! backends and a test server wired to them.

use crate::config::Config;
use crate::conversation::RoleMessage;
use crate::errors::{Error, Result};
use crate::inference::{Completion, InferenceBackend};
use crate::traces::{Project, RunEvent, RunRecord, TraceConnector, TraceSource};
use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const DEMO_PROJECT: &str = "replay-demo";

pub fn demo_project_id() -> Uuid {
    Uuid::from_u128(0x0b5c8f5e_3a3c_4d57_8a53_1f8e4b2f6c01)
}

pub fn demo_root_id() -> Uuid {
    Uuid::from_u128(0x6f2a1c4e_0f0b_4a57_9d1e_3f6c9b2d8a10)
}

fn demo_child_ids() -> [Uuid; 3] {
    [
        Uuid::from_u128(0x2d7eab70_5c5e_4f79_ac75_3b0a6d4b8e23),
        Uuid::from_u128(0x3e8fbc81_6d6f_4a8a_bd86_4cb17e5c9f34),
        Uuid::from_u128(0x4f90cd92_7e70_4b9b_8e97_5dc28f6da045),
    ]
}

fn lc_message(message_type: &str, content: &str) -> Value {
    json!({
        "lc": 1,
        "type": "constructor",
        "kwargs": { "content": content, "type": message_type }
    })
}

/// An `llm` run as LangChain records it, lasting `seconds`.
pub fn llm_run(id: Uuid, messages: Vec<Value>, output: &str, seconds: u32) -> RunRecord {
    RunRecord {
        id,
        name: "ChatOpenAI".to_string(),
        run_type: "llm".to_string(),
        inputs: json!({ "messages": [messages] }),
        outputs: Some(json!({ "generations": [[{ "text": output }]] })),
        child_run_ids: None,
        start_time: Some("2024-01-01T00:00:00".to_string()),
        error: None,
        events: vec![
            RunEvent {
                name: "start".to_string(),
                time: Some("2024-01-01T00:00:00".to_string()),
            },
            RunEvent {
                name: "end".to_string(),
                time: Some(format!("2024-01-01T00:00:{seconds:02}")),
            },
        ],
    }
}

/// A tracing service holding a single project with a single trace.
pub struct InMemoryTraces {
    pub projects: Vec<Project>,
    pub root_ids: Vec<Uuid>,
    pub runs: Vec<RunRecord>,
}

#[async_trait]
impl TraceSource for InMemoryTraces {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.projects.clone())
    }

    async fn list_root_runs(&self, _project: &Project) -> Result<Vec<RunRecord>> {
        Ok(self.runs.iter().filter(|run| self.root_ids.contains(&run.id)).cloned().collect())
    }

    async fn list_runs_by_id(&self, ids: &[Uuid]) -> Result<Vec<RunRecord>> {
        Ok(self.runs.iter().filter(|run| ids.contains(&run.id)).cloned().collect())
    }
}

/// One chain run with two replayable `llm` children (3s and 7s) and one without outputs.
pub fn demo_traces() -> Arc<InMemoryTraces> {
    let [first, second, broken] = demo_child_ids();

    let root = RunRecord {
        id: demo_root_id(),
        name: "AgentExecutor".to_string(),
        run_type: "chain".to_string(),
        inputs: json!({"input": "Quiz me"}),
        outputs: Some(json!({"output": "Four, then seven."})),
        child_run_ids: Some(vec![first, second, broken]),
        start_time: Some("2024-01-01T00:00:00".to_string()),
        error: None,
        events: Vec::new(),
    };

    let mut broken_run = llm_run(broken, vec![lc_message("human", "Unfinished")], "", 1);
    broken_run.outputs = None;

    Arc::new(InMemoryTraces {
        projects: vec![Project {
            id: demo_project_id(),
            name: DEMO_PROJECT.to_string(),
            description: None,
        }],
        root_ids: vec![demo_root_id()],
        runs: vec![
            root,
            llm_run(
                first,
                vec![lc_message("system", "Answer briefly."), lc_message("human", "What is 2 + 2?")],
                "Four.",
                3,
            ),
            llm_run(
                second,
                vec![
                    lc_message("system", "Answer briefly."),
                    lc_message("human", "Name a number between 6 and 8."),
                ],
                "Seven.",
                7,
            ),
            broken_run,
        ],
    })
}

/// Hands out the same in-memory source for every non-blank key.
pub struct InMemoryConnector(pub Arc<InMemoryTraces>);

impl TraceConnector for InMemoryConnector {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn TraceSource>> {
        if api_key.trim().is_empty() {
            return Err(Error::MissingCredential {
                credential: "tracing service API key".to_string(),
            });
        }
        Ok(self.0.clone())
    }
}

/// Answers with the last message prefixed by `echo: `.
pub struct EchoBackend;

#[async_trait]
impl InferenceBackend for EchoBackend {
    fn model(&self) -> &str {
        "echo"
    }

    async fn complete(&self, messages: &[RoleMessage]) -> Result<Completion> {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        Ok(Completion {
            content: format!("echo: {last}"),
            reported_total_time: None,
        })
    }
}

/// Fails every call like an overloaded provider.
pub struct FailingBackend;

#[async_trait]
impl InferenceBackend for FailingBackend {
    fn model(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _messages: &[RoleMessage]) -> Result<Completion> {
        Err(Error::Backend {
            status: Some(503),
            message: "HTTP 503 - over capacity".to_string(),
        })
    }
}

/// Echoes like [`EchoBackend`] after sleeping for the given time.
pub struct SlowBackend(pub Duration);

#[async_trait]
impl InferenceBackend for SlowBackend {
    fn model(&self) -> &str {
        "slow"
    }

    async fn complete(&self, messages: &[RoleMessage]) -> Result<Completion> {
        tokio::time::sleep(self.0).await;
        EchoBackend.complete(messages).await
    }
}

pub fn echo_backend() -> Arc<dyn InferenceBackend> {
    Arc::new(EchoBackend)
}

pub fn failing_backend() -> Arc<dyn InferenceBackend> {
    Arc::new(FailingBackend)
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    }
}

pub fn create_test_app(traces: Arc<InMemoryTraces>, backend: Option<Arc<dyn InferenceBackend>>) -> TestServer {
    create_test_app_with_config(create_test_config(), traces, backend)
}

pub fn create_test_app_with_config(
    config: Config,
    traces: Arc<InMemoryTraces>,
    backend: Option<Arc<dyn InferenceBackend>>,
) -> TestServer {
    crate::Application::new_with_services(config, Arc::new(InMemoryConnector(traces)), backend).into_test_server()
}

/// Opens a session and returns its id for the `x-session-id` header.
pub async fn open_session(server: &TestServer) -> String {
    let response = server.post("/api/v1/sessions").json(&json!({"api_key": "lsv2-test"})).await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["session_id"]
        .as_str()
        .expect("session id in response")
        .to_string()
}
