use crate::auth::CurrentSession;
use crate::errors::Error;
use crate::traces::{Project, RunSummary};
use axum::{Json, extract::Path};

// GET /projects - Projects visible to the session's API key (cached per session)
pub async fn list_projects(session: CurrentSession) -> Result<Json<Vec<Project>>, Error> {
    Ok(Json(session.projects().await?.to_vec()))
}

// GET /projects/{name}/runs - Root runs of a project, labelled for picking
pub async fn list_runs(session: CurrentSession, Path(name): Path<String>) -> Result<Json<Vec<RunSummary>>, Error> {
    let project = session.project_by_name(&name).await?;
    let runs = session.traces().list_root_runs(&project).await?;
    Ok(Json(runs.iter().map(RunSummary::from_run).collect()))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use crate::traces::{Project, RunSummary};

    #[tokio::test]
    async fn test_list_projects_and_runs() {
        let server = create_test_app(demo_traces(), Some(echo_backend()));
        let session_id = open_session(&server).await;

        let projects: Vec<Project> = server
            .get("/api/v1/projects")
            .add_header("x-session-id", &session_id)
            .await
            .json();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, DEMO_PROJECT);

        let runs: Vec<RunSummary> = server
            .get(&format!("/api/v1/projects/{DEMO_PROJECT}/runs"))
            .add_header("x-session-id", &session_id)
            .await
            .json();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, demo_root_id());
        assert!(runs[0].label.starts_with("2024-01-01T00:00:00"));
    }

    #[tokio::test]
    async fn test_unknown_project_is_404() {
        let server = create_test_app(demo_traces(), Some(echo_backend()));
        let session_id = open_session(&server).await;

        server
            .get("/api/v1/projects/nope/runs")
            .add_header("x-session-id", &session_id)
            .await
            .assert_status_not_found();
    }
}
