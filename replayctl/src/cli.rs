//! One-shot commands: browse the tracing service and replay a trace from a terminal.

use crate::config::{Config, ReplayConfig};
use crate::errors::Error;
use crate::inference::{InferenceBackend, OpenAiCompatibleBackend};
use crate::normalize::load_conversations;
use crate::replay::{LogProgress, ReplayEngine};
use crate::traces::{LangSmithClient, RunSummary, TraceSource};
use clap::Subcommand;
use std::io::Write;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP API (the default)
    Serve,
    /// List tracing projects
    Projects,
    /// List the root runs of a project
    Runs {
        #[arg(long)]
        project: String,
    },
    /// Print the conversations of a trace as they would be replayed
    Show {
        #[arg(long)]
        run: Uuid,
    },
    /// Replay a trace against the inference backend and compare timings
    Replay {
        #[arg(long)]
        run: Uuid,
        /// Overrides `replay.concurrency`
        #[arg(long)]
        concurrency: Option<usize>,
        /// Stop at the first failed call
        #[arg(long)]
        fail_fast: bool,
    },
}

/// Runs a one-shot command, printing to stdout. `serve` is not a one-shot command.
pub async fn run(command: Command, config: &Config, api_key: Option<String>) -> anyhow::Result<()> {
    if command == Command::Serve {
        anyhow::bail!("`serve` is not a one-shot command");
    }
    if let Command::Replay { concurrency: Some(0), .. } = command {
        return Err(Error::BadRequest {
            message: "concurrency must be at least 1".to_string(),
        }
        .into());
    }

    // Both credentials are checked before any network call
    let backend: Option<Arc<dyn InferenceBackend>> = match command {
        Command::Replay { .. } => Some(Arc::new(OpenAiCompatibleBackend::new(&config.inference)?)),
        _ => None,
    };
    let api_key = api_key
        .or_else(|| config.tracing_service.api_key.clone())
        .unwrap_or_default();
    let traces = LangSmithClient::new(&config.tracing_service, &api_key)?;

    let mut out = std::io::stdout().lock();
    match command {
        Command::Serve => Ok(()),
        Command::Projects => print_projects(&traces, &mut out).await,
        Command::Runs { project } => print_runs(&traces, &project, &mut out).await,
        Command::Show { run } => print_conversations(&traces, run, &config.replay, &mut out).await,
        Command::Replay {
            run,
            concurrency,
            fail_fast,
        } => {
            let mut replay_config = config.replay.clone();
            if let Some(concurrency) = concurrency {
                replay_config.concurrency = concurrency;
            }
            replay_config.fail_fast |= fail_fast;

            let backend = backend.ok_or_else(|| Error::MissingCredential {
                credential: "inference backend API key".to_string(),
            })?;
            print_replay(&traces, backend, run, &replay_config, &mut out).await
        }
    }
}

pub async fn print_projects(traces: &dyn TraceSource, out: &mut impl Write) -> anyhow::Result<()> {
    let projects = traces.list_projects().await?;
    if projects.is_empty() {
        writeln!(out, "No projects found")?;
    }
    for project in projects {
        writeln!(out, "{:<36}  {}", project.id, project.name)?;
    }
    Ok(())
}

pub async fn print_runs(traces: &dyn TraceSource, project_name: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let project = traces
        .list_projects()
        .await?
        .into_iter()
        .find(|project| project.name == project_name)
        .ok_or_else(|| Error::NotFound {
            resource: "Project".to_string(),
            id: project_name.to_string(),
        })?;

    for run in traces.list_root_runs(&project).await? {
        let summary = RunSummary::from_run(&run);
        writeln!(out, "{:<36}  {}", summary.id, summary.label)?;
    }
    Ok(())
}

pub async fn print_conversations(
    traces: &dyn TraceSource,
    run_id: Uuid,
    config: &ReplayConfig,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let report = load_conversations(traces, run_id, config.strict_normalization).await?;

    for (index, record) in report.records.iter().enumerate() {
        writeln!(
            out,
            "#{index} {} ({:.3}s)",
            record.run_id, record.original_duration_seconds
        )?;
        for message in &record.messages {
            writeln!(
                out,
                "  [{}] {}",
                message.message_type.as_deref().unwrap_or("?"),
                message.content
            )?;
        }
        writeln!(out, "  => {}", record.original_output)?;
    }
    for skipped in &report.skipped {
        writeln!(out, "skipped {}: {}", skipped.run_id, skipped.reason)?;
    }
    writeln!(
        out,
        "{} conversations, {} skipped",
        report.records.len(),
        report.skipped.len()
    )?;
    Ok(())
}

pub async fn print_replay(
    traces: &dyn TraceSource,
    backend: Arc<dyn InferenceBackend>,
    run_id: Uuid,
    config: &ReplayConfig,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let batch = load_conversations(traces, run_id, config.strict_normalization).await?;
    let report = ReplayEngine::new(backend, config).run(batch, &LogProgress).await?;

    writeln!(
        out,
        "{:>3}  {:>11}  {:>9}  {:>11}  INPUT",
        "#", "ORIGINAL(s)", "REPLAY(s)", "REPORTED(s)"
    )?;
    for row in &report.rows {
        let reported = row
            .reported_duration
            .map(|seconds| format!("{seconds:.3}"))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:>3}  {:>11.3}  {:>9.3}  {:>11}  {}",
            row.index, row.original_duration, row.replay_duration, reported, row.input_preview
        )?;
        writeln!(out, "       original: {}", row.original_output)?;
        writeln!(out, "       replay:   {}", row.replay_output)?;
    }
    for failure in &report.failures {
        writeln!(out, "{:>3}  FAILED  {}", failure.index, failure.error)?;
    }
    if !report.skipped.is_empty() {
        writeln!(out, "{} runs skipped", report.skipped.len())?;
    }
    writeln!(out, "{}", report.summary_line())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected_before_any_call() {
        let command = Command::Replay {
            run: demo_root_id(),
            concurrency: Some(0),
            fail_fast: false,
        };

        let err = run(command, &Config::default(), Some("lsv2-test".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::BadRequest { .. })));
        assert!(err.to_string().contains("concurrency must be at least 1"));
    }

    #[tokio::test]
    async fn test_print_projects_and_runs() {
        let traces = demo_traces();

        let mut buffer = Vec::new();
        print_projects(traces.as_ref(), &mut buffer).await.unwrap();
        assert!(output(buffer).contains(DEMO_PROJECT));

        let mut buffer = Vec::new();
        print_runs(traces.as_ref(), DEMO_PROJECT, &mut buffer).await.unwrap();
        let printed = output(buffer);
        assert_eq!(printed.lines().count(), 1);
        assert!(printed.starts_with(&demo_root_id().to_string()));

        let mut buffer = Vec::new();
        let err = print_runs(traces.as_ref(), "missing", &mut buffer).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_print_conversations() {
        let mut buffer = Vec::new();
        print_conversations(demo_traces().as_ref(), demo_root_id(), &ReplayConfig::default(), &mut buffer)
            .await
            .unwrap();

        let printed = output(buffer);
        assert!(printed.contains("  [system] Answer briefly."));
        assert!(printed.contains("  [human] What is 2 + 2?"));
        assert!(printed.contains("  => Seven."));
        assert!(printed.contains("(3.000s)"));
        assert!(printed.ends_with("2 conversations, 1 skipped\n"));
    }

    #[tokio::test]
    async fn test_print_replay() {
        let mut buffer = Vec::new();
        print_replay(
            demo_traces().as_ref(),
            echo_backend(),
            demo_root_id(),
            &ReplayConfig::default(),
            &mut buffer,
        )
        .await
        .unwrap();

        let printed = output(buffer);
        assert!(printed.contains("replay:   echo: Name a number between 6 and 8."));
        assert!(printed.contains("1 runs skipped"));
        let summary = printed.lines().last().unwrap();
        assert!(summary.starts_with("Saved "));
        assert!(summary.ends_with("vs. original time: 10.0 seconds"));
    }

    #[tokio::test]
    async fn test_replay_without_inference_key_fails_first() {
        let mut config = Config::default();
        config.inference.api_key = None;

        let err = run(
            Command::Replay {
                run: demo_root_id(),
                concurrency: None,
                fail_fast: false,
            },
            &config,
            Some("lsv2-test".to_string()),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("inference backend API key"));
    }

    #[tokio::test]
    async fn test_missing_tracing_key() {
        let config = Config::default();

        let err = run(Command::Projects, &config, None).await.unwrap_err();
        assert!(err.to_string().contains("tracing service API key"));
    }
}
