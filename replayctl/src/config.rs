//! Application configuration management.
//!
//! Configuration is loaded from an optional YAML file with environment variable overrides. The
//! configuration file path defaults to `config.yaml` but can be specified via `-f` flag or
//! `REPLAYCTL_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`, may be absent)
//! 2. **Well-known provider variables** - `LANGSMITH_API_KEY`, `LANGSMITH_ENDPOINT`,
//!    `GROQ_API_KEY` and `GROQ_MODEL`
//! 3. **Environment variables** - Variables prefixed with `REPLAYCTL_` override everything else
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `REPLAYCTL_REPLAY__CONCURRENCY=4` sets the `replay.concurrency` field.
//!
//! ## Example
//!
//! ```yaml
//! port: 3001
//! tracing_service:
//!   url: https://api.smith.langchain.com
//!   timeout: 30s
//! inference:
//!   url: https://api.groq.com/openai/v1
//!   model: llama-3.1-8b-instant
//!   timeout: 60s
//! replay:
//!   concurrency: 1
//!   fail_fast: false
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::cli::Command;
use crate::errors::Error;

/// CLI args: the config file plus an optional one-shot command
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "REPLAYCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without doing anything else.
    #[arg(long)]
    pub validate: bool,

    /// Tracing service API key for one-shot commands (defaults to `tracing_service.api_key`)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Command to run; the HTTP server is started when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Where historical traces are read from
    pub tracing_service: TracingServiceConfig,
    /// The backend prompts are replayed against
    pub inference: InferenceConfig,
    /// Replay batch behaviour
    pub replay: ReplayConfig,
    /// Per-user session cache settings
    pub sessions: SessionConfig,
}

/// Tracing service (LangSmith-compatible API) connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingServiceConfig {
    /// Base URL of the tracing API
    pub url: Url,
    /// Default API key, used by one-shot CLI commands. The HTTP surface always asks per session.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Timeout for each call to the tracing API
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Number of runs requested per page when listing runs
    pub page_size: usize,
}

/// OpenAI-compatible inference backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Base URL including the version prefix, e.g. `https://api.groq.com/openai/v1`
    pub url: Url,
    /// Model identifier used for every call of a replay batch
    pub model: String,
    /// Bearer token for the backend
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Timeout for each chat completion call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// Replay batch behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayConfig {
    /// Maximum number of backend calls in flight (1 = strictly sequential)
    pub concurrency: usize,
    /// Abort the whole batch on the first backend error instead of isolating it
    pub fail_fast: bool,
    /// Abort normalization on the first malformed run instead of skipping it
    pub strict_normalization: bool,
    /// Number of characters kept in the input preview column
    pub preview_chars: usize,
}

/// Session cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Sessions unused for this long are dropped along with their cached project list
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// Maximum number of live sessions
    pub max_sessions: u64,
    /// How long the progress and result of a streamed replay stay available
    #[serde(with = "humantime_serde")]
    pub replay_retention: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tracing_service: TracingServiceConfig::default(),
            inference: InferenceConfig::default(),
            replay: ReplayConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

impl Default for TracingServiceConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("https://api.smith.langchain.com").unwrap(),
            api_key: None,
            timeout: Duration::from_secs(30),
            page_size: 100,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("https://api.groq.com/openai/v1").unwrap(),
            model: "llama-3.1-8b-instant".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            fail_fast: false,
            strict_normalization: false,
            preview_chars: 50,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60 * 60), // 1 hour
            max_sessions: 1000,
            replay_retention: Duration::from_secs(10 * 60),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.replay.concurrency == 0 {
            return Err(Error::BadRequest {
                message: "Config validation: replay.concurrency must be at least 1".to_string(),
            });
        }

        if self.replay.preview_chars == 0 {
            return Err(Error::BadRequest {
                message: "Config validation: replay.preview_chars must be at least 1".to_string(),
            });
        }

        if self.inference.model.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Config validation: inference.model cannot be empty".to_string(),
            });
        }

        if self.tracing_service.page_size == 0 {
            return Err(Error::BadRequest {
                message: "Config validation: tracing_service.page_size must be at least 1".to_string(),
            });
        }

        if self.tracing_service.timeout.is_zero() || self.inference.timeout.is_zero() {
            return Err(Error::BadRequest {
                message: "Config validation: request timeouts must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // The variable names the tracing and inference SDKs already use
            .merge(Env::raw().only(&["LANGSMITH_API_KEY"]).map(|_| "tracing_service.api_key".into()))
            .merge(Env::raw().only(&["LANGSMITH_ENDPOINT"]).map(|_| "tracing_service.url".into()))
            .merge(Env::raw().only(&["GROQ_API_KEY"]).map(|_| "inference.api_key".into()))
            .merge(Env::raw().only(&["GROQ_MODEL"]).map(|_| "inference.model".into()))
            // Prefixed environment variables override everything else
            .merge(Env::prefixed("REPLAYCTL_").ignore(&["CONFIG"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
