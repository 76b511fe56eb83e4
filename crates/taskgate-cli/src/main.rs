use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;

use taskgate_core::impls::{JsonConfigLoader, ProcessClientFactory, ScriptedClientFactory};
use taskgate_core::logging::{self, LoggingConfig};
use taskgate_core::ports::ClientFactory;
use taskgate_core::{Dispatcher, EnvSnapshot, Gateway, Initializer, TaskRequest};

/// taskgate - run fetch and policy tasks from a configuration payload
#[derive(Parser)]
#[command(name = "taskgate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, env = "TASKGATE_VERBOSE")]
    verbose: bool,

    /// Log one JSON object per line on stdout
    #[arg(long, global = true, env = "TASKGATE_LOG_JSON")]
    json_logs: bool,

    /// Disable colored console output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task through the gateway
    Invoke {
        /// Task to run (fetch, policy)
        #[arg(long, required_unless_present = "request")]
        task: Option<String>,

        /// Configuration file used as the payload
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Full invocation event ({"taskName": ..., "config": ...}); `-` reads stdin
        #[arg(long, conflicts_with = "task")]
        request: Option<PathBuf>,

        /// Use the in-memory client instead of the engine
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate an initial configuration file
    Init {
        /// Providers to include (aws, gcp, azure, ...)
        #[arg(required = true, num_args = 1..)]
        providers: Vec<String>,

        /// Where to write the configuration
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Use the in-memory client instead of the engine
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env = EnvSnapshot::from_process();

    match cli.command {
        Commands::Invoke {
            task,
            config,
            request,
            dry_run,
        } => {
            let request = match (request, task) {
                (Some(path), _) => read_request(&path).await?,
                (None, Some(task)) => TaskRequest::new(task, read_config(&config).await?),
                (None, None) => anyhow::bail!("either --task or --request is required"),
            };
            logging::init(&logging_config(
                cli.verbose,
                cli.json_logs,
                cli.no_color,
                Some(request.config()),
            ));

            if dry_run {
                invoke(ScriptedClientFactory::new(), request, &env).await
            } else {
                invoke(ProcessClientFactory::from_env(&env), request, &env).await
            }
        }
        Commands::Init {
            providers,
            config,
            dry_run,
        } => {
            logging::init(&logging_config(cli.verbose, cli.json_logs, cli.no_color, None));

            if dry_run {
                init(ScriptedClientFactory::new(), &providers, &config, &env).await
            } else {
                init(ProcessClientFactory::from_env(&env), &providers, &config, &env).await
            }
        }
    }
}

/// Flags switch features on; the payload's `gateway.logging` block can too.
fn logging_config(
    verbose: bool,
    json: bool,
    no_color: bool,
    payload: Option<&serde_json::Value>,
) -> LoggingConfig {
    let block = payload
        .and_then(|p| p.pointer("/gateway/logging"))
        .and_then(|v| serde_json::from_value::<LoggingConfig>(v.clone()).ok())
        .unwrap_or_default();

    LoggingConfig {
        console: block.console,
        verbose: verbose || block.verbose,
        json: json || block.json,
        no_color: no_color || block.no_color,
    }
}

async fn invoke<F: ClientFactory>(clients: F, request: TaskRequest, env: &EnvSnapshot) -> Result<()> {
    let task = request.task_name().to_string();
    let gateway = Gateway::new(Dispatcher::new(JsonConfigLoader::new(), clients));
    let response = gateway
        .handle_with_env(request, env)
        .await
        .inspect_err(|e| tracing::error!(task = %task, error = %e, "invocation failed"))
        .with_context(|| format!("task {task} failed"))?;

    // stdout carries only the response; logs go to stderr.
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

async fn init<F: ClientFactory>(
    clients: F,
    providers: &[String],
    path: &Path,
    env: &EnvSnapshot,
) -> Result<()> {
    let initializer = Initializer::new(JsonConfigLoader::new(), clients);
    initializer
        .initialize(providers, path, env)
        .await
        .context("failed to generate configuration")?;

    tracing::info!(path = %path.display(), "configuration generated successfully");
    Ok(())
}

async fn read_config(path: &Path) -> Result<serde_json::Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

async fn read_request(path: &Path) -> Result<TaskRequest> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read request from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read request file: {}", path.display()))?
    };
    serde_json::from_str(&content).context("failed to parse invocation request")
}
