mod doctor;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use orca_core::config::AppConfig;
use orca_core::error::OrcaError;
use orca_core::event::EventBus;
use orca_core::location::{self, FileLocation};
use orca_core::types::NavigationState;
use orca_nav::{recent_runs, Controller, ExecutionTrigger, Navigator};

#[derive(Parser)]
#[command(name = "orca", version, about = "Browse workflow runs and their logs")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "orca.toml")]
    config: PathBuf,

    /// Engine base URL, overrides the config file
    #[arg(long, env = "ORCA_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the terminal UI (default)
    Tui {
        /// Open at this location, e.g. orders@2024-01-02T10-00-00
        #[arg(long)]
        at: Option<String>,
    },
    /// List workflow definitions
    Workflows,
    /// List the most recent runs of a workflow, newest first
    Runs {
        workflow: String,
        /// How many runs to show (default: ui.run_history)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the task log artifacts of a run
    Tasks { workflow: String, run: String },
    /// Print one task log, addressed by a full location token
    Log { token: String },
    /// Print the task graph of a workflow
    Graph {
        workflow: String,
        /// Emit the node/edge model as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask the engine to run a workflow
    Execute { workflow: String },
    /// Show current configuration
    Config,
    /// Run system health checks
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "orca", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&cli.config)?;
    if let Some(url) = &cli.url {
        config = config.with_base_url(url.clone())?;
    }

    let command = cli.command.unwrap_or(Commands::Tui { at: None });
    init_tracing(&config, matches!(command, Commands::Tui { .. }))?;

    let backend = orca_client::create_backend(&config.backend)?;
    info!(url = %config.backend.base_url, "Using engine");

    match command {
        Commands::Tui { at } => {
            let event_bus = Arc::new(EventBus::default());
            let host = Arc::new(FileLocation::new(config.location_file()));
            let navigator = Arc::new(Navigator::new(host, event_bus.clone()));
            if let Some(token) = at {
                navigator.navigate_token(&token)?;
            }
            let controller = Controller::new(
                backend.clone(),
                event_bus.clone(),
                navigator.subscribe(),
                config.ui.run_history,
            );
            let trigger = ExecutionTrigger::new(backend, event_bus.clone());
            orca_tui::run_tui(
                navigator,
                controller,
                trigger,
                event_bus,
                Duration::from_millis(config.ui.tick_ms),
            )
            .await?;
        }
        Commands::Workflows => {
            for workflow in backend.list_workflows().await? {
                println!("{}\t{}", workflow.workflow_id(), workflow.name);
            }
        }
        Commands::Runs { workflow, limit } => {
            let workflow = workflow_arg(&workflow)?;
            let runs = backend.fetch_runs(&workflow).await?;
            let limit = limit.unwrap_or(config.ui.run_history);
            for run in recent_runs(&runs, limit) {
                match run.started_at() {
                    Some(at) => println!("{}\t{}", run.label, at),
                    None => println!("{}", run.label),
                }
            }
        }
        Commands::Tasks { workflow, run } => {
            let state = NavigationState::workflow(workflow).and_then(|s| s.with_run(run));
            let Some((wf, run)) = state.as_ref().and_then(|s| s.workflow_id().zip(s.run_id()))
            else {
                return Err(OrcaError::NoWorkflowSelected.into());
            };
            for task in backend.fetch_task_logs(wf, run).await? {
                println!("{}", task.label);
            }
        }
        Commands::Log { token } => {
            let state = location::parse(&token);
            let (Some(wf), Some(run), Some(artifact)) =
                (state.workflow_id(), state.run_id(), state.artifact_id())
            else {
                anyhow::bail!(
                    "'{}' does not select a task log (expected workflow@run@artifact)",
                    token
                );
            };
            let log = backend.fetch_log(wf, run, artifact).await?;
            print!("{}", log.text);
        }
        Commands::Graph { workflow, json } => {
            let workflow = workflow_arg(&workflow)?;
            let doc = backend.fetch_graph(&workflow).await?;
            let model = orca_core::transform(&doc).map_err(|e| {
                error!(%workflow, error = %e, "Engine sent an inconsistent graph");
                e
            })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&model)?);
            } else {
                for node in &model.nodes {
                    println!("{}\t{}", node.id, node.desc);
                    for child in model.children_of(&node.id) {
                        println!("  -> {}", child);
                    }
                }
            }
        }
        Commands::Execute { workflow } => {
            let workflow = workflow_arg(&workflow)?;
            let ack = backend.execute(&workflow).await?;
            match ack.message {
                Some(message) => println!("{}", message),
                None => println!("{}", ack.raw),
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Doctor => {
            let failed = doctor::run_doctor(&config, backend).await;
            if failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Console logging for one-shot commands; the TUI owns the terminal, so it
/// logs to a file under the state dir instead.
fn init_tracing(config: &AppConfig, to_file: bool) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter));

    if to_file {
        let path = config.log_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

/// A workflow id as typed on the command line.
fn workflow_arg(raw: &str) -> Result<String, OrcaError> {
    NavigationState::workflow(raw)
        .and_then(|s| s.workflow_id().map(str::to_string))
        .ok_or(OrcaError::NoWorkflowSelected)
}
