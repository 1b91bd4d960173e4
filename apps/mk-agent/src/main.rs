//! # mk-agent
//!
//! The Mako autonomous coding agent.
//!
//! - `mk-agent run` — run the orchestration loop against a reasoning engine
//! - `mk-agent supervise` — run the loop under the crash-restart supervisor
//! - `mk-agent goal list/add/status` — inspect and seed the goal backlog
//!
//! Library crates stay synchronous; tokio lives only here, driving the
//! blocking turn loop via `spawn_blocking` and sweeping CI poll sessions
//! from a background task so polling never waits on the engine.

mod engine_http;
mod restart;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mk_driver::{AgentConfig, Driver, ReasoningEngine};
use mk_goal::{GoalFilter, GoalStatus, GoalStore, Priority};
use mk_monitor::{CiMonitor, GhStatusProvider};
use mk_reliability::ReliabilityTracker;
use mk_timing::TimingLog;
use mk_tools::builtin::{
    GitBranchPush, GithubCiStatus, GithubCreatePr, GithubPrStatus, SafeShell,
};
use mk_tools::{Sandbox, ToolDispatcher};

use engine_http::HttpEngine;

/// External capability calls get a generous but bounded window.
const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Mako — autonomous backlog advancement, one CI-gated branch at a time.
#[derive(Parser)]
#[command(name = "mk-agent", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "mako.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestration loop.
    Run(RunArgs),
    /// Run the loop under the crash-restart supervisor.
    Supervise(RunArgs),
    /// Inspect and seed the goal backlog.
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
}

#[derive(Parser, Clone)]
struct RunArgs {
    /// OpenAI-compatible chat-completions endpoint.
    #[arg(long, default_value = "http://localhost:11434/v1/chat/completions")]
    engine_url: String,

    /// Model name passed to the endpoint.
    #[arg(long, default_value = "qwen2.5-coder")]
    model: String,

    /// Environment variable holding the API key, if the endpoint needs one.
    #[arg(long, default_value = "MAKO_ENGINE_API_KEY")]
    api_key_env: String,
}

#[derive(Subcommand)]
enum GoalCommands {
    /// List goals, active by default.
    List {
        /// Show the completed collection instead.
        #[arg(long)]
        completed: bool,
        /// Filter by status: active, in-progress, or blocked.
        #[arg(long)]
        status: Option<String>,
    },
    /// Add a goal to the backlog.
    Add {
        /// Goal description.
        description: String,
        /// Priority: high, medium, or low.
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Ordered subtasks (repeatable).
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
    },
    /// Show one goal in full.
    Status {
        /// Goal id.
        id: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("mk_agent=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AgentConfig::load_or_default(&cli.config)?;
    config.apply_env_overrides()?;

    match cli.command {
        Commands::Run(args) => run(config, args).await,
        Commands::Supervise(args) => {
            let child_args = vec![
                format!("--config={}", cli.config.display()),
                "run".to_string(),
                format!("--engine-url={}", args.engine_url),
                format!("--model={}", args.model),
                format!("--api-key-env={}", args.api_key_env),
            ];
            restart::supervise(&child_args)
        }
        Commands::Goal { command } => goal_command(&config, &command),
    }
}

async fn run(config: AgentConfig, args: RunArgs) -> anyhow::Result<()> {
    let api_key = std::env::var(&args.api_key_env).ok();
    let engine: Arc<dyn ReasoningEngine> =
        Arc::new(HttpEngine::new(&args.engine_url, &args.model, api_key));
    let driver = Arc::new(build_driver(&config, engine)?);

    // Background sweep so armed sessions are polled independently of the
    // turn cadence — a long engine call never starves CI detection.
    let sweeper = driver.clone();
    let interval = config.poll_interval();
    let poll_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let driver = sweeper.clone();
            if tokio::task::spawn_blocking(move || driver.sweep_poll_sessions())
                .await
                .is_err()
            {
                tracing::error!("poll sweep task panicked");
            }
        }
    });

    let loop_driver = driver.clone();
    let result = tokio::task::spawn_blocking(move || loop_driver.run())
        .await
        .context("turn loop panicked")?;
    poll_task.abort();
    result?;

    // run() only returns on an explicit restart request; the driver has
    // already flushed both stores.
    restart::reexec()
}

fn build_driver(
    config: &AgentConfig,
    engine: Arc<dyn ReasoningEngine>,
) -> anyhow::Result<Driver> {
    let root = &config.sandbox_root;
    let store = Arc::new(GoalStore::load(config.goals_path())?);
    let tracker = Arc::new(ReliabilityTracker::load(config.reliability_path())?);
    let timing = Arc::new(TimingLog::open(config.timing_path())?);
    let sandbox = Sandbox::new(root)?;

    let mut dispatcher = ToolDispatcher::new(sandbox, tracker.clone(), timing, TOOL_CALL_TIMEOUT);
    dispatcher.register(Arc::new(GitBranchPush::new(root)))?;
    dispatcher.register(Arc::new(GithubCreatePr::new(root, config.automerge_enabled)))?;
    dispatcher.register(Arc::new(GithubPrStatus::new(root)))?;
    dispatcher.register(Arc::new(GithubCiStatus::new(root)))?;
    dispatcher.register(Arc::new(SafeShell::new(root)))?;

    let provider = Arc::new(GhStatusProvider::new(root));
    let monitor = Arc::new(CiMonitor::new(provider, config.poll_timeout_attempts));

    Ok(Driver::new(
        config.clone(),
        store,
        tracker,
        Arc::new(dispatcher),
        monitor,
        engine,
    ))
}

fn goal_command(config: &AgentConfig, command: &GoalCommands) -> anyhow::Result<()> {
    let store = GoalStore::load(config.goals_path())?;

    match command {
        GoalCommands::List { completed, status } => {
            let goals = if *completed {
                store.completed_goals()
            } else {
                let filter = GoalFilter {
                    status: status.as_deref().map(parse_status).transpose()?,
                    ..GoalFilter::default()
                };
                store.list_goals(filter)
            };
            for goal in goals {
                println!(
                    "[{}] {:<11} {:<6} {}",
                    goal.id, goal.status, goal.priority, goal.description
                );
            }
            Ok(())
        }
        GoalCommands::Add {
            description,
            priority,
            subtasks,
        } => {
            let priority = parse_priority(priority)?;
            let goal = store.create_goal(description, priority, subtasks.clone())?;
            println!("Goal created: {}", goal.id);
            Ok(())
        }
        GoalCommands::Status { id } => {
            let goal = store.get(*id)?;
            println!("Goal {}: {}", goal.id, goal.description);
            println!("  Status:   {}", goal.status);
            println!("  Priority: {}", goal.priority);
            if let Some(pr) = &goal.linked_pr {
                println!("  PR:       {} ({})", pr, goal.linked_branch.as_deref().unwrap_or("?"));
            }
            if !goal.subtasks.is_empty() {
                println!("  Subtasks:");
                for subtask in &goal.subtasks {
                    println!("    - {}", subtask);
                }
            }
            if !goal.notes.is_empty() {
                println!("  Notes:");
                for note in &goal.notes {
                    println!("    - {}", note);
                }
            }
            if store.get_focus().map(|g| g.id) == Some(goal.id) {
                println!("  (current focus)");
            }
            Ok(())
        }
    }
}

fn parse_priority(value: &str) -> anyhow::Result<Priority> {
    match value {
        "high" => Ok(Priority::High),
        "medium" => Ok(Priority::Medium),
        "low" => Ok(Priority::Low),
        other => anyhow::bail!("unknown priority '{}' (use high, medium, or low)", other),
    }
}

fn parse_status(value: &str) -> anyhow::Result<GoalStatus> {
    match value {
        "active" => Ok(GoalStatus::Active),
        "in-progress" => Ok(GoalStatus::InProgress),
        "completed" => Ok(GoalStatus::Completed),
        "blocked" => Ok(GoalStatus::Blocked),
        other => anyhow::bail!("unknown status '{}'", other),
    }
}
