//! openclaw CLI — entry point.
//!
//! # Commands
//!
//! - `openclaw cron list|add|update|remove|run|runs` — job scheduler RPC
//!   methods (spec §4.H), driven from the crontab.
//! - `openclaw cron run <jobId>` — the run-command `cron(8)` itself
//!   invokes; always dispatches with `mode=force` (spec §6).
//! - `openclaw scheduler-status` — `scheduler.status` RPC.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use openclaw_core::config::load_config;
use openclaw_core::events::QueueEventSink;
use openclaw_core::heartbeat::NotifyHeartbeat;
use openclaw_cron::crontab_io::SystemCrontabIo;
use openclaw_cron::dispatcher::Dispatcher;
use openclaw_cron::gate::RunMode;
use openclaw_cron::isolated::SubprocessTurnRunner;
use openclaw_cron::rpc::{CronFacade, ListParams};
use openclaw_cron::types::{CronJobCreate, CronJobPatch};

#[derive(Parser)]
#[command(name = "openclaw", version, about = "Crontab-backed job scheduler", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage scheduled jobs
    Cron {
        #[command(subcommand)]
        action: CronCommands,
    },
    /// `scheduler.status` — crontab + systemd timer/unit snapshot
    SchedulerStatus,
    /// One-shot isolated turn (spec §4.E.3) — the process
    /// `SubprocessTurnRunner` spawns for `sessionTarget="isolated"` jobs.
    AgentTurn {
        #[arg(long = "session-key")]
        session_key: String,
        #[arg(long)]
        message: String,
    },
}

#[derive(Subcommand)]
enum CronCommands {
    /// `cron.list`
    List {
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        enabled: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },
    /// `cron.add` — pass a `CronJobCreate` as a JSON document
    Add {
        /// JSON-encoded `CronJobCreate` (see spec §6)
        json: String,
    },
    /// `cron.update` — pass a `CronJobPatch` as a JSON document
    Update {
        id: String,
        /// JSON-encoded `CronJobPatch`
        json: String,
    },
    /// `cron.remove`
    Remove { id: String },
    /// `cron.run` — the command `cron(8)` itself invokes, always forced
    Run {
        id: String,
        #[arg(long, default_value = "force")]
        mode: String,
    },
    /// `cron.runs`
    Runs {
        id: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// `cron.status`
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.logs);

    let facade = build_facade();
    let now_ms = openclaw_core::utils::now_ms();

    match cli.command {
        Commands::Cron { action } => run_cron_command(&facade, action, now_ms).await,
        Commands::SchedulerStatus => {
            let status = facade.scheduler_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Commands::AgentTurn {
            session_key,
            message,
        } => run_agent_turn(&session_key, &message),
    }
}

/// One-shot isolated turn (spec §4.E.3). The full interactive multi-turn
/// agent loop is out of scope here (spec §1); this default mode
/// acknowledges the message on the given session so `SubprocessTurnRunner`
/// has a real process to invoke and a real summary to capture from stdout.
fn run_agent_turn(session_key: &str, message: &str) -> Result<()> {
    println!("session {session_key} processed message: {message}");
    Ok(())
}

async fn run_cron_command(facade: &CronFacade, action: CronCommands, now_ms: i64) -> Result<()> {
    match action {
        CronCommands::List {
            query,
            enabled,
            limit,
            offset,
        } => {
            let params = ListParams {
                query,
                enabled,
                sort_by: None,
                sort_dir: None,
                limit,
                offset,
            };
            let result = facade
                .list(params, now_ms)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        CronCommands::Add { json } => {
            let create: CronJobCreate =
                serde_json::from_str(&json).context("invalid cron job JSON")?;
            let job = facade
                .add(create, now_ms)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        CronCommands::Update { id, json } => {
            let patch: CronJobPatch =
                serde_json::from_str(&json).context("invalid patch JSON")?;
            let job = facade
                .update(&id, patch, now_ms)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        CronCommands::Remove { id } => {
            let removed = facade
                .remove(&id, now_ms)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("{{\"ok\":true,\"removed\":{removed}}}");
        }
        CronCommands::Run { id, mode } => {
            // cron(8) calls this with no --mode, defaulting to "force"
            // per spec §6: the run-command always forces dispatch.
            let run_mode = RunMode::from_str_opt(Some(mode.as_str()));
            let result = facade
                .run(&id, run_mode, now_ms)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        CronCommands::Runs { id, limit } => {
            let result = facade
                .runs(&id, limit)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        CronCommands::Status => {
            let status = facade
                .status(now_ms)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

fn build_facade() -> CronFacade {
    let config = load_config(None);
    let dispatcher = Dispatcher::new(
        Arc::new(QueueEventSink::new()),
        Arc::new(NotifyHeartbeat::new()),
        Arc::new(SubprocessTurnRunner::default()),
    );
    CronFacade::new(Arc::new(SystemCrontabIo::new()), dispatcher, config.cron)
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("openclaw=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
