//! TaskBridge Worker - Task manager execution agent
//!
//! This is the main entry point for the TaskBridge worker binary. The
//! worker connects to the task manager, receives a task submission,
//! executes it on the offload thread pool while heartbeating, and
//! reports the outcome. It can also serve stateful task lifecycle
//! actions over RPC, or invoke a single action locally.

mod cli;
mod config;
mod error;
mod executor;
mod logging;
mod protocol;
mod server;
mod task;
mod version;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use crate::cli::{Cli, Commands, ConfigSubcommand};
use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::executor::{ConnectionSupervisor, ExitStatus, SupervisorConfig};
use crate::server::TaskRpcServer;
use crate::task::{has_capability, invoke, Capability, PackagePreparer, PathPreparer, TaskRegistry};

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

/// Route the parsed command. All exit-code policy lives here and in
/// `main`, never inside the connection machinery.
fn dispatch(cli: Cli) -> Result<()> {
    // Commands that don't need the full logging stack
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone());
        }
        Commands::Invoke {
            entry_point,
            action,
            packages,
            task_id,
        } => {
            logging::init_simple(if cli.verbose > 0 {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            })?;
            return run_invoke(entry_point, action, packages, *task_id);
        }
        _ => {}
    }

    // Load configuration for run/serve commands
    let config_path = match &cli.command {
        Commands::Run { config, .. } | Commands::Serve { config, .. } => config.clone(),
        _ => None,
    };
    let config = WorkerConfig::load(config_path.as_deref())?;

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    // Log version info at startup
    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting TaskBridge Worker"
    );

    match cli.command {
        Commands::Run {
            host,
            port,
            task_id,
            ..
        } => run_worker(config, host, port, task_id),
        Commands::Serve { host, port, .. } => run_server(config, host, port),
        Commands::Version | Commands::Config { .. } | Commands::Invoke { .. } => {
            // Already handled above
            unreachable!();
        }
    }
}

/// Run one worker session against the task manager
fn run_worker(
    mut config: WorkerConfig,
    host: Option<String>,
    port: Option<u16>,
    task_id: Option<i64>,
) -> Result<()> {
    // CLI overrides beat file and environment values
    if let Some(host) = host {
        config.manager.host = host;
    }
    if let Some(port) = port {
        config.manager.port = port;
    }
    let task_id = task_id.or(config.worker.task_id).ok_or_else(|| {
        Error::config_field_invalid(
            "worker.task_id",
            "a task id is required; pass --task-id or set it in the configuration file",
        )
    })?;

    info!(
        manager = %config.manager_addr(),
        task_id = task_id,
        heartbeat_interval_secs = config.manager.heartbeat_interval_secs,
        "Configuration loaded"
    );

    let registry = TaskRegistry::with_builtin();
    let preparer = Arc::new(PathPreparer::new());

    // Startup package locations fail fast, before connecting
    preparer.prepare(&config.worker.packages)?;

    let supervisor_config = SupervisorConfig {
        host: config.manager.host.clone(),
        port: config.manager.port,
        task_id,
        heartbeat_interval: config.heartbeat_interval(),
        connect_timeout: config.connect_timeout(),
    };

    let runtime = build_runtime()?;
    let supervisor = ConnectionSupervisor::new(supervisor_config, registry, preparer);
    let status = runtime.block_on(supervisor.run());

    // a killed or abandoned submission may still be blocking an
    // offload thread; do not wait it out
    runtime.shutdown_background();
    let status = status?;

    info!(status = %status, "Worker session finished");
    match status {
        ExitStatus::Completed(_) | ExitStatus::Killed => Ok(()),
        ExitStatus::ProtocolViolation { op_code } => {
            Err(Error::ProtocolViolation { op_code })
        }
        ExitStatus::Faulted(e) => Err(e),
    }
}

/// Run the stateful task RPC server until Ctrl+C
fn run_server(mut config: WorkerConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let registry = TaskRegistry::with_builtin();
    let preparer = Arc::new(PathPreparer::new());

    let runtime = build_runtime()?;
    let result = runtime.block_on(async {
        let server = TaskRpcServer::bind(&config.server_addr(), registry, preparer).await?;
        info!(addr = %server.local_addr()?, "Serving task actions");

        tokio::select! {
            result = server.run() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    });
    runtime.shutdown_background();
    result
}

/// Invoke one lifecycle action on a registered task, locally
fn run_invoke(
    entry_point: &str,
    action: &str,
    packages: &str,
    task_id: Option<i64>,
) -> Result<()> {
    let capability = Capability::from_action(action).ok_or_else(|| Error::ProtocolMalformed {
        message: format!("unknown action '{}'", action),
    })?;

    let registry = TaskRegistry::with_builtin();
    let preparer = PathPreparer::new();

    let locations: Vec<String> = packages
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    preparer.prepare(&locations)?;

    let mut task = registry.resolve(entry_point)?;

    if has_capability(task.as_ref(), capability) {
        info!(entry_point = %entry_point, action = %capability, "Invoking action");
        invoke(task.as_mut(), capability)
            .map_err(|e| Error::execution_failed(task_id, e.to_string()))?;
        println!("Action '{}' on {} completed.", capability, entry_point);
    } else {
        info!(entry_point = %entry_point, action = %capability, "Action not declared, skipping");
        println!("Action '{}' is not declared by {}; nothing to do.", capability, entry_point);
    }

    Ok(())
}

/// Build the multi-threaded async runtime
fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("taskbridge-worker")
        .build()
        .map_err(|e| {
            error!(error = %e, "Failed to create async runtime");
            Error::Internal(format!("Failed to create async runtime: {}", e))
        })
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = WorkerConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            config::init_config(path.as_deref(), force)?;
        }
        ConfigSubcommand::Validate { config } => {
            WorkerConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
