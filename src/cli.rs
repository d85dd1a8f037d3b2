//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the TaskBridge worker.

use clap::{Parser, Subcommand};

/// TaskBridge Worker - Task manager execution agent
///
/// Connects to a TaskBridge task manager, receives a task submission,
/// executes it on the offload thread pool and reports the outcome.
/// Can also serve stateful task lifecycle actions over RPC.
#[derive(Parser, Debug)]
#[command(name = "taskbridge-worker")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the worker
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the worker (connects to the task manager and awaits a submission)
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "TASKBRIDGE_CONFIG")]
        config: Option<String>,

        /// Task manager host (overrides configuration)
        #[arg(long, env = "TASKBRIDGE_MANAGER_HOST")]
        host: Option<String>,

        /// Task manager port (overrides configuration)
        #[arg(long, env = "TASKBRIDGE_MANAGER_PORT")]
        port: Option<u16>,

        /// Task id sent at handshake
        #[arg(long, env = "TASKBRIDGE_TASK_ID")]
        task_id: Option<i64>,
    },

    /// Invoke one task lifecycle action locally, without a task manager
    Invoke {
        /// Qualified task entry point (e.g. demo.OkTask)
        entry_point: String,

        /// Lifecycle action to invoke
        #[arg(short, long, default_value = "execute")]
        action: String,

        /// Comma-separated package locations to prepare first
        #[arg(short, long, default_value = "")]
        packages: String,

        /// Logical task id used in diagnostics
        #[arg(long)]
        task_id: Option<i64>,
    },

    /// Serve stateful task lifecycle actions over RPC
    Serve {
        /// Path to configuration file
        #[arg(short, long, env = "TASKBRIDGE_CONFIG")]
        config: Option<String>,

        /// Listen host (overrides configuration)
        #[arg(long, env = "TASKBRIDGE_SERVER_HOST")]
        host: Option<String>,

        /// Listen port (overrides configuration, 0 = auto-assign)
        #[arg(long, env = "TASKBRIDGE_SERVER_PORT")]
        port: Option<u16>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        // Verifies that the CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command() {
        let cli = Cli::parse_from(["taskbridge-worker", "run"]);
        match cli.command {
            Commands::Run {
                config,
                host,
                port,
                task_id,
            } => {
                assert!(config.is_none());
                assert!(host.is_none());
                assert!(port.is_none());
                assert!(task_id.is_none());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_with_config() {
        let cli = Cli::parse_from(["taskbridge-worker", "run", "--config", "/path/to/config.toml"]);
        match cli.command {
            Commands::Run { config, .. } => {
                assert_eq!(config, Some("/path/to/config.toml".to_string()));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_with_manager_overrides() {
        let cli = Cli::parse_from([
            "taskbridge-worker",
            "run",
            "--host",
            "manager.internal",
            "--port",
            "9100",
            "--task-id",
            "42",
        ]);
        match cli.command {
            Commands::Run {
                host,
                port,
                task_id,
                ..
            } => {
                assert_eq!(host, Some("manager.internal".to_string()));
                assert_eq!(port, Some(9100));
                assert_eq!(task_id, Some(42));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_invoke_defaults() {
        let cli = Cli::parse_from(["taskbridge-worker", "invoke", "demo.OkTask"]);
        match cli.command {
            Commands::Invoke {
                entry_point,
                action,
                packages,
                task_id,
            } => {
                assert_eq!(entry_point, "demo.OkTask");
                assert_eq!(action, "execute");
                assert!(packages.is_empty());
                assert!(task_id.is_none());
            }
            _ => panic!("Expected Invoke command"),
        }
    }

    #[test]
    fn test_invoke_with_action() {
        let cli = Cli::parse_from([
            "taskbridge-worker",
            "invoke",
            "demo.CounterTask",
            "--action",
            "init",
            "--packages",
            "/opt/tasks",
        ]);
        match cli.command {
            Commands::Invoke {
                action, packages, ..
            } => {
                assert_eq!(action, "init");
                assert_eq!(packages, "/opt/tasks");
            }
            _ => panic!("Expected Invoke command"),
        }
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::parse_from(["taskbridge-worker", "serve", "--port", "0"]);
        match cli.command {
            Commands::Serve { port, .. } => {
                assert_eq!(port, Some(0));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_verbose_flags() {
        let cli = Cli::parse_from(["taskbridge-worker", "-vv", "version"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_quiet_flag() {
        let cli = Cli::parse_from(["taskbridge-worker", "--quiet", "version"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::parse_from(["taskbridge-worker", "config", "show"]);
        match cli.command {
            Commands::Config {
                subcommand: ConfigSubcommand::Show { config },
            } => {
                assert!(config.is_none());
            }
            _ => panic!("Expected Config Show command"),
        }
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["taskbridge-worker", "config", "init", "--force"]);
        match cli.command {
            Commands::Config {
                subcommand: ConfigSubcommand::Init { path, force },
            } => {
                assert!(path.is_none());
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
