//! CLI module for fleetops
//!
//! - `serve`: start the HTTP/WebSocket server
//! - `host`: manage the host inventory
//! - `run`: run a command on hosts and follow its output

use clap::{Parser, Subcommand};

use crate::server::config::AppConfig;

pub mod host;
pub mod run;

/// fleetops CLI
#[derive(Parser, Debug)]
#[command(name = "fleetops")]
#[command(about = "Run commands across a fleet of hosts over SSH")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server
    Serve,
    /// Manage hosts
    Host {
        #[command(subcommand)]
        command: host::HostCommand,
    },
    /// Run a command on one or more hosts
    Run(run::RunArgs),
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve) => crate::server::run(config).await,
        Some(Commands::Host { command }) => host::run(command, config).await,
        Some(Commands::Run(args)) => run::run(args, config).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetops_core::DispatchMode;

    #[test]
    fn test_parse_run_command() {
        let host = uuid::Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "fleetops",
            "run",
            "--host",
            &host.to_string(),
            "--mode",
            "batch",
            "--batch-size",
            "2",
            "--pause-on-fail",
            "df",
            "-h",
        ])
        .unwrap();

        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.hosts, vec![host]);
        assert_eq!(args.mode, DispatchMode::Batch);
        assert_eq!(args.batch_size, Some(2));
        assert!(args.pause_on_fail);
        assert_eq!(args.command, vec!["df", "-h"]);
    }

    #[test]
    fn test_run_requires_a_host() {
        assert!(Cli::try_parse_from(["fleetops", "run", "uptime"]).is_err());
    }

    #[test]
    fn test_host_add_rejects_two_credentials() {
        let result = Cli::try_parse_from([
            "fleetops", "host", "add", "web-1", "10.0.0.1", "--user", "deploy", "--password",
            "x", "--key", "/k",
        ]);
        assert!(result.is_err());
    }
}
