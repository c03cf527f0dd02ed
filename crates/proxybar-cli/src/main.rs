//! Proxybar - console shell for the antigravity-claude-proxy supervisor.
//!
//! Drives the same supervisor API a status-bar app would: start, stop and
//! restart the proxy, follow its log, and edit the persisted settings.

mod handlers;
mod shell;

use anyhow::Result;
use clap::{Parser, Subcommand};
use proxybar_core::{Settings, Supervisor};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "proxybar")]
#[command(about = "Supervise a local antigravity-claude-proxy server")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit diagnostic logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server and accept commands on stdin
    Run {
        /// Port to use instead of the saved one
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not start the server automatically
        #[arg(long)]
        no_start: bool,
    },
    /// Report whether the server can be found
    Check {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        action: handlers::config::ConfigAction,
    },
}

fn init_logging(debug: bool, json: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn settings_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.settings {
        Some(path) => Ok(path.clone()),
        None => Ok(Settings::default_path()?),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_json);

    let settings_path = settings_path(&cli)?;
    debug!("Settings file: {}", settings_path.display());

    match cli.command {
        Command::Run { port, no_start } => {
            let settings = Settings::load(&settings_path)?;
            let supervisor = Supervisor::with_defaults();
            shell::run(supervisor, settings, port, no_start).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { json } => {
            let supervisor = Supervisor::with_defaults();
            let installed = handlers::check::report(&supervisor, json)?;
            Ok(if installed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Config { action } => {
            handlers::config::apply(&settings_path, action)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from(["proxybar", "--debug", "run", "--port", "9090", "--no-start"]);
        assert!(cli.debug);
        match cli.command {
            Command::Run { port, no_start } => {
                assert_eq!(port, Some(9090));
                assert!(no_start);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_global_settings_flag_after_subcommand() {
        let cli = Cli::parse_from(["proxybar", "check", "--settings", "/tmp/p.json"]);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/p.json")));
    }
}
