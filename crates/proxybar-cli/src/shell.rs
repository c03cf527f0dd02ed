//! Interactive shell around a running supervisor.
//!
//! Prints every captured log line and state change, and reads one command
//! per line from stdin until `quit`, Ctrl-C, or a read error.

use anyhow::Result;
use proxybar_core::{AppConfig, Settings, Supervisor, SupervisorEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    Start,
    Stop,
    Restart,
    Status,
    Logs,
    Clear,
    Url,
    Help,
    Quit,
}

impl ShellCommand {
    /// Parse one input line. Blank input yields `Ok(None)`.
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, String> {
        let command = match line.trim().to_lowercase().as_str() {
            "" => return Ok(None),
            "start" => ShellCommand::Start,
            "stop" => ShellCommand::Stop,
            "restart" => ShellCommand::Restart,
            "status" => ShellCommand::Status,
            "logs" => ShellCommand::Logs,
            "clear" => ShellCommand::Clear,
            "url" => ShellCommand::Url,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(format!("Unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

const HELP: &str = "Commands: start, stop, restart, status, logs, clear, url, quit";

pub async fn run(
    supervisor: Supervisor,
    mut settings: Settings,
    port_override: Option<u16>,
    no_start: bool,
) -> Result<()> {
    if let Some(port) = port_override {
        settings.set_port(port)?;
    }
    let port = settings.port.get();

    let printer = tokio::spawn(print_events(supervisor.clone(), supervisor.subscribe()));

    if !supervisor.is_installed() {
        println!(
            "{} is not installed: npm install -g {}",
            supervisor.config().program,
            supervisor.config().program
        );
    }

    if settings.auto_start && !no_start {
        start_in_background(&supervisor, port);
    }
    println!("{} (port {})", AppConfig::APP_NAME, port);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("stdin closed, waiting for Ctrl-C");
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                };

                match ShellCommand::parse(&line) {
                    Ok(Some(ShellCommand::Quit)) => break,
                    Ok(Some(command)) => execute(&supervisor, &settings, command),
                    Ok(None) => {}
                    Err(message) => println!("{}", message),
                }
            }
        }
    }

    println!("Shutting down...");
    supervisor.shutdown().await;
    printer.abort();
    Ok(())
}

fn execute(supervisor: &Supervisor, settings: &Settings, command: ShellCommand) {
    let port = settings.port.get();
    match command {
        ShellCommand::Start => start_in_background(supervisor, port),
        ShellCommand::Stop => supervisor.stop(),
        ShellCommand::Restart => {
            supervisor.stop();
            start_in_background(supervisor, port);
        }
        ShellCommand::Status => println!("{}", describe_status(supervisor)),
        ShellCommand::Logs => {
            for line in supervisor.log_lines() {
                println!("{}", line);
            }
        }
        ShellCommand::Clear => supervisor.clear_logs(),
        ShellCommand::Url => println!("{}", settings.webui_url()),
        ShellCommand::Help => println!("{}", HELP),
        ShellCommand::Quit => {}
    }
}

fn start_in_background(supervisor: &Supervisor, port: u16) {
    supervisor.spawn_start(port, move |success, detail| {
        if success {
            println!("Server started on port {}", port);
        } else {
            println!(
                "Failed to start server: {}",
                detail.unwrap_or_else(|| "Unknown error".to_string())
            );
        }
    });
}

fn describe_status(supervisor: &Supervisor) -> String {
    let status = supervisor.status();
    let mut text = status.phase.to_string();
    if let Some(pid) = status.pid {
        text.push_str(&format!(", pid {}", pid));
    }
    if let Some(port) = status.port {
        text.push_str(&format!(", port {}", port));
    }
    if let Some(uptime) = status.uptime_secs {
        text.push_str(&format!(", up {}s", uptime));
    }
    if !status.installed {
        text.push_str(", not installed");
    }
    text
}

async fn print_events(supervisor: Supervisor, mut events: broadcast::Receiver<SupervisorEvent>) {
    loop {
        match events.recv().await {
            Ok(SupervisorEvent::LogUpdated { line }) => println!("{}", line),
            Ok(SupervisorEvent::StatusChanged) => {
                if supervisor.is_running() {
                    println!("Server is running");
                } else {
                    println!("Server stopped");
                }
            }
            Ok(SupervisorEvent::InstallationChanged { installed }) => {
                if installed {
                    println!("{} found", supervisor.config().program);
                } else {
                    println!("{} not found", supervisor.config().program);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Missed {} supervisor events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
