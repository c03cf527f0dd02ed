//! Lifecycle of the supervised server process.
//!
//! # State Machine
//!
//! ```text
//! Stopped --start--> Starting --confirmed--> Running
//!    ^                  |                       |
//!    |            exit / stop             exit / stop
//!    |                  v                       v
//!    +--reaped------ Stopping <-----------------+
//! ```
//!
//! Every run gets a generation number. Confirmation, the exit watcher and
//! the output sink only touch state while their generation is the active
//! one, so a stop racing a confirmation always wins.

use super::launcher::{self, LaunchPlan};
use super::output::{OutputCapture, OutputLine};
use super::resolver::CommandResolver;
use crate::config::{Port, SupervisorConfig, SupervisorDefaults};
use crate::error::{Result, SupervisorError};
use crate::events::{StatusPublisher, SupervisorEvent};
use crate::logs::{LogBuffer, LogEntry};
use crate::platform;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Lifecycle phase of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Stopped => "stopped",
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupervisorStatus {
    pub phase: Phase,
    pub running: bool,
    pub installed: bool,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub started_at: Option<DateTime<Local>>,
    pub uptime_secs: Option<i64>,
}

/// Outcome of one start attempt, shared with every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Startup {
    Pending,
    Confirmed,
    NotInstalled,
    SpawnFailed {
        kind: std::io::ErrorKind,
        message: String,
    },
    Exited {
        code: Option<i32>,
        tail: String,
    },
    Cancelled,
}

impl Startup {
    fn is_settled(&self) -> bool {
        !matches!(self, Startup::Pending)
    }

    fn into_result(self, program: &str) -> Result<()> {
        match self {
            Startup::Confirmed => Ok(()),
            Startup::NotInstalled => Err(SupervisorError::NotInstalled {
                program: program.to_string(),
            }),
            Startup::SpawnFailed { kind, message } => Err(SupervisorError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(kind, message),
            }),
            Startup::Exited { code, tail } => Err(SupervisorError::EarlyExit {
                program: program.to_string(),
                code,
                tail,
            }),
            Startup::Pending | Startup::Cancelled => Err(SupervisorError::Cancelled),
        }
    }
}

impl From<&SupervisorError> for Startup {
    fn from(err: &SupervisorError) -> Self {
        match err {
            SupervisorError::NotInstalled { .. } => Startup::NotInstalled,
            SupervisorError::Spawn { source, .. } => Startup::SpawnFailed {
                kind: source.kind(),
                message: source.to_string(),
            },
            SupervisorError::EarlyExit { code, tail, .. } => Startup::Exited {
                code: *code,
                tail: tail.clone(),
            },
            SupervisorError::Cancelled => Startup::Cancelled,
            other => Startup::SpawnFailed {
                kind: std::io::ErrorKind::Other,
                message: other.to_string(),
            },
        }
    }
}

/// The run that currently owns the supervisor.
struct ActiveRun {
    generation: u64,
    port: Port,
    pid: Option<u32>,
    started_at: Option<DateTime<Local>>,
    /// Present once a child exists; firing it hands the child to the
    /// graceful-then-forced shutdown path.
    stop_tx: Option<oneshot::Sender<()>>,
    startup: watch::Sender<Startup>,
    watcher: Option<JoinHandle<()>>,
    /// Set once the child has been reaped, while its output may still drain.
    exited: bool,
}

impl ActiveRun {
    fn settle(&self, outcome: Startup) {
        self.startup.send_if_modified(|current| {
            if current.is_settled() {
                false
            } else {
                *current = outcome;
                true
            }
        });
    }
}

struct State {
    phase: Phase,
    active: Option<ActiveRun>,
    /// Released runs whose child has not been reaped yet.
    draining: BTreeMap<u64, Option<JoinHandle<()>>>,
    next_generation: u64,
    installed: bool,
    logs: LogBuffer,
}

impl State {
    fn is_active(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| run.generation == generation)
    }

    /// Recompute the phase after the active run went away.
    fn settle_phase(&mut self) {
        if self.active.is_none() {
            self.phase = if self.draining.is_empty() {
                Phase::Stopped
            } else {
                Phase::Stopping
            };
        }
    }
}

struct Inner {
    config: SupervisorConfig,
    resolver: Arc<CommandResolver>,
    state: Mutex<State>,
    events: StatusPublisher,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the buffer and publish, inside the caller's critical section.
    fn log(&self, state: &mut State, text: impl Into<String>, is_error: bool) {
        let line = state.logs.append(LogEntry::new(text, is_error));
        self.events.publish(SupervisorEvent::LogUpdated { line });
    }

    fn set_installed(&self, state: &mut State, installed: bool) {
        if state.installed != installed {
            state.installed = installed;
            self.events
                .publish(SupervisorEvent::InstallationChanged { installed });
        }
    }

    fn error_tail(&self, state: &State) -> String {
        let tail = state.logs.tail(self.config.error_tail_lines);
        if tail.is_empty() {
            "Unknown error".to_string()
        } else {
            tail.join("\n")
        }
    }

    /// Drop the active run if it is `generation`, settling its waiters.
    fn abort_start(&self, generation: u64, outcome: Startup) {
        let mut state = self.lock();
        if !state.is_active(generation) {
            return;
        }
        if let Some(run) = state.active.take() {
            run.settle(outcome);
        }
        state.settle_phase();
    }

    /// Resolve, spawn, and confirm one run. Owns the start sequence so a
    /// dropped `start()` future cannot strand the supervisor in `Starting`.
    async fn launch(self: Arc<Self>, generation: u64, port: Port) {
        let config = self.config.clone();
        let resolver = Arc::clone(&self.resolver);
        let prepared = tokio::task::spawn_blocking(move || {
            if let Some(pattern) = config.orphan_pattern.as_deref() {
                let signalled = platform::terminate_matching(pattern);
                if signalled > 0 {
                    debug!("Signalled {} orphaned instance(s)", signalled);
                }
            }
            launcher::plan_launch(&config, &resolver)
        })
        .await;

        let plan = match prepared {
            Ok(Ok(plan)) => plan,
            Ok(Err(e)) => {
                warn!("Start aborted: {}", e);
                if matches!(e, SupervisorError::NotInstalled { .. }) {
                    let mut state = self.lock();
                    self.set_installed(&mut state, false);
                }
                self.abort_start(generation, Startup::from(&e));
                return;
            }
            Err(join_err) => {
                error!("Launch preparation panicked: {}", join_err);
                self.abort_start(
                    generation,
                    Startup::SpawnFailed {
                        kind: std::io::ErrorKind::Other,
                        message: join_err.to_string(),
                    },
                );
                return;
            }
        };

        let startup_rx = {
            let mut state = self.lock();
            if !state.is_active(generation) {
                debug!("Run {} cancelled before spawn", generation);
                return;
            }
            self.set_installed(&mut state, true);

            let mut child = match plan.spawn(&self.config.program, port) {
                Ok(child) => child,
                Err(e) => {
                    error!("{}", e);
                    if let Some(run) = state.active.take() {
                        run.settle(Startup::from(&e));
                    }
                    state.settle_phase();
                    return;
                }
            };

            let pid = child.id();
            info!("Spawned {} (pid {:?}) on port {}", self.config.program, pid, port);
            self.log(&mut state, format!("Starting server on port {}...", port), false);

            let sink_inner = Arc::clone(&self);
            let capture = OutputCapture::start(
                child.stdout.take(),
                child.stderr.take(),
                move |line| sink_inner.record_output(generation, line),
            );

            let (stop_tx, stop_rx) = oneshot::channel();
            let watcher = tokio::spawn(Arc::clone(&self).watch_child(
                generation, child, stop_rx, capture,
            ));

            match state.active.as_mut() {
                Some(run) => {
                    run.pid = pid;
                    run.started_at = Some(Local::now());
                    run.stop_tx = Some(stop_tx);
                    run.watcher = Some(watcher);
                    run.startup.subscribe()
                }
                None => return,
            }
        };

        self.confirm_after_delay(generation, startup_rx).await;
    }

    /// Race the confirmation window against any other settlement of the run.
    async fn confirm_after_delay(&self, generation: u64, mut startup_rx: watch::Receiver<Startup>) {
        let window_elapsed = tokio::select! {
            _ = tokio::time::sleep(self.config.confirm_delay) => true,
            _ = startup_rx.wait_for(Startup::is_settled) => false,
        };
        if !window_elapsed {
            return;
        }

        let mut state = self.lock();
        let Some(run) = state.active.as_ref() else {
            return;
        };
        if run.generation != generation || run.exited || run.startup.borrow().is_settled() {
            return;
        }
        // Publish before settling so callers woken by the settle see the event.
        self.events.publish(SupervisorEvent::StatusChanged);
        run.settle(Startup::Confirmed);
        state.phase = Phase::Running;
        info!("{} confirmed running", self.config.program);
    }

    /// Record a reaped child before its output is drained. A confirmed run
    /// stops counting as running here.
    fn mark_exited(&self, generation: u64) {
        let mut state = self.lock();
        let was_running = state.phase == Phase::Running;
        let Some(run) = state.active.as_mut().filter(|run| run.generation == generation) else {
            return;
        };
        run.exited = true;
        run.pid = None;
        if was_running {
            state.phase = Phase::Stopping;
            self.events.publish(SupervisorEvent::StatusChanged);
        }
    }

    fn record_output(&self, generation: u64, line: OutputLine) {
        let mut state = self.lock();
        if state.is_active(generation) {
            self.log(&mut state, line.text, line.is_error);
        }
    }

    /// Wait for the child to exit, or for a stop request followed by the
    /// grace period and a forced kill.
    async fn watch_child(
        self: Arc<Self>,
        generation: u64,
        mut child: Child,
        stop_rx: oneshot::Receiver<()>,
        capture: OutputCapture,
    ) {
        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = stop_rx => None,
        };
        let status = match exited {
            Some(status) => {
                self.mark_exited(generation);
                status
            }
            None => self.terminate_child(generation, &mut child).await,
        };

        if !capture.drain(SupervisorDefaults::OUTPUT_DRAIN_TIMEOUT).await {
            debug!("Output of run {} did not close in time", generation);
        }

        let status = match status {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("Failed to wait for {}: {}", self.config.program, e);
                None
            }
        };

        let mut state = self.lock();
        if state.is_active(generation) {
            if let Some(line) = exit_line(status.as_ref()) {
                self.log(&mut state, line, false);
            }
            if let Some(run) = state.active.take() {
                // No-op for a run that was already confirmed.
                let tail = self.error_tail(&state);
                run.settle(Startup::Exited {
                    code: status.and_then(|s| s.code()),
                    tail,
                });
            }
            state.settle_phase();
            info!("{} exited ({:?})", self.config.program, status);
        } else {
            state.draining.remove(&generation);
            state.settle_phase();
            debug!("Run {} reaped after stop", generation);
        }
    }

    /// SIGTERM has already been sent by `stop()`.
    async fn terminate_child(
        &self,
        generation: u64,
        child: &mut Child,
    ) -> std::io::Result<ExitStatus> {
        match tokio::time::timeout(self.config.stop_grace, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                if let Err(e) = child.start_kill() {
                    debug!("Forced kill of run {} failed: {}", generation, e);
                }
                {
                    let mut state = self.lock();
                    self.log(&mut state, "Force killed server", false);
                }
                child.wait().await
            }
        }
    }
}

enum StartTicket {
    AlreadyRunning,
    Waiting(watch::Receiver<Startup>),
}

/// Handle to the process supervisor. Clones share one supervisor.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    /// Create a supervisor and probe the installation once.
    pub fn new(config: SupervisorConfig, resolver: CommandResolver) -> Self {
        let logs = LogBuffer::new(config.log_capacity);
        let supervisor = Self {
            inner: Arc::new(Inner {
                config,
                resolver: Arc::new(resolver),
                state: Mutex::new(State {
                    phase: Phase::Stopped,
                    active: None,
                    draining: BTreeMap::new(),
                    next_generation: 1,
                    installed: false,
                    logs,
                }),
                events: StatusPublisher::new(SupervisorDefaults::EVENT_CHANNEL_CAPACITY),
            }),
        };
        supervisor.check_installation();
        supervisor
    }

    /// Default program, runner, and search locations for the current user.
    pub fn with_defaults() -> Self {
        Self::new(SupervisorConfig::default(), CommandResolver::from_env())
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    pub fn resolver(&self) -> &CommandResolver {
        &self.inner.resolver
    }

    /// Start the server on `port`.
    ///
    /// Returns once the confirmation window has passed with the child alive,
    /// or with the reason it did not. Succeeds immediately when already
    /// running; a call made while another start is pending shares its
    /// outcome.
    pub async fn start(&self, port: u16) -> Result<()> {
        let port = Port::new(port)?;

        let mut startup_rx = match self.begin_start(port) {
            StartTicket::AlreadyRunning => return Ok(()),
            StartTicket::Waiting(rx) => rx,
        };

        // An error here means the sender is gone; the last value still holds.
        let _ = startup_rx.wait_for(Startup::is_settled).await;
        let outcome = startup_rx.borrow().clone();
        outcome.into_result(&self.inner.config.program)
    }

    fn begin_start(&self, port: Port) -> StartTicket {
        let mut state = self.inner.lock();

        match state.phase {
            Phase::Running => return StartTicket::AlreadyRunning,
            Phase::Starting => {
                if let Some(run) = state.active.as_ref() {
                    if run.port != port {
                        debug!(
                            "Start on port {} joins pending start on port {}",
                            port, run.port
                        );
                    }
                    return StartTicket::Waiting(run.startup.subscribe());
                }
            }
            Phase::Stopped | Phase::Stopping => {}
        }

        // A crashed run may still be draining its output.
        if let Some(mut previous) = state.active.take() {
            state.draining.insert(previous.generation, previous.watcher.take());
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let (startup, startup_rx) = watch::channel(Startup::Pending);
        state.active = Some(ActiveRun {
            generation,
            port,
            pid: None,
            started_at: None,
            stop_tx: None,
            startup,
            watcher: None,
            exited: false,
        });
        state.phase = Phase::Starting;
        drop(state);

        tokio::spawn(Arc::clone(&self.inner).launch(generation, port));
        StartTicket::Waiting(startup_rx)
    }

    /// Start in the background and report through `on_complete(success,
    /// error_detail)`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn_start<F>(&self, port: u16, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(bool, Option<String>) + Send + 'static,
    {
        let supervisor = self.clone();
        tokio::spawn(async move {
            match supervisor.start(port).await {
                Ok(()) => on_complete(true, None),
                Err(e) => on_complete(false, Some(e.detail())),
            }
        })
    }

    /// Stop the server without waiting for it to exit.
    ///
    /// Does nothing when no child is alive. Otherwise sends SIGTERM, releases
    /// the run, and leaves the forced kill to the exit watcher.
    pub fn stop(&self) {
        let inner = &self.inner;
        let mut state = inner.lock();

        let Some(mut run) = state.active.take() else {
            state.settle_phase();
            return;
        };
        let was_running = state.phase == Phase::Running;

        let Some(stop_tx) = run.stop_tx.take() else {
            // Still resolving; nothing was spawned.
            debug!("Start of run {} cancelled before spawn", run.generation);
            run.settle(Startup::Cancelled);
            state.settle_phase();
            return;
        };

        if !run.exited {
            inner.log(&mut state, "Stopping server...", false);
        }
        // `pid` is cleared once the child is reaped.
        if let Some(pid) = run.pid.filter(|pid| platform::is_process_alive(*pid)) {
            if let Err(e) = platform::send_terminate(pid) {
                debug!("SIGTERM to {} failed: {}", pid, e);
            }
        }
        if stop_tx.send(()).is_err() {
            debug!("Exit watcher for run {} already finished", run.generation);
        }
        run.settle(Startup::Cancelled);

        state.draining.insert(run.generation, run.watcher.take());
        state.phase = Phase::Stopping;
        info!("Stopping {}", inner.config.program);
        if was_running {
            inner.events.publish(SupervisorEvent::StatusChanged);
        }
    }

    /// Stop, then wait for the child to be reaped, bounded by the grace
    /// period plus one second.
    pub async fn shutdown(&self) {
        self.stop();

        let watchers: Vec<JoinHandle<()>> = {
            let mut state = self.inner.lock();
            state
                .draining
                .values_mut()
                .filter_map(Option::take)
                .collect()
        };

        let deadline =
            tokio::time::Instant::now() + self.inner.config.stop_grace + Duration::from_secs(1);
        for watcher in watchers {
            if tokio::time::timeout_at(deadline, watcher).await.is_err() {
                warn!("Timed out waiting for {} to exit", self.inner.config.program);
                break;
            }
        }
    }

    pub fn clear_logs(&self) {
        self.inner.lock().logs.clear();
    }

    /// Re-probe whether the program or its runner can be found.
    ///
    /// Blocking: may run the PATH-lookup subprocess.
    pub fn check_installation(&self) -> bool {
        let installed = launcher::is_installed(&self.inner.config, &self.inner.resolver);
        let mut state = self.inner.lock();
        self.inner.set_installed(&mut state, installed);
        installed
    }

    /// The plan `start()` would execute right now.
    pub fn launch_plan(&self) -> Result<LaunchPlan> {
        launcher::plan_launch(&self.inner.config, &self.inner.resolver)
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().phase == Phase::Running
    }

    pub fn is_installed(&self) -> bool {
        self.inner.lock().installed
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.inner.lock().logs.snapshot()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.inner.lock().logs.lines()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self) -> SupervisorStatus {
        let state = self.inner.lock();
        let active = state.active.as_ref();
        let started_at = active.and_then(|run| run.started_at);

        SupervisorStatus {
            phase: state.phase,
            running: state.phase == Phase::Running,
            installed: state.installed,
            pid: active.and_then(|run| run.pid),
            port: active.map(|run| run.port.get()),
            started_at,
            uptime_secs: started_at.map(|at| (Local::now() - at).num_seconds()),
        }
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("program", &self.inner.config.program)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Log line for an unsuccessful exit; `None` for a clean exit.
fn exit_line(status: Option<&ExitStatus>) -> Option<String> {
    let Some(status) = status else {
        return Some("Server exited with unknown status".to_string());
    };
    if status.success() {
        return None;
    }
    if let Some(code) = status.code() {
        return Some(format!("Server exited with code {}", code));
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(format!("Server terminated by signal {}", signal));
        }
    }

    Some("Server exited abnormally".to_string())
}
