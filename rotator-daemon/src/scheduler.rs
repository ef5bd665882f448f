//! Interval scheduler: the daemon's single control loop.
//!
//! One cooperative task. Each iteration drains the command queue, then either
//! idles (paused), or connects to the server under the cursor and dwells there
//! for the configured interval. Every wait wakes on a new command, on shutdown,
//! and at least once per [`Timings::tick`]. Backend calls run on the blocking
//! pool and the loop awaits them, so a hung backend stalls command handling.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

use rotator_core::{Command, ConfigStore, RotationState, ServerListProvider, Snapshot};

use crate::backend::{ConnectOutcome, ConnectionBackend};
use crate::channel::CommandQueue;
use crate::error::DaemonError;
use crate::machine::{Effects, RotationMachine, Selection};
use crate::shutdown::Shutdown;
use crate::status::{write_status, StatusReport};

/// Fixed delays of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Longest uninterrupted sleep inside a wait.
    pub tick: Duration,
    /// Period of "still waiting" / "still paused" log lines.
    pub heartbeat: Duration,
    /// Delay after a failed connection attempt.
    pub cooldown: Duration,
    /// Delay before re-reading an empty list.
    pub empty_list_retry: Duration,
    /// Sleep between polls while paused.
    pub paused_idle: Duration,
    /// Pause after a scheduled disconnect before the next connect.
    pub disconnect_settle: Duration,
    /// Delay after an iteration fails.
    pub error_backoff: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            heartbeat: Duration::from_secs(30),
            cooldown: Duration::from_secs(10),
            empty_list_retry: Duration::from_secs(10),
            paused_idle: Duration::from_secs(1),
            disconnect_settle: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Why a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    Elapsed,
    /// Shutdown, a state change, or a command that dropped the connection.
    Interrupted,
}

enum WaitEvent {
    Shutdown,
    Command(Command),
    Tick,
}

pub struct Scheduler {
    machine: RotationMachine,
    store: Box<dyn ConfigStore>,
    lists: Arc<dyn ServerListProvider>,
    backend: Arc<dyn ConnectionBackend>,
    commands: CommandQueue,
    shutdown: Shutdown,
    timings: Timings,
    status_file: Option<PathBuf>,
    last_status: Option<StatusReport>,
    repositioned: bool,
}

impl Scheduler {
    pub fn new(
        snapshot: Snapshot,
        store: Box<dyn ConfigStore>,
        lists: Arc<dyn ServerListProvider>,
        backend: Arc<dyn ConnectionBackend>,
        commands: CommandQueue,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            machine: RotationMachine::new(snapshot),
            store,
            lists,
            backend,
            commands,
            shutdown,
            timings: Timings::default(),
            status_file: None,
            last_status: None,
            repositioned: false,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Also write every status report to `path`.
    pub fn with_status_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_file = Some(path.into());
        self
    }

    pub fn machine(&self) -> &RotationMachine {
        &self.machine
    }

    pub fn last_status(&self) -> Option<&StatusReport> {
        self.last_status.as_ref()
    }

    /// Run until a `stop` command or shutdown.
    pub async fn run(&mut self) {
        let effects = self.machine.start();
        self.realize(effects, 0).await;

        let snapshot = self.machine.snapshot();
        tracing::info!(
            state = %self.machine.state(),
            active_list = %snapshot.active_list,
            interval_minutes = snapshot.switch_interval_minutes,
            "rotation started",
        );

        let mut paused_since_log: Option<Instant> = None;
        while !self.shutdown.is_triggered() && !self.machine.is_stopped() {
            let result = if self.machine.state() == RotationState::Paused {
                self.idle_paused(&mut paused_since_log).await;
                Ok(())
            } else {
                paused_since_log = None;
                self.iteration().await
            };

            if let Err(err) = result {
                tracing::error!(error = %err, "rotation loop iteration failed");
                self.wait(self.timings.error_backoff, false).await;
            }
        }

        if !self.machine.is_stopped() {
            tracing::info!("shutdown requested");
            let effects = self.machine.halt();
            self.realize(effects, 0).await;
        }
        tracing::info!("rotation stopped");
    }

    async fn iteration(&mut self) -> Result<(), DaemonError> {
        self.drain_commands().await;
        if self.shutdown.is_triggered() || self.machine.state() != RotationState::Running {
            return Ok(());
        }

        let list = self.machine.snapshot().active_list;
        let servers = self.lists.servers(list)?;
        let Some(selection) = self.machine.select(&servers) else {
            tracing::warn!(list = %list, "no servers in active list");
            self.wait(self.timings.empty_list_retry, false).await;
            return Ok(());
        };

        tracing::info!(
            list = %selection.list,
            position = selection.position + 1,
            total = selection.len,
            server = %selection.server,
            "connecting",
        );
        let outcome = self.connect(&selection.server).await?;
        tracing::info!(
            success = outcome.success,
            output = %truncate(&outcome.output, 100),
            "connection attempt finished",
        );

        if outcome.success {
            let identity = outcome.identity.unwrap_or_else(|| selection.server.clone());
            self.machine.record_connected(identity);
            self.dwell(&selection).await;
        } else {
            let effects = self.machine.record_failure(&selection);
            self.realize(effects, selection.len).await;
            tracing::warn!(
                server = %selection.server,
                cooldown_secs = self.timings.cooldown.as_secs(),
                "connection failed; moving to next server",
            );
            self.wait(self.timings.cooldown, false).await;
        }
        Ok(())
    }

    /// Stay on the connected server for the configured interval.
    async fn dwell(&mut self, selection: &Selection) {
        let minutes = self.machine.snapshot().switch_interval_minutes;
        let interval = Duration::from_secs(u64::from(minutes) * 60);
        tracing::info!(
            interval_secs = interval.as_secs(),
            connection = self.machine.connection().unwrap_or("None"),
            "connected; waiting for interval",
        );

        self.repositioned = false;
        if self.wait(interval, true).await == WaitOutcome::Interrupted {
            match self.machine.state() {
                RotationState::Paused => tracing::info!("paused during wait; keeping connection"),
                RotationState::Stopped => tracing::info!("stopped during wait"),
                RotationState::Running if self.shutdown.is_triggered() => {
                    tracing::info!("shutdown during wait")
                }
                RotationState::Running => tracing::info!("connection dropped during wait"),
            }
            return;
        }

        tracing::info!("interval complete; disconnecting");
        self.disconnect().await;
        if !self.repositioned {
            let effects = self.machine.advance_past(selection);
            self.realize(effects, selection.len).await;
        }
        tracing::info!(
            list = %self.machine.snapshot().active_list,
            index = self.machine.snapshot().current_index,
            "moved to next server",
        );
        self.wait(self.timings.disconnect_settle, false).await;
    }

    async fn idle_paused(&mut self, since_log: &mut Option<Instant>) {
        let now = Instant::now();
        let due = since_log.map_or(true, |at| now.duration_since(at) >= self.timings.heartbeat);
        if due {
            tracing::info!(
                connection = self.machine.connection().unwrap_or("None"),
                "daemon paused",
            );
            *since_log = Some(now);
        }
        self.drain_commands().await;
        if self.machine.state() == RotationState::Paused {
            self.wait(self.timings.paused_idle, false).await;
        }
    }

    /// Sleep for `duration`, handling commands as they arrive. Ends early on
    /// shutdown, on a state change, or when a command drops the connection.
    async fn wait(&mut self, duration: Duration, heartbeat: bool) -> WaitOutcome {
        let started = Instant::now();
        let deadline = started + duration;
        let initial_state = self.machine.state();
        let mut next_heartbeat = started + self.timings.heartbeat;
        let mut shutdown = self.shutdown.clone();

        loop {
            if shutdown.is_triggered() {
                return WaitOutcome::Interrupted;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::Elapsed;
            }
            if heartbeat && now >= next_heartbeat {
                tracing::info!(
                    elapsed_secs = now.duration_since(started).as_secs(),
                    total_secs = duration.as_secs(),
                    "waiting",
                );
                next_heartbeat += self.timings.heartbeat;
            }

            let slice_end = deadline.min(now + self.timings.tick);
            let event = tokio::select! {
                _ = shutdown.wait() => WaitEvent::Shutdown,
                command = self.commands.next() => WaitEvent::Command(command),
                _ = sleep_until(slice_end) => WaitEvent::Tick,
            };

            match event {
                WaitEvent::Shutdown => return WaitOutcome::Interrupted,
                WaitEvent::Tick => {}
                WaitEvent::Command(command) => {
                    let effects = self.handle_command(command).await;
                    if effects.disconnect || self.machine.state() != initial_state {
                        return WaitOutcome::Interrupted;
                    }
                }
            }
        }
    }

    async fn drain_commands(&mut self) {
        while let Some(command) = self.commands.poll() {
            self.handle_command(command).await;
            if self.machine.is_stopped() {
                break;
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Effects {
        tracing::info!(command = %command, "received command");
        let list_len = match command {
            Command::Skip | Command::Status => self.active_list_len(),
            _ => 0,
        };
        let effects = self.machine.apply(command, list_len);
        self.realize(effects, list_len).await;
        effects
    }

    /// Carry out the side effects of a transition.
    async fn realize(&mut self, effects: Effects, list_len: usize) {
        if effects.repositioned {
            self.repositioned = true;
        }
        if effects.disconnect {
            self.disconnect().await;
        }
        if effects.persist {
            self.persist();
        }
        if effects.report_status {
            self.report_status(list_len);
        }
        if self.machine.is_stopped() {
            self.shutdown.trigger();
        }
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(self.machine.snapshot()) {
            tracing::error!(error = %err, "failed to persist snapshot");
        }
    }

    fn report_status(&mut self, list_len: usize) {
        let report = StatusReport::capture(&self.machine, list_len);
        tracing::info!("[STATUS] {}", report.summary());
        if let Some(path) = &self.status_file {
            if let Err(err) = write_status(path, &report) {
                tracing::warn!(path = %path.display(), error = %err, "failed to write status file");
            }
        }
        self.last_status = Some(report);
    }

    fn active_list_len(&self) -> usize {
        let list = self.machine.snapshot().active_list;
        match self.lists.servers(list) {
            Ok(servers) => servers.len(),
            Err(err) => {
                tracing::warn!(list = %list, error = %err, "failed to read active list");
                0
            }
        }
    }

    async fn connect(&self, server: &str) -> Result<ConnectOutcome, DaemonError> {
        let backend = Arc::clone(&self.backend);
        let server = server.to_string();
        tokio::task::spawn_blocking(move || backend.connect(&server))
            .await
            .map_err(|err| DaemonError::Backend(format!("connect task join error: {err}")))
    }

    async fn disconnect(&mut self) {
        self.machine.clear_connection();
        let backend = Arc::clone(&self.backend);
        match tokio::task::spawn_blocking(move || backend.disconnect()).await {
            Ok(Ok(())) => tracing::debug!("disconnected"),
            Ok(Err(err)) => tracing::warn!(error = %err, "disconnect failed"),
            Err(err) => tracing::error!(error = %err, "disconnect task join error"),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}
