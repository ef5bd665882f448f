//! `pvpn-rotator status` — ask the daemon for a report, or show the persisted
//! snapshot when no daemon is listening.

use std::path::Path;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use rotator_core::{Command, JsonFileStore, ListFiles, ListId, RotationState, Snapshot};
use rotator_daemon::paths::status_path;
use rotator_daemon::{read_status, send_command, DaemonError, StatusReport};

use super::home;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Arguments for `pvpn-rotator status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Seconds to wait for the daemon's report.
    #[arg(long, default_value_t = 3)]
    pub wait: u64,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let requested_at = Utc::now();

        match send_command(&home, &Command::Status) {
            Ok(()) => {
                let deadline = Duration::from_secs(self.wait);
                match wait_for_report(&status_path(&home), requested_at, deadline) {
                    Some(report) => print_live(&report, self.json),
                    None => {
                        eprintln!(
                            "{} daemon did not report within {}s; showing persisted state",
                            "warning:".yellow().bold(),
                            self.wait
                        );
                        print_offline(&home, self.json)
                    }
                }
            }
            Err(DaemonError::ChannelUnavailable { .. }) => print_offline(&home, self.json),
            Err(err) => Err(err).context("failed to request daemon status"),
        }
    }
}

/// Poll `status.json` until a report newer than `requested_at` appears.
fn wait_for_report(
    path: &Path,
    requested_at: DateTime<Utc>,
    timeout: Duration,
) -> Option<StatusReport> {
    let started = Instant::now();
    loop {
        // Unparseable reports count as absent.
        if let Ok(Some(report)) = read_status(path) {
            if report.updated_at >= requested_at {
                return Some(report);
            }
        }
        if started.elapsed() >= timeout {
            return None;
        }
        sleep(POLL_INTERVAL);
    }
}

/// Status of a home with no live daemon.
#[derive(Debug, Serialize)]
struct OfflineStatus {
    running: bool,
    state: RotationState,
    paused: bool,
    active_list: ListId,
    switch_interval_minutes: u32,
    current_index: usize,
    list_len: usize,
}

impl OfflineStatus {
    fn from_snapshot(snapshot: &Snapshot, list_len: usize) -> Self {
        Self {
            running: false,
            state: RotationState::Stopped,
            paused: snapshot.paused,
            active_list: snapshot.active_list,
            switch_interval_minutes: snapshot.switch_interval_minutes,
            current_index: snapshot.cursor().position(list_len),
            list_len,
        }
    }
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "field")]
    field: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

fn print_live(report: &StatusReport, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("failed to serialize status JSON")?
        );
        return Ok(());
    }

    println!(
        "pvpn-rotator v{} | daemon {} (pid {})",
        report.version,
        state_label(report.state),
        report.pid
    );
    let rows = vec![
        row("state", state_label(report.state)),
        row("active list", report.active_list.to_string()),
        row("interval", format!("{} min", report.switch_interval_minutes)),
        row(
            "position",
            format!("{}/{}", report.current_index, report.list_len),
        ),
        row(
            "current vpn",
            report
                .current_connection
                .clone()
                .unwrap_or_else(|| "None".to_string()),
        ),
        row("reported", report.updated_at.to_rfc3339()),
    ];
    print_table(rows);
    Ok(())
}

fn print_offline(home: &Path, json: bool) -> Result<()> {
    let store = JsonFileStore::at(home);
    let snapshot = store
        .read()
        .with_context(|| format!("failed to read {}", store.path().display()))?
        .unwrap_or_default();
    let list_len = ListFiles::at(home)
        .read(snapshot.active_list)
        .with_context(|| format!("failed to read list {}", snapshot.active_list))?
        .len();
    let status = OfflineStatus::from_snapshot(&snapshot, list_len);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("failed to serialize status JSON")?
        );
        return Ok(());
    }

    println!(
        "pvpn-rotator v{} | daemon {}",
        env!("CARGO_PKG_VERSION"),
        "NOT RUNNING".bright_black().bold()
    );
    let paused = if status.paused { "yes" } else { "no" };
    let rows = vec![
        row("active list", status.active_list.to_string()),
        row("interval", format!("{} min", status.switch_interval_minutes)),
        row(
            "position",
            format!("{}/{}", status.current_index, status.list_len),
        ),
        row("paused on exit", paused.to_string()),
    ];
    print_table(rows);
    println!("Run 'pvpn-rotator start' to begin rotating.");
    Ok(())
}

fn row(field: &'static str, value: impl Into<String>) -> FieldRow {
    FieldRow {
        field,
        value: value.into(),
    }
}

fn print_table(rows: Vec<FieldRow>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn state_label(state: RotationState) -> String {
    match state {
        RotationState::Running => "RUNNING".green().bold().to_string(),
        RotationState::Paused => "PAUSED".yellow().bold().to_string(),
        RotationState::Stopped => "STOPPED".red().bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_status_reduces_stale_index() {
        let snapshot = Snapshot {
            current_index: 7,
            paused: true,
            ..Snapshot::default()
        };
        let status = OfflineStatus::from_snapshot(&snapshot, 3);
        assert!(!status.running);
        assert_eq!(status.state, RotationState::Stopped);
        assert_eq!(status.current_index, 1);
        assert!(status.paused);
    }

    #[test]
    fn missing_report_times_out() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let found = wait_for_report(
            &dir.path().join("status.json"),
            Utc::now(),
            Duration::from_millis(150),
        );
        assert!(found.is_none());
    }
}
