//! Status report emitted on `status`.
//!
//! The report goes to the log and to `status.json`, which the CLI reads back
//! since the command channel carries no replies.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rotator_core::store::write_atomic;
use rotator_core::{ListId, RotationState};

use crate::error::{io_err, DaemonError};
use crate::machine::RotationMachine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub version: String,
    pub state: RotationState,
    pub running: bool,
    pub paused: bool,
    pub active_list: ListId,
    pub switch_interval_minutes: u32,
    pub current_index: usize,
    pub list_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_connection: Option<String>,
    pub pid: u32,
    pub updated_at: DateTime<Utc>,
}

impl StatusReport {
    pub fn capture(machine: &RotationMachine, list_len: usize) -> Self {
        let snapshot = machine.snapshot();
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: machine.state(),
            running: snapshot.running,
            paused: machine.state() == RotationState::Paused,
            active_list: snapshot.active_list,
            switch_interval_minutes: snapshot.switch_interval_minutes,
            current_index: machine.cursor().position(list_len),
            list_len,
            current_connection: machine.connection().map(str::to_owned),
            pid: std::process::id(),
            updated_at: Utc::now(),
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "Daemon: {}, State: {}, Active List: {}, Interval: {}min, Index: {}/{}, Current VPN: {}",
            if self.running { "RUNNING" } else { "STOPPED" },
            if self.paused { "PAUSED" } else { "ACTIVE" },
            self.active_list,
            self.switch_interval_minutes,
            self.current_index,
            self.list_len,
            self.current_connection.as_deref().unwrap_or("None"),
        )
    }
}

pub fn write_status(path: &Path, report: &StatusReport) -> Result<(), DaemonError> {
    let json = serde_json::to_string_pretty(report)?;
    write_atomic(path, json.as_bytes())?;
    Ok(())
}

/// `Ok(None)` when no report has been written yet.
pub fn read_status(path: &Path) -> Result<Option<StatusReport>, DaemonError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotator_core::{Command, Snapshot};
    use tempfile::TempDir;

    #[test]
    fn summary_reports_pause_and_identity() {
        let mut machine = RotationMachine::new(Snapshot::default());
        machine.start();
        machine.record_connected("US#1 in New York".to_string());
        machine.apply(Command::Pause, 3);

        let report = StatusReport::capture(&machine, 3);
        assert_eq!(
            report.summary(),
            "Daemon: RUNNING, State: PAUSED, Active List: A, Interval: 10min, Index: 0/3, Current VPN: US#1 in New York"
        );
    }

    #[test]
    fn write_then_read_status_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("status.json");
        assert!(read_status(&path).expect("read missing").is_none());

        let machine = RotationMachine::new(Snapshot::default());
        let report = StatusReport::capture(&machine, 0);
        write_status(&path, &report).expect("write");
        let loaded = read_status(&path).expect("read").expect("present");
        assert_eq!(loaded.state, RotationState::Stopped);
        assert_eq!(loaded.current_connection, None);
        assert_eq!(loaded.summary(), report.summary());
    }
}
