//! Connection backend seam.
//!
//! The daemon never speaks VPN itself. It hands a server id to a backend and
//! only looks at success and an optional human-readable identity. Calls are
//! synchronous and may block for as long as the backend takes.

use std::path::PathBuf;
use std::process::Command;

use crate::error::{io_err, DaemonError};

pub const DEFAULT_BACKEND_PROGRAM: &str = "protonvpn";

/// Result of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub success: bool,
    /// Raw backend output, kept for logging.
    pub output: String,
    /// Identity reported by the backend (e.g. `CH-HR#2 in Zagreb, Croatia`).
    pub identity: Option<String>,
}

impl ConnectOutcome {
    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            identity: None,
        }
    }
}

pub trait ConnectionBackend: Send + Sync + 'static {
    fn connect(&self, server: &str) -> ConnectOutcome;

    fn disconnect(&self) -> Result<(), DaemonError>;
}

/// Drives the `protonvpn` command-line client.
#[derive(Debug, Clone)]
pub struct ProtonVpnCli {
    program: PathBuf,
}

impl ProtonVpnCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ProtonVpnCli {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_PROGRAM)
    }
}

impl ConnectionBackend for ProtonVpnCli {
    fn connect(&self, server: &str) -> ConnectOutcome {
        let output = match Command::new(&self.program)
            .args(["connect", server])
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                return ConnectOutcome::failed(format!(
                    "failed to launch {}: {err}",
                    self.program.display()
                ))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return ConnectOutcome {
                success: true,
                identity: parse_identity(&stdout),
                output: stdout,
            };
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        ConnectOutcome::failed(format!(
            "failed to connect to {server} (status {}): {stderr}",
            output.status
        ))
    }

    fn disconnect(&self) -> Result<(), DaemonError> {
        let output = Command::new(&self.program)
            .arg("disconnect")
            .output()
            .map_err(|e| io_err(&self.program, e))?;
        if output.status.success() {
            return Ok(());
        }
        Err(DaemonError::Backend(format!(
            "disconnect failed (status {}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Extract the server description from `Connected to <identity>. ...`.
pub fn parse_identity(output: &str) -> Option<String> {
    let (_, rest) = output.split_once("Connected to ")?;
    let identity = rest.split('.').next().unwrap_or_default().trim();
    if identity.is_empty() {
        None
    } else {
        Some(identity.to_string())
    }
}
