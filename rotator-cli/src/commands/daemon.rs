//! `pvpn-rotator start`, systemd unit management and `logs`.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use rotator_daemon::backend::DEFAULT_BACKEND_PROGRAM;
use rotator_daemon::paths::{log_path, SERVICE_NAME};
use rotator_daemon::{running_pid, service, start_blocking, DaemonOptions};

use super::home;

#[derive(Args, Debug)]
pub struct StartArgs {
    /// ProtonVPN command-line client to drive.
    #[arg(long, value_name = "PROG", default_value = DEFAULT_BACKEND_PROGRAM)]
    pub backend_bin: PathBuf,

    /// Emit JSON log lines.
    #[arg(long)]
    pub json_logs: bool,
}

impl StartArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        if let Some(pid) = running_pid(&home) {
            bail!("daemon already running (pid {pid})");
        }

        let options = DaemonOptions {
            backend_program: self.backend_bin,
            json_logs: self.json_logs,
            ..DaemonOptions::new(home)
        };
        start_blocking(options).context("daemon exited with error")
    }
}

pub fn install_service() -> Result<()> {
    let home = home()?;
    let binary = std::env::current_exe().context("failed to resolve pvpn-rotator binary path")?;
    let unit = service::install(&home, &binary).context("failed to install systemd unit")?;

    println!("{} wrote {}", "✓".green(), unit.display());
    println!("Enable it with:");
    for line in service::enable_hint() {
        println!("  {line}");
    }
    Ok(())
}

pub fn uninstall_service() -> Result<()> {
    let home = home()?;
    if service::uninstall(&home).context("failed to uninstall systemd unit")? {
        println!("{} removed {SERVICE_NAME}", "✓".green());
        println!("If it was enabled, also run:");
        println!("  systemctl --user disable --now {SERVICE_NAME}");
        println!("  systemctl --user daemon-reload");
    } else {
        println!("{SERVICE_NAME} is not installed");
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,
}

impl LogsArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        print_tail(&log_path(&home), self.lines).context("failed to read daemon log")
    }
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::with_capacity(lines);
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if lines == 0 {
            continue;
        }
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
