//! Fire-and-forget control commands (`stop`, `pause`, `switch B`, ...).

use anyhow::{bail, Context, Result};
use colored::Colorize;

use rotator_core::{interval_in_range, Command, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES};
use rotator_daemon::{send_command, DaemonError};

use super::home;

pub fn send(command: Command) -> Result<()> {
    let home = home()?;
    match send_command(&home, &command) {
        Ok(()) => {
            println!("{} sent '{command}'", "✓".green());
            Ok(())
        }
        Err(DaemonError::ChannelUnavailable { .. }) => {
            bail!("daemon is not running; start it with `pvpn-rotator start`")
        }
        Err(err) => Err(err).with_context(|| format!("failed to send '{command}'")),
    }
}

/// The daemon ignores out-of-range values; warn before sending.
pub fn interval(minutes: u32) -> Result<()> {
    if !interval_in_range(minutes) {
        eprintln!(
            "{} {minutes} is outside {MIN_INTERVAL_MINUTES}-{MAX_INTERVAL_MINUTES}; the daemon will ignore it",
            "warning:".yellow().bold()
        );
    }
    send(Command::SetInterval(minutes))
}
