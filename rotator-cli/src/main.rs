//! pvpn-rotator — rotate ProtonVPN connections across two server lists.
//!
//! # Usage
//!
//! ```text
//! pvpn-rotator start [--backend-bin <prog>] [--json-logs]
//! pvpn-rotator stop | pause | resume | skip
//! pvpn-rotator switch <A|B>
//! pvpn-rotator interval <minutes>
//! pvpn-rotator status [--json]
//! pvpn-rotator list <A|B>
//! pvpn-rotator search <A|B> <pattern>
//! pvpn-rotator add|remove <A|B> <server>
//! pvpn-rotator replace <A|B> <find> <replace>
//! pvpn-rotator extract <input> [--list <A|B>] [--output <path>]
//! pvpn-rotator install-service | uninstall-service
//! pvpn-rotator logs [--lines N]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::{LogsArgs, StartArgs},
    extract::ExtractArgs,
    lists::ListCommand,
    status::StatusArgs,
};
use rotator_core::ListId;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pvpn-rotator",
    version,
    about = "Rotate ProtonVPN servers on a fixed interval",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the rotation daemon in the foreground.
    Start(StartArgs),

    /// Disconnect and stop the daemon.
    Stop,

    /// Stop rotating but keep the current connection.
    Pause,

    /// Resume rotation after a pause.
    Resume,

    /// Drop the current server and move to the next one.
    Skip,

    /// Rotate through another list, starting at its first server.
    Switch {
        /// List to rotate through (A or B).
        list: ListId,
    },

    /// Set the dwell time per server.
    Interval {
        /// Minutes per server (1-1440).
        minutes: u32,
    },

    /// Show daemon state, the active list and the current connection.
    Status(StatusArgs),

    #[command(flatten)]
    Lists(ListCommand),

    /// Pull server codes out of a pasted text dump.
    Extract(ExtractArgs),

    /// Write the systemd user unit.
    InstallService,

    /// Remove the systemd user unit.
    UninstallService,

    /// Print recent daemon log lines.
    Logs(LogsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Start(args) => args.run(),
        Commands::Stop => commands::control::send(rotator_core::Command::Stop),
        Commands::Pause => commands::control::send(rotator_core::Command::Pause),
        Commands::Resume => commands::control::send(rotator_core::Command::Resume),
        Commands::Skip => commands::control::send(rotator_core::Command::Skip),
        Commands::Switch { list } => {
            commands::control::send(rotator_core::Command::SwitchList(list))
        }
        Commands::Interval { minutes } => commands::control::interval(minutes),
        Commands::Status(args) => args.run(),
        Commands::Lists(command) => commands::lists::run(command),
        Commands::Extract(args) => args.run(),
        Commands::InstallService => commands::daemon::install_service(),
        Commands::UninstallService => commands::daemon::uninstall_service(),
        Commands::Logs(args) => args.run(),
    }
}
