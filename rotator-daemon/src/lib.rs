//! Rotation daemon: command channel, state machine, interval scheduler.
//!
//! - [`channel`] / [`protocol`] — line-oriented command queue and its Unix socket transport
//! - [`machine`] — pure rotation state machine
//! - [`scheduler`] — the single control loop
//! - [`backend`] — connection backend seam and the `protonvpn` driver
//! - [`runtime`] — process wiring, signals, liveness marker
//! - [`service`] — systemd user unit

pub mod backend;
pub mod channel;
mod error;
pub mod machine;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod scheduler;
pub mod service;
pub mod shutdown;
pub mod status;

pub use backend::{ConnectOutcome, ConnectionBackend, ProtonVpnCli};
pub use channel::{CommandQueue, CommandSender, QueueWriter};
pub use error::DaemonError;
pub use machine::{Effects, RotationMachine, Selection};
pub use protocol::{send_command, CommandListener, SocketSender};
pub use runtime::{load_snapshot, run, running_pid, start_blocking, DaemonOptions};
pub use scheduler::{Scheduler, Timings};
pub use shutdown::Shutdown;
pub use status::{read_status, write_status, StatusReport};
