use std::path::{Path, PathBuf};

use rotator_core::paths::config_root;

pub const SERVICE_NAME: &str = "pvpn-rotator.service";

pub const DAEMON_SOCKET: &str = "control.sock";
pub const DAEMON_PID: &str = "daemon.pid";
pub const DAEMON_STATUS: &str = "status.json";
pub const DAEMON_LOG: &str = "daemon.log";

pub fn socket_path(home: &Path) -> PathBuf {
    config_root(home).join(DAEMON_SOCKET)
}

pub fn pid_path(home: &Path) -> PathBuf {
    config_root(home).join(DAEMON_PID)
}

pub fn status_path(home: &Path) -> PathBuf {
    config_root(home).join(DAEMON_STATUS)
}

pub fn log_path(home: &Path) -> PathBuf {
    config_root(home).join(DAEMON_LOG)
}

pub fn systemd_user_dir(home: &Path) -> PathBuf {
    home.join(".config").join("systemd").join("user")
}

pub fn unit_path(home: &Path) -> PathBuf {
    systemd_user_dir(home).join(SERVICE_NAME)
}
