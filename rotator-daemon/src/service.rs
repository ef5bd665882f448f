use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_err, DaemonError};
use crate::paths::{log_path, systemd_user_dir, unit_path, SERVICE_NAME};

/// Generate a systemd user unit that runs `<binary> start`.
pub fn generate_unit(binary_path: &Path, log_file: &Path) -> String {
    format!(
        r#"[Unit]
Description=ProtonVPN server rotation daemon
After=network-online.target
Wants=network-online.target

[Service]
Type=simple
ExecStart={binary} start
Restart=on-failure
RestartSec=5
StandardOutput=append:{log}
StandardError=inherit

[Install]
WantedBy=default.target
"#,
        binary = binary_path.display(),
        log = log_file.display(),
    )
}

/// Write the user unit for `binary_path`. Enabling it is left to `systemctl`.
pub fn install(home: &Path, binary_path: &Path) -> Result<PathBuf, DaemonError> {
    ensure_linux()?;

    let unit_dir = systemd_user_dir(home);
    if !unit_dir.exists() {
        fs::create_dir_all(&unit_dir).map_err(|e| io_err(&unit_dir, e))?;
    }
    let log = log_path(home);
    if let Some(dir) = log.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
    }

    let unit = unit_path(home);
    fs::write(&unit, generate_unit(binary_path, &log)).map_err(|e| io_err(&unit, e))?;
    Ok(unit)
}

/// Remove the unit file. Returns whether it existed. A running daemon and its
/// control socket are left alone.
pub fn uninstall(home: &Path) -> Result<bool, DaemonError> {
    ensure_linux()?;

    let unit = unit_path(home);
    let existed = unit.exists();
    if existed {
        fs::remove_file(&unit).map_err(|e| io_err(&unit, e))?;
    }
    Ok(existed)
}

/// `systemctl` invocations the user runs after [`install`].
pub fn enable_hint() -> [String; 2] {
    [
        "systemctl --user daemon-reload".to_string(),
        format!("systemctl --user enable --now {SERVICE_NAME}"),
    ]
}

#[cfg(target_os = "linux")]
fn ensure_linux() -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn ensure_linux() -> Result<(), DaemonError> {
    Err(DaemonError::Service(
        "systemd user units are only supported on Linux".to_string(),
    ))
}
