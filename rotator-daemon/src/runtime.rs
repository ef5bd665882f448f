use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rotator_core::{
    store::init_at, ConfigStore, JsonFileStore, ListFiles, ServerListProvider, Snapshot,
};

use crate::backend::{ConnectionBackend, ProtonVpnCli, DEFAULT_BACKEND_PROGRAM};
use crate::channel;
use crate::error::{io_err, DaemonError};
use crate::paths::{pid_path, socket_path, status_path};
use crate::protocol::CommandListener;
use crate::scheduler::Scheduler;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub home: PathBuf,
    /// Program driven by [`ProtonVpnCli`].
    pub backend_program: PathBuf,
    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,
}

impl DaemonOptions {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            backend_program: PathBuf::from(DEFAULT_BACKEND_PROGRAM),
            json_logs: false,
        }
    }
}

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(options: DaemonOptions) -> Result<(), DaemonError> {
    init_tracing(options.json_logs);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options))
}

/// Run the daemon: command listener, signal handler and the rotation loop.
pub async fn run(options: DaemonOptions) -> Result<(), DaemonError> {
    let home = options.home;
    init_at(&home)?;

    let store = JsonFileStore::at(&home);
    let snapshot = load_snapshot(&store);

    let listener = CommandListener::bind(&socket_path(&home))?;
    let (writer, commands) = channel::queue();
    let shutdown = Shutdown::new();
    write_pid_marker(&home)?;
    tracing::info!(
        pid = std::process::id(),
        home = %home.display(),
        backend = %options.backend_program.display(),
        "daemon started",
    );

    let listener_handle = tokio::spawn(listener.serve(writer, shutdown.clone()));
    let signal_handle = tokio::spawn(signal_task(shutdown.clone()));

    let lists: Arc<dyn ServerListProvider> = Arc::new(ListFiles::at(&home));
    let backend: Arc<dyn ConnectionBackend> =
        Arc::new(ProtonVpnCli::new(options.backend_program));
    let mut scheduler = Scheduler::new(
        snapshot,
        Box::new(store),
        lists,
        backend,
        commands,
        shutdown.clone(),
    )
    .with_status_file(status_path(&home));
    scheduler.run().await;
    shutdown.trigger();

    let (listener_result, signal_result) = tokio::join!(listener_handle, signal_handle);
    remove_pid_marker(&home);
    handle_join("command_listener", listener_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon exited");
    Ok(())
}

/// Load the persisted snapshot, falling back to defaults when it is corrupt.
pub fn load_snapshot(store: &dyn ConfigStore) -> Snapshot {
    match store.load() {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(error = %err, "snapshot unreadable; using defaults");
            Snapshot::default()
        }
    }
}

/// PID of a live daemon for `home`, if its liveness marker is present and the
/// process still exists.
pub fn running_pid(home: &Path) -> Option<u32> {
    let contents = fs::read_to_string(pid_path(home)).ok()?;
    let pid: u32 = contents.trim().parse().ok()?;
    process_alive(pid).then_some(pid)
}

fn write_pid_marker(home: &Path) -> Result<(), DaemonError> {
    let path = pid_path(home);
    if let Some(pid) = running_pid(home) {
        if pid != std::process::id() {
            tracing::warn!(pid, "liveness marker names another live daemon; overwriting");
        }
    }
    fs::write(&path, format!("{}\n", std::process::id())).map_err(|e| io_err(&path, e))
}

fn remove_pid_marker(home: &Path) {
    let path = pid_path(home);
    if let Err(err) = fs::remove_file(&path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove liveness marker");
        }
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

async fn signal_task(mut shutdown: Shutdown) -> Result<(), DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let trigger = shutdown.clone();
    let mut terminate =
        signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM handler", e))?;
    tokio::select! {
        _ = shutdown.wait() => Ok(()),
        _ = terminate.recv() => {
            tracing::info!("received SIGTERM, shutting down daemon");
            trigger.trigger();
            Ok(())
        }
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                tracing::info!("received ctrl-c, shutting down daemon");
                trigger.trigger();
                Ok(())
            }
            Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
        },
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = if json {
        fmt().json().with_env_filter(filter).try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotator_core::{CoreError, MemoryStore};
    use tempfile::TempDir;

    struct BrokenStore;

    impl ConfigStore for BrokenStore {
        fn load(&self) -> Result<Snapshot, CoreError> {
            Err(CoreError::InvalidSnapshot {
                path: PathBuf::from("config.json"),
                reason: "switch_interval_minutes out of range".to_string(),
            })
        }

        fn save(&self, _snapshot: &Snapshot) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_defaults() {
        assert_eq!(load_snapshot(&BrokenStore), Snapshot::default());
    }

    #[test]
    fn stored_snapshot_is_loaded() {
        let snapshot = Snapshot {
            current_index: 2,
            ..Snapshot::default()
        };
        let store = MemoryStore::with_snapshot(snapshot.clone());
        assert_eq!(load_snapshot(&store), snapshot);
    }

    #[test]
    fn pid_marker_round_trip() {
        let home = TempDir::new().expect("home");
        init_at(home.path()).expect("init");
        assert_eq!(running_pid(home.path()), None);

        write_pid_marker(home.path()).expect("write marker");
        assert_eq!(running_pid(home.path()), Some(std::process::id()));

        remove_pid_marker(home.path());
        assert_eq!(running_pid(home.path()), None);
    }

    #[test]
    fn garbage_pid_marker_is_not_live() {
        let home = TempDir::new().expect("home");
        init_at(home.path()).expect("init");
        fs::write(pid_path(home.path()), "not-a-pid").expect("write");
        assert_eq!(running_pid(home.path()), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_command_ends_the_daemon() {
        use crate::protocol::SocketSender;
        use crate::channel::CommandSender;
        use std::time::Duration;

        let home = TempDir::new().expect("home");
        let mut options = DaemonOptions::new(home.path());
        // `false` fails every connect, keeping the loop in cooldown.
        options.backend_program = PathBuf::from("false");
        let daemon = tokio::spawn(run(options));

        let socket = socket_path(home.path());
        let mut waited = Duration::ZERO;
        while !socket.exists() && waited < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += Duration::from_millis(20);
        }
        let sender = SocketSender::new(&socket);
        tokio::task::spawn_blocking(move || sender.send("stop"))
            .await
            .expect("join")
            .expect("send stop");

        tokio::time::timeout(Duration::from_secs(10), daemon)
            .await
            .expect("daemon exited")
            .expect("join")
            .expect("run");
        assert!(!socket.exists());
        assert_eq!(running_pid(home.path()), None);
        let snapshot = JsonFileStore::at(home.path()).load().expect("load");
        assert!(!snapshot.running);
    }
}
