//! Unix socket transport for the command channel.
//!
//! Wire format: one UTF-8 line per command, `<action>[ <arg>...]\n`. The channel
//! is one-directional; the daemon never writes a reply.

use std::fs;
use std::io::{ErrorKind, Write};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use rotator_core::Command;

use crate::channel::{CommandSender, QueueWriter};
use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::shutdown::Shutdown;

pub const SEND_ATTEMPTS: u32 = 3;
pub const SEND_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Longest accepted command line, newline included.
pub const MAX_LINE_BYTES: u64 = 1024;
/// A client that sends nothing for this long is disconnected.
pub const CLIENT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Writes commands to the daemon's control socket.
#[derive(Debug, Clone)]
pub struct SocketSender {
    socket: PathBuf,
}

impl SocketSender {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    /// Sender for the daemon rooted at `home`.
    pub fn at(home: &Path) -> Self {
        Self::new(socket_path(home))
    }

    fn unavailable(&self) -> DaemonError {
        DaemonError::ChannelUnavailable {
            endpoint: self.socket.display().to_string(),
        }
    }

    fn write_once(&self, line: &str) -> std::io::Result<()> {
        let mut stream = StdUnixStream::connect(&self.socket)?;
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()
    }

    /// Retry loop over a single write step. Unavailable errors end it at once;
    /// transient ones are retried up to [`SEND_ATTEMPTS`] times.
    fn send_with(
        &self,
        line: &str,
        mut write: impl FnMut(&str) -> std::io::Result<()>,
    ) -> Result<(), DaemonError> {
        let mut last_err = None;
        for attempt in 1..=SEND_ATTEMPTS {
            match write(line) {
                Ok(()) => return Ok(()),
                Err(err) if is_unavailable(&err) => return Err(self.unavailable()),
                Err(err) if is_transient(&err) => {
                    tracing::debug!(attempt, error = %err, "command write rejected; retrying");
                    last_err = Some(err);
                    if attempt < SEND_ATTEMPTS {
                        sleep(SEND_RETRY_DELAY);
                    }
                }
                Err(err) => return Err(io_err(&self.socket, err)),
            }
        }

        Err(DaemonError::ChannelTransient {
            attempts: SEND_ATTEMPTS,
            source: last_err
                .unwrap_or_else(|| std::io::Error::new(ErrorKind::Other, "no attempt made")),
        })
    }
}

impl CommandSender for SocketSender {
    fn send(&self, text: &str) -> Result<(), DaemonError> {
        let line = text.trim();
        if line.contains('\n') {
            return Err(DaemonError::Protocol(
                "a command must fit on one line".to_string(),
            ));
        }
        if !self.socket.exists() {
            return Err(self.unavailable());
        }
        self.send_with(line, |line| self.write_once(line))
    }
}

/// Send one command to the daemon rooted at `home`.
pub fn send_command(home: &Path, command: &Command) -> Result<(), DaemonError> {
    SocketSender::at(home).send(&command.to_string())
}

fn is_unavailable(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::NotFound | ErrorKind::ConnectionRefused
    )
}

fn is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::TimedOut
    )
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Daemon side: accepts writers and forwards their lines into the command queue.
#[derive(Debug)]
pub struct CommandListener {
    listener: UnixListener,
    socket: PathBuf,
}

impl CommandListener {
    /// Bind the control socket, replacing a stale socket file. Fails if another
    /// daemon still accepts connections on it.
    pub fn bind(socket: &Path) -> Result<Self, DaemonError> {
        if let Some(dir) = socket.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            }
        }
        prepare_socket_for_bind(socket)?;
        let listener = UnixListener::bind(socket).map_err(|e| io_err(socket, e))?;
        set_socket_permissions(socket)?;
        Ok(Self {
            listener,
            socket: socket.to_path_buf(),
        })
    }

    /// Accept writers until shutdown, then remove the socket file.
    pub async fn serve(self, writer: QueueWriter, mut shutdown: Shutdown) -> Result<(), DaemonError> {
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                accepted = self.listener.accept() => {
                    let (stream, _) = match accepted {
                        Ok(pair) => pair,
                        Err(err) => {
                            tracing::warn!(error = %err, "control socket accept failed");
                            continue;
                        }
                    };
                    let writer = writer.clone();
                    tokio::spawn(async move {
                        if let Err(err) = forward_lines(stream, writer).await {
                            tracing::warn!(error = %err, "control client error");
                        }
                    });
                }
            }
        }

        if self.socket.exists() {
            let _ = fs::remove_file(&self.socket);
        }
        Ok(())
    }
}

async fn forward_lines(stream: UnixStream, writer: QueueWriter) -> Result<(), DaemonError> {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE_BYTES);
        let read = limited.read_until(b'\n', &mut buf);
        let read = match tokio::time::timeout(CLIENT_IDLE_TIMEOUT, read).await {
            Ok(read) => read.map_err(|e| io_err("control socket read", e))?,
            Err(_) => {
                tracing::debug!("control client idle; closing");
                return Ok(());
            }
        };
        if read == 0 {
            return Ok(());
        }
        if buf.last() != Some(&b'\n') && read as u64 == MAX_LINE_BYTES {
            tracing::warn!(limit = MAX_LINE_BYTES, "control line too long; closing client");
            return Ok(());
        }

        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        // Lossy by contract: a full queue drops the line and we keep reading.
        let _ = writer.push_line(&line);
    }
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "control socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale control socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel;
    use rotator_core::ListId;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn send_without_socket_fails_fast() {
        let home = TempDir::new().expect("home");
        let err = send_command(home.path(), &Command::Pause).unwrap_err();
        assert!(
            matches!(err, DaemonError::ChannelUnavailable { .. }),
            "got: {err}"
        );
    }

    #[test]
    fn stale_socket_file_is_unavailable() {
        let home = TempDir::new().expect("home");
        let socket = socket_path(home.path());
        fs::create_dir_all(socket.parent().expect("parent")).expect("mkdir");
        // Bind then drop: the path stays but nobody listens.
        drop(std::os::unix::net::UnixListener::bind(&socket).expect("bind"));

        let err = SocketSender::new(&socket).send("stop").unwrap_err();
        assert!(
            matches!(err, DaemonError::ChannelUnavailable { .. }),
            "got: {err}"
        );
    }

    #[test]
    fn multi_line_payload_is_rejected() {
        let home = TempDir::new().expect("home");
        let err = SocketSender::at(home.path()).send("stop\nskip").unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn listener_forwards_lines_into_queue() {
        let home = TempDir::new().expect("home");
        let socket = socket_path(home.path());
        let listener = CommandListener::bind(&socket).expect("bind");
        let (writer, mut queue) = channel::queue();
        let shutdown = Shutdown::new();
        let server = tokio::spawn(listener.serve(writer, shutdown.clone()));

        let sender = SocketSender::new(&socket);
        let sent = tokio::task::spawn_blocking(move || {
            sender.send("switch b")?;
            sender.send("bogus")?;
            sender.send("interval 15")
        })
        .await
        .expect("join");
        sent.expect("send");

        let first = tokio::time::timeout(Duration::from_secs(2), queue.next())
            .await
            .expect("first command");
        let second = tokio::time::timeout(Duration::from_secs(2), queue.next())
            .await
            .expect("second command");
        assert_eq!(first, Command::SwitchList(ListId::B));
        assert_eq!(second, Command::SetInterval(15));

        shutdown.trigger();
        server.await.expect("join").expect("serve");
        assert!(!socket.exists(), "socket removed on shutdown");
    }

    fn failing_writes(kind: ErrorKind) -> (impl FnMut(&str) -> std::io::Result<()>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let write = move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(std::io::Error::from(kind))
        };
        (write, calls)
    }

    #[test]
    fn transient_rejection_is_retried_three_times() {
        let sender = SocketSender::new("/nonexistent/control.sock");
        let (write, calls) = failing_writes(ErrorKind::BrokenPipe);

        let started = std::time::Instant::now();
        let err = sender.send_with("skip", write).unwrap_err();
        assert!(
            matches!(err, DaemonError::ChannelTransient { attempts: 3, .. }),
            "got: {err}"
        );
        assert_eq!(calls.load(Ordering::SeqCst), SEND_ATTEMPTS);
        assert!(started.elapsed() >= SEND_RETRY_DELAY * (SEND_ATTEMPTS - 1));
    }

    #[test]
    fn refused_connection_is_not_retried() {
        let sender = SocketSender::new("/nonexistent/control.sock");
        let (write, calls) = failing_writes(ErrorKind::ConnectionRefused);

        let err = sender.send_with("skip", write).unwrap_err();
        assert!(
            matches!(err, DaemonError::ChannelUnavailable { .. }),
            "got: {err}"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn write_succeeds_after_one_transient_rejection() {
        let sender = SocketSender::new("/nonexistent/control.sock");
        let mut attempts = 0;
        sender
            .send_with("pause", |line| {
                attempts += 1;
                assert_eq!(line, "pause");
                if attempts == 1 {
                    Err(std::io::Error::from(ErrorKind::ConnectionReset))
                } else {
                    Ok(())
                }
            })
            .expect("second attempt accepted");
        assert_eq!(attempts, 2);
    }

    #[test]
    fn other_io_errors_fail_without_retry() {
        let sender = SocketSender::new("/nonexistent/control.sock");
        let (write, calls) = failing_writes(ErrorKind::PermissionDenied);

        let err = sender.send_with("skip", write).unwrap_err();
        assert!(matches!(err, DaemonError::Io { .. }), "got: {err}");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn oversized_line_closes_the_client() {
        let home = TempDir::new().expect("home");
        let socket = socket_path(home.path());
        let listener = CommandListener::bind(&socket).expect("bind");
        let (writer, mut queue) = channel::queue();
        let shutdown = Shutdown::new();
        let server = tokio::spawn(listener.serve(writer, shutdown.clone()));

        let flood = socket.clone();
        tokio::task::spawn_blocking(move || {
            let mut stream = StdUnixStream::connect(&flood).expect("connect");
            let mut payload = "x".repeat(MAX_LINE_BYTES as usize * 2);
            payload.push_str("\npause\n");
            // The daemon may hang up mid-write.
            let _ = stream.write_all(payload.as_bytes());
        })
        .await
        .expect("join");

        let dropped = tokio::time::timeout(Duration::from_millis(300), queue.next()).await;
        assert!(dropped.is_err(), "nothing after an oversized line is read");

        let sender = SocketSender::new(&socket);
        tokio::task::spawn_blocking(move || sender.send("resume"))
            .await
            .expect("join")
            .expect("send");
        let command = tokio::time::timeout(Duration::from_secs(2), queue.next())
            .await
            .expect("later client still served");
        assert_eq!(command, Command::Resume);

        shutdown.trigger();
        server.await.expect("join").expect("serve");
    }

    #[tokio::test]
    async fn bind_refuses_live_socket() {
        let home = TempDir::new().expect("home");
        let socket = socket_path(home.path());
        let _first = CommandListener::bind(&socket).expect("first bind");
        let err = CommandListener::bind(&socket).unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(_)), "got: {err}");
    }
}
