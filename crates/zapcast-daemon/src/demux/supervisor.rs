//! dvblast subprocess supervision.
//!
//! The supervisor owns the demultiplexer child process for one session:
//! it wires up output capture, watches for unexpected exits, and tears
//! the process down with SIGTERM escalating to SIGKILL.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{CONF_FILE, LOG_FILE, SOCKET_FILE};

/// Errors from demultiplexer supervision.
#[derive(Debug, Error)]
pub enum DemuxError {
    #[error("Failed to open demux log {path}: {source}")]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch demultiplexer: {reason}")]
    SpawnFailed { reason: String },
}

/// Resolves when the demultiplexer exits without being asked to.
pub type ExitNotice = oneshot::Receiver<ExitStatus>;

/// Parameters for one demultiplexer launch.
#[derive(Debug, Clone)]
pub struct DemuxSpawnConfig {
    /// dvblast binary.
    pub program: PathBuf,
    /// Directory holding the config, control socket and log.
    pub work_dir: PathBuf,
    /// Tuning frequency in kHz.
    pub frequency: u32,
    /// Grace period between SIGTERM and SIGKILL.
    pub terminate_timeout: Duration,
}

/// Handle to a running demultiplexer.
pub struct DemuxSupervisor {
    token: CancellationToken,
    monitor: JoinHandle<()>,
}

impl DemuxSupervisor {
    /// Spawn the demultiplexer and start supervising it.
    ///
    /// The returned [`ExitNotice`] fires only when the process ends on its
    /// own; exits caused by [`shutdown`](Self::shutdown) are not reported.
    pub async fn spawn(config: DemuxSpawnConfig) -> Result<(Self, ExitNotice), DemuxError> {
        let socket_path = config.work_dir.join(SOCKET_FILE);
        let log_path = config.work_dir.join(LOG_FILE);

        let log_file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&log_path)
            .await
            .map_err(|e| DemuxError::LogOpen {
                path: log_path.clone(),
                source: e,
            })?;

        let args = demux_args(&config.work_dir, config.frequency);
        info!(
            program = %config.program.display(),
            frequency_khz = config.frequency,
            work_dir = %config.work_dir.display(),
            "Launching demultiplexer"
        );

        let mut child = Command::new(&config.program)
            .args(&args)
            .current_dir(&config.work_dir)
            .env("TMPDIR", ".")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DemuxError::SpawnFailed {
                reason: format!("{}: {e}", config.program.display()),
            })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!(%line, "demux stdout");
                }
                debug!("Demux stdout reader finished");
            });
        }

        if let Some(stderr) = child.stderr.take() {
            let mut log_file = log_file;
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(%line, "demux stderr");
                    if log_file
                        .write_all(format!("{line}\n").as_bytes())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                debug!("Demux stderr reader finished");
            });
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        let token = CancellationToken::new();
        let monitor = tokio::spawn(monitor_demux(
            child,
            token.clone(),
            exit_tx,
            config.terminate_timeout,
            socket_path,
        ));

        Ok((Self { token, monitor }, exit_rx))
    }

    /// Stop the demultiplexer and wait for the monitor to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.monitor.await {
            warn!(error = %e, "Demux monitor task panicked");
        }
    }
}

async fn monitor_demux(
    mut child: Child,
    token: CancellationToken,
    exit_tx: oneshot::Sender<ExitStatus>,
    terminate_timeout: Duration,
    socket_path: PathBuf,
) {
    tokio::select! {
        () = token.cancelled() => {
            terminate(&mut child, terminate_timeout).await;
        }
        result = child.wait() => match result {
            Ok(status) => {
                if status.success() {
                    warn!(%status, "Demultiplexer exited on its own");
                } else {
                    warn!(%status, "Demultiplexer exited with failure");
                }
                let _ = exit_tx.send(status);
            }
            Err(e) => {
                warn!(error = %e, "Failed to wait on demultiplexer");
                child.kill().await.ok();
            }
        },
    }
    remove_socket_file(&socket_path).await;
}

/// Ask the child to exit, then escalate to SIGKILL after the grace period.
async fn terminate(child: &mut Child, timeout: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: pid refers to a child of this process; signal delivery
        // has no memory-safety implications.
        #[allow(unsafe_code)]
        #[allow(clippy::cast_possible_wrap)]
        let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if ret != 0 {
            warn!(pid, "Failed to deliver SIGTERM to demultiplexer");
        }
    }
    #[cfg(not(unix))]
    if child.start_kill().is_err() {
        debug!("Demultiplexer already finished");
    }

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => info!(%status, "Demultiplexer terminated"),
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to reap demultiplexer");
            child.kill().await.ok();
        }
        Err(_) => {
            warn!("Timeout waiting for demultiplexer shutdown, killing");
            child.kill().await.ok();
        }
    }
}

/// Remove the control socket file, tolerating its absence.
pub(crate) async fn remove_socket_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed control socket file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove control socket file");
        }
    }
}

/// dvblast command line for one session.
///
/// `-U` selects raw UDP output, `-a0` adapter zero, `-O5000` a 5 second
/// lock timeout, `-xxml` XML output for control replies, `-q` quiet
/// periodic status lines.
fn demux_args(work_dir: &Path, frequency: u32) -> Vec<OsString> {
    let socket_path = work_dir.join(SOCKET_FILE);
    let conf_path = work_dir.join(CONF_FILE);
    vec![
        OsString::from("-U"),
        OsString::from("-a0"),
        OsString::from("-O5000"),
        OsString::from("-r"),
        socket_path.into_os_string(),
        OsString::from("-xxml"),
        OsString::from("-c"),
        conf_path.into_os_string(),
        OsString::from(format!("-f{frequency}")),
        OsString::from("-q"),
    ]
}
