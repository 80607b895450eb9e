//! dvblastctl invocations against the running demultiplexer.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::trace;

use super::SOCKET_FILE;

/// Upper bound on one control command, covering spawn through exit.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors from control command execution.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Failed to run control command: {0}")]
    Io(#[from] std::io::Error),

    #[error("Control command failed (code {code:?}): {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Control command did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Query frontend status over the control socket, returning the raw XML
/// reply.
pub async fn fe_status(ctl_bin: &Path, work_dir: &Path) -> Result<String, ControlError> {
    let socket_path = work_dir.join(SOCKET_FILE);

    let mut cmd = Command::new(ctl_bin);
    cmd.arg("-r")
        .arg(&socket_path)
        .arg("-x")
        .arg("xml")
        .arg("fe_status")
        .current_dir(work_dir)
        .env("TMPDIR", ".")
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(CONTROL_TIMEOUT, cmd.output())
        .await
        .map_err(|_| ControlError::TimedOut(CONTROL_TIMEOUT))??;

    if !output.status.success() {
        return Err(ControlError::Failed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }

    let xml = String::from_utf8_lossy(&output.stdout).into_owned();
    trace!(bytes = xml.len(), "Control command reply");
    Ok(xml)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let reply = fe_status(Path::new("/bin/echo"), dir.path()).await.unwrap();
        assert!(reply.contains("fe_status"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = fe_status(Path::new("/bin/false"), dir.path()).await;
        assert!(matches!(result, Err(ControlError::Failed { .. })));
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = fe_status(&PathBuf::from("/nonexistent/zapcast-ctl"), dir.path()).await;
        assert!(matches!(result, Err(ControlError::Io(_))));
    }
}
