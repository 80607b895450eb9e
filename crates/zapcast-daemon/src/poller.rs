//! Periodic frontend status polling.
//!
//! Queries dvblastctl on a fixed interval and publishes each parsed
//! snapshot on a watch channel. Poll failures are tolerated; the daemon
//! keeps streaming on whatever signal the frontend has.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use zapcast_core::frontend::{FrontendStatus, parse_status};

use crate::demux::fe_status;

/// Parameters for one poller run.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// dvblastctl binary.
    pub ctl_bin: PathBuf,
    /// Session work directory holding the control socket.
    pub work_dir: PathBuf,
    /// Delay before the first poll and between subsequent polls.
    pub interval: Duration,
}

/// Poll frontend status until cancelled.
///
/// The first poll happens one interval after startup, giving the
/// demultiplexer time to create its control socket.
pub async fn run(
    config: PollerConfig,
    status_tx: watch::Sender<Option<FrontendStatus>>,
    token: CancellationToken,
) {
    let mut timer = tokio::time::interval(config.interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = timer.tick() => {}
        }

        let xml = match fe_status(&config.ctl_bin, &config.work_dir).await {
            Ok(xml) => xml,
            Err(e) => {
                warn!(error = %e, "Frontend status poll failed");
                continue;
            }
        };

        match parse_status(&xml) {
            Ok(status) => {
                debug!(%status, locked = status.has_lock(), "Frontend status");
                status_tx.send_replace(Some(status));
            }
            Err(e) => warn!(error = %e, "Ignoring malformed frontend status document"),
        }
    }

    // The snapshot no longer reflects a live frontend once the session
    // ends.
    status_tx.send_replace(None);
    debug!("Status poller stopped");
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_polls_leave_status_unset() {
        let dir = tempfile::tempdir().unwrap();
        let config = PollerConfig {
            ctl_bin: PathBuf::from("/bin/false"),
            work_dir: dir.path().to_path_buf(),
            interval: Duration::from_millis(10),
        };
        let (status_tx, status_rx) = watch::channel(None);
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(config, status_tx, token.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(status_rx.borrow().is_none());

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_clears_published_status() {
        let dir = tempfile::tempdir().unwrap();
        let config = PollerConfig {
            ctl_bin: PathBuf::from("/nonexistent/zapcast-ctl"),
            work_dir: dir.path().to_path_buf(),
            interval: Duration::from_secs(60),
        };
        let (status_tx, status_rx) = watch::channel(Some(FrontendStatus::default()));
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(config, status_tx, token.clone()));

        token.cancel();
        handle.await.unwrap();
        assert!(status_rx.borrow().is_none());
    }
}
