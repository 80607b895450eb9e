//! Session orchestration.
//!
//! The manager owns at most one active session. Starting a session binds
//! the relay sockets, writes the demux config against the resolved UDP
//! address, launches the demultiplexer and spawns the relay, poller and
//! exit watchdog. Stopping tears those down in the reverse order.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use zapcast_core::channel::{ChannelDescriptor, ChannelParseError};
use zapcast_core::config::Config;
use zapcast_core::frontend::FrontendStatus;

use crate::demux::{self, DemuxError, DemuxSpawnConfig, DemuxSupervisor};
use crate::poller::{self, PollerConfig};
use crate::relay::{RelayError, StreamRelay};

use super::SessionState;

/// Errors from session startup.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    InvalidChannel(#[from] ChannelParseError),

    #[error("Failed to prepare work directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write demux config {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Bind(#[from] RelayError),

    #[error(transparent)]
    Launch(#[from] DemuxError),

    #[error("A session is already active")]
    AlreadyActive,
}

/// Everything owned by one running session.
struct ActiveSession {
    channel: ChannelDescriptor,
    udp_addr: SocketAddr,
    http_addr: SocketAddr,
    relay_token: CancellationToken,
    relay_task: JoinHandle<()>,
    poller_token: CancellationToken,
    poller_task: JoinHandle<()>,
    watchdog_token: CancellationToken,
    demux: DemuxSupervisor,
}

/// Orchestrates the demultiplexer, relay and poller for one session at a
/// time.
///
/// Cloning is cheap; clones share the same session slot and channels.
#[derive(Clone)]
pub struct SessionManager {
    config: Config,
    active: Arc<Mutex<Option<ActiveSession>>>,
    state_tx: watch::Sender<SessionState>,
    status_tx: watch::Sender<Option<FrontendStatus>>,
}

impl SessionManager {
    pub fn new(config: Config) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Stopped);
        let (status_tx, _) = watch::channel(None);
        Self {
            config,
            active: Arc::new(Mutex::new(None)),
            state_tx,
            status_tx,
        }
    }

    /// Start a session for the given `name:frequency:serviceId` descriptor.
    ///
    /// Returns the channel name on success. Fails with
    /// [`StartError::AlreadyActive`] while a session exists, including one
    /// that is still stopping.
    pub async fn start(&self, descriptor: &str) -> Result<String, StartError> {
        if !self.state_tx.borrow().can_start() {
            return Err(StartError::AlreadyActive);
        }

        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(StartError::AlreadyActive);
        }

        let channel: ChannelDescriptor = descriptor.parse()?;
        info!(
            channel = %channel.name,
            frequency_khz = channel.frequency,
            service_id = channel.service_id,
            "Starting session"
        );
        self.state_tx.send_replace(SessionState::Starting);

        match self.launch(&channel).await {
            Ok(session) => {
                let name = session.channel.name.clone();
                *active = Some(session);
                self.state_tx.send_replace(SessionState::Streaming);
                Ok(name)
            }
            Err(e) => {
                self.state_tx.send_replace(SessionState::Stopped);
                Err(e)
            }
        }
    }

    async fn launch(&self, channel: &ChannelDescriptor) -> Result<ActiveSession, StartError> {
        let work_dir = self.config.demux.work_dir.clone().unwrap_or_else(|| {
            let fallback = std::env::temp_dir().join("zapcast");
            warn!(path = %fallback.display(), "No work directory configured, using fallback");
            fallback
        });
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| StartError::WorkDir {
                path: work_dir.clone(),
                source: e,
            })?;

        // A socket file left over from a crashed run would confuse the
        // demultiplexer.
        demux::remove_socket_file(&work_dir.join(demux::SOCKET_FILE)).await;

        // Sockets first: the config must carry the resolved UDP address.
        let relay = StreamRelay::bind(&self.config.relay).await?;
        let udp_addr = relay.udp_addr();
        let http_addr = relay.http_addr();

        let conf_path = work_dir.join(demux::CONF_FILE);
        let conf_line = channel.config_line(udp_addr);
        tokio::fs::write(&conf_path, format!("{conf_line}\n"))
            .await
            .map_err(|e| StartError::ConfigWrite {
                path: conf_path.clone(),
                source: e,
            })?;
        debug!(path = %conf_path.display(), line = %conf_line, "Wrote demux config");

        let (demux, exit_rx) = DemuxSupervisor::spawn(DemuxSpawnConfig {
            program: self.config.demux.demux_bin.clone(),
            work_dir: work_dir.clone(),
            frequency: channel.frequency,
            terminate_timeout: Duration::from_secs(self.config.demux.terminate_timeout_secs),
        })
        .await?;

        let relay_token = CancellationToken::new();
        let relay_task = tokio::spawn(relay.run(relay_token.clone()));

        let poller_token = CancellationToken::new();
        let poller_task = tokio::spawn(poller::run(
            PollerConfig {
                ctl_bin: self.config.demux.ctl_bin.clone(),
                work_dir,
                interval: Duration::from_millis(self.config.demux.poll_interval_ms),
            },
            self.status_tx.clone(),
            poller_token.clone(),
        ));

        let watchdog_token = CancellationToken::new();
        let watchdog = watchdog_token.clone();
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = watchdog.cancelled() => {}
                exited = exit_rx => {
                    if let Ok(status) = exited {
                        warn!(%status, "Demultiplexer exited unexpectedly, ending session");
                        manager.stop().await;
                    }
                }
            }
        });

        Ok(ActiveSession {
            channel: channel.clone(),
            udp_addr,
            http_addr,
            relay_token,
            relay_task,
            poller_token,
            poller_task,
            watchdog_token,
            demux,
        })
    }

    /// Stop the active session, releasing sockets and the work directory
    /// socket file. A stop with no session is a no-op.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        let Some(session) = active.take() else {
            debug!("Stop requested with no active session");
            return;
        };

        self.state_tx.send_replace(SessionState::Stopping);
        info!(channel = %session.channel.name, "Stopping session");

        // The watchdog must not observe the exit we are about to cause.
        session.watchdog_token.cancel();

        session.poller_token.cancel();
        if let Err(e) = session.poller_task.await {
            warn!(error = %e, "Status poller task panicked");
        }

        session.relay_token.cancel();
        if let Err(e) = session.relay_task.await {
            warn!(error = %e, "Relay task panicked");
        }

        session.demux.shutdown().await;

        self.state_tx.send_replace(SessionState::Stopped);
        info!("Session stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Latest frontend status snapshot, if the poller has one.
    pub fn status(&self) -> Option<FrontendStatus> {
        *self.status_tx.borrow()
    }

    /// Watch frontend status snapshots.
    pub fn subscribe_status(&self) -> watch::Receiver<Option<FrontendStatus>> {
        self.status_tx.subscribe()
    }

    /// Resolved UDP ingress address of the active session.
    pub async fn udp_addr(&self) -> Option<SocketAddr> {
        self.active.lock().await.as_ref().map(|s| s.udp_addr)
    }

    /// Resolved HTTP endpoint address of the active session.
    pub async fn http_addr(&self) -> Option<SocketAddr> {
        self.active.lock().await.as_ref().map(|s| s.http_addr)
    }
}
