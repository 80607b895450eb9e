//! zapcast daemon
//!
//! Tunes one DVB-T channel through dvblast and serves the resulting
//! MPEG-TS stream over HTTP until the process is asked to stop.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use zapcast_core::config::{Config, load_config, stream_url};
use zapcast_core::tracing_init::init_tracing;
use zapcast_daemon::session::{SessionManager, SessionState};

#[derive(Parser, Debug)]
#[command(name = "zapcast-daemon")]
#[command(version, about = "DVB tuner control and MPEG-TS stream relay")]
struct Args {
    /// Channel descriptor, `name:frequency:serviceId` with the frequency
    /// in kHz (e.g. "Arte:474000:2").
    #[arg(env = "ZAPCAST_CHANNEL")]
    channel: String,

    /// UDP address receiving the demultiplexer output
    #[arg(long, env = "ZAPCAST_UDP_ADDR")]
    udp_addr: Option<SocketAddr>,

    /// HTTP address serving the stream
    #[arg(long, env = "ZAPCAST_HTTP_ADDR")]
    http_addr: Option<SocketAddr>,

    /// Directory for the demux config, control socket and log
    #[arg(long, env = "ZAPCAST_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Path to the `dvblast` binary
    #[arg(long, env = "ZAPCAST_DVBLAST_BIN")]
    dvblast_bin: Option<PathBuf>,

    /// Path to the `dvblastctl` binary
    #[arg(long, env = "ZAPCAST_DVBLASTCTL_BIN")]
    dvblastctl_bin: Option<PathBuf>,

    /// Frontend status poll interval in milliseconds
    #[arg(long, env = "ZAPCAST_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Seconds to wait for graceful demux shutdown before SIGKILL
    #[arg(long, env = "ZAPCAST_TERMINATE_TIMEOUT")]
    terminate_timeout: Option<u64>,

    /// Log level filter for the daemon (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "ZAPCAST_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "ZAPCAST_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_filter = format!("zapcast_daemon={0},zapcast_core={0}", args.log_level);
    init_tracing(&log_filter, args.log_json);

    let config = resolve_config(&args)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        channel = %args.channel,
        udp = %config.relay.udp_addr,
        http = %config.relay.http_addr,
        "Starting zapcast-daemon"
    );

    let manager = SessionManager::new(config);
    let channel_name = manager.start(&args.channel).await?;
    let http_addr = manager
        .http_addr()
        .await
        .context("Session ended during startup")?;

    info!(channel = %channel_name, url = %stream_url(http_addr), "Streaming");

    // Surface signal quality transitions for operators tailing the log.
    let mut status_rx = manager.subscribe_status();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            if let Some(status) = *status_rx.borrow_and_update() {
                info!(
                    locked = status.has_lock(),
                    signal_percent = status.signal_percent(),
                    snr = status.snr,
                    ber = status.ber,
                    "Frontend status"
                );
            }
        }
    });

    // Subscribed after start, so the current value is Streaming and the
    // wait below only matches a later transition back to Stopped.
    let mut state_rx = manager.subscribe_state();

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    // Notify systemd that the daemon is ready to serve (unix only).
    // The `true` parameter unsets $NOTIFY_SOCKET so child processes
    // (the dvblast subprocess) don't accidentally notify systemd.
    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
        _ = state_rx.wait_for(|state| *state == SessionState::Stopped) => {
            info!("Session ended");
        }
    }

    manager.stop().await;

    info!("Daemon stopped");
    Ok(())
}

fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = load_config()?;

    if let Some(addr) = args.udp_addr {
        config.relay.udp_addr = addr;
    }
    if let Some(addr) = args.http_addr {
        config.relay.http_addr = addr;
    }
    if let Some(dir) = &args.work_dir {
        config.demux.work_dir = Some(dir.clone());
    }
    if let Some(bin) = &args.dvblast_bin {
        config.demux.demux_bin = bin.clone();
    }
    if let Some(bin) = &args.dvblastctl_bin {
        config.demux.ctl_bin = bin.clone();
    }
    if let Some(ms) = args.poll_interval_ms {
        config.demux.poll_interval_ms = ms;
    }
    if let Some(secs) = args.terminate_timeout {
        config.demux.terminate_timeout_secs = secs;
    }
    if config.demux.work_dir.is_none() {
        config.demux.work_dir = Some(default_work_dir()?);
    }

    Ok(config)
}

/// Default work directory: ~/.zapcast
fn default_work_dir() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".zapcast"))
}
