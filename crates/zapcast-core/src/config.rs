//! Configuration resolution for zapcast.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/zapcast/settings.json)
//! 3. Environment variables
//! 4. CLI arguments (highest priority, applied by the daemon binary)

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete zapcast configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub demux: DemuxConfig,
}

/// Relay socket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Loopback address receiving the demultiplexer's UDP output.
    pub udp_addr: SocketAddr,
    /// Loopback address serving the MPEG-TS stream over HTTP.
    pub http_addr: SocketAddr,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            udp_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 1555)),
            http_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 1666)),
        }
    }
}

impl RelayConfig {
    /// Stream URL for the configured endpoint address.
    pub fn stream_url(&self) -> String {
        stream_url(self.http_addr)
    }
}

/// URL of the stream endpoint at `addr`.
///
/// The path is decorative: the relay serves the same stream regardless of
/// the request line.
pub fn stream_url(addr: SocketAddr) -> String {
    format!("http://{addr}/tv.ts")
}

/// Demultiplexer process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Path to the dvblast binary.
    pub demux_bin: PathBuf,
    /// Path to the dvblastctl binary.
    pub ctl_bin: PathBuf,
    /// Directory holding the demux config, control socket and log.
    /// Resolved to ~/.zapcast by the daemon when unset.
    pub work_dir: Option<PathBuf>,
    /// Frontend status poll interval in milliseconds; also the settling
    /// delay before the first poll.
    pub poll_interval_ms: u64,
    /// Seconds to wait for graceful demux shutdown before SIGKILL.
    pub terminate_timeout_secs: u64,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            demux_bin: PathBuf::from("dvblast"),
            ctl_bin: PathBuf::from("dvblastctl"),
            work_dir: None,
            poll_interval_ms: 500,
            terminate_timeout_secs: 5,
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".zapcast").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/zapcast/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("zapcast").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    if overlay.demux.work_dir.is_some() {
        base.demux.work_dir = overlay.demux.work_dir;
    }
    base.relay = overlay.relay;
    base.demux.demux_bin = overlay.demux.demux_bin;
    base.demux.ctl_bin = overlay.demux.ctl_bin;
    base.demux.poll_interval_ms = overlay.demux.poll_interval_ms;
    base.demux.terminate_timeout_secs = overlay.demux.terminate_timeout_secs;
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("ZAPCAST_UDP_ADDR") {
        if let Ok(addr) = val.parse() {
            config.relay.udp_addr = addr;
        }
    }
    if let Ok(val) = std::env::var("ZAPCAST_HTTP_ADDR") {
        if let Ok(addr) = val.parse() {
            config.relay.http_addr = addr;
        }
    }
    if let Ok(val) = std::env::var("ZAPCAST_WORK_DIR") {
        config.demux.work_dir = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("ZAPCAST_POLL_INTERVAL_MS") {
        if let Ok(n) = val.parse() {
            config.demux.poll_interval_ms = n;
        }
    }
}
