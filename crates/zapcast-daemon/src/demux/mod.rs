//! Demultiplexer process management.
//!
//! Spawns dvblast against the tuned frequency, keeps its control socket
//! and log inside the session work directory, and exposes the dvblastctl
//! query path used by the status poller.

pub mod control;
pub mod supervisor;

pub use control::{ControlError, fe_status};
pub use supervisor::{DemuxError, DemuxSpawnConfig, DemuxSupervisor, ExitNotice};

pub(crate) use supervisor::remove_socket_file;

/// Channel configuration file consumed by dvblast.
pub const CONF_FILE: &str = "dvblast.conf";

/// Unix control socket shared by dvblast and dvblastctl.
pub const SOCKET_FILE: &str = "zapcast.socket";

/// Append-only capture of dvblast's stderr.
pub const LOG_FILE: &str = "dvblast.log";
