//! zapcast daemon library.
//!
//! Tunes a DVB-T frontend through a supervised dvblast subprocess and
//! relays the resulting MPEG-TS stream to HTTP viewers:
//!
//! - Demultiplexer supervision (spawn, log capture, graceful shutdown)
//! - UDP to HTTP stream relay
//! - Frontend signal status polling
//! - Session lifecycle orchestration

pub mod demux;
pub mod poller;
pub mod relay;
pub mod session;
