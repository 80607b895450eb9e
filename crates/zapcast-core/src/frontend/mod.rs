//! Frontend status reporting.
//!
//! This module parses the XML status documents emitted by the
//! demultiplexer's control interface into immutable snapshots,
//! implementing a tolerant reader pattern.

mod parser;
mod types;

pub use parser::{StatusParseError, parse_status};
pub use types::{FrontendStatus, SIGNAL_MAX, StatusFlags};
