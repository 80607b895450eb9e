//! zapcast core library
//!
//! Shared functionality for zapcast components:
//! - Channel descriptor parsing
//! - Frontend status document parsing (tolerant reader)
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod channel;
pub mod config;
pub mod error;
pub mod frontend;
pub mod tracing_init;

pub use channel::{ChannelDescriptor, ChannelParseError};
pub use config::Config;
pub use error::{Error, Result};
pub use frontend::{FrontendStatus, StatusFlags};
