//! Streaming session lifecycle.

mod manager;
mod state;

pub use manager::{SessionManager, StartError};
pub use state::SessionState;
