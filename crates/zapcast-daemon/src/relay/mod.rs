//! UDP to HTTP stream relay.

mod server;

pub use server::{RESPONSE_HEADER, RelayError, StreamRelay};
