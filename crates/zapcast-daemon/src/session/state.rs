//! Session lifecycle states.

/// Lifecycle of a streaming session.
///
/// Transitions move in one direction: `Stopped` to `Starting` to
/// `Streaming` to `Stopping` and back to `Stopped`. A failed start jumps
/// from `Starting` straight back to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session; resources are released.
    #[default]
    Stopped,
    /// Launching the demultiplexer and binding sockets.
    Starting,
    /// Demultiplexer running, relay serving viewers.
    Streaming,
    /// Tearing down workers and the demultiplexer.
    Stopping,
}

impl SessionState {
    /// Whether a new session may start from this state.
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Streaming => "streaming",
            Self::Stopping => "stopping",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stopped_can_start() {
        assert!(SessionState::Stopped.can_start());
        assert!(!SessionState::Starting.can_start());
        assert!(!SessionState::Streaming.can_start());
        assert!(!SessionState::Stopping.can_start());
    }
}
