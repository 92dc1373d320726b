use std::fmt;

/// Connection lifecycle of the remote, owned by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting,
    Connected,
    Disconnected,
    Error,
    /// Terminal, only reached through a shutdown request.
    Stopped,
}

impl ConnectionState {
    /// Whether the state machine may move from `self` to `next`.
    pub fn permits(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        if next == Stopped {
            return self != Stopped;
        }

        matches!(
            (self, next),
            (Idle, Idle | Scanning)
                | (Scanning, Scanning | Connecting | Error)
                | (Connecting, Connected | Error | Scanning)
                | (Connected, Connected | Disconnected | Error)
                | (Disconnected, Scanning)
                | (Error, Scanning)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Scanning => "scanning",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Error => "error",
            ConnectionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::*;

    #[test]
    fn test_lifecycle_paths() {
        assert!(Idle.permits(Scanning));
        assert!(Scanning.permits(Scanning));
        assert!(Scanning.permits(Connecting));
        assert!(Connecting.permits(Connected));
        assert!(Connecting.permits(Error));
        assert!(Connected.permits(Disconnected));
        assert!(Disconnected.permits(Scanning));
        assert!(Error.permits(Scanning));
    }

    #[test]
    fn test_shortcuts_are_rejected() {
        assert!(!Idle.permits(Connected));
        assert!(!Scanning.permits(Connected));
        assert!(!Connecting.permits(Disconnected));
        assert!(!Disconnected.permits(Connected));
        assert!(!Disconnected.permits(Disconnected));
        assert!(!Error.permits(Connected));
    }

    #[test]
    fn test_stopped_is_terminal() {
        for state in [Idle, Scanning, Connecting, Connected, Disconnected, Error] {
            assert!(state.permits(Stopped));
            assert!(!Stopped.permits(state));
        }
        assert!(!Stopped.permits(Stopped));
    }
}
