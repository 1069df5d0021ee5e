//! Link lifecycle states.

use std::fmt;

/// Serial link state, owned by the link manager
///
/// ```text
/// Disconnected --retry interval--> Connecting --open ok--> Connected
///      ^                               |                     |   ^
///      |            open failed        |       no bytes for  |   | bytes
///      +-------------------------------+       data timeout  v   |
///      +----------- I/O error ------------------------- TimedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    TimedOut,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::TimedOut => "timed out",
        }
    }

    /// Whether a device handle is open in this state
    pub fn has_port(self) -> bool {
        matches!(self, Self::Connected | Self::TimedOut)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(LinkState::default(), LinkState::Disconnected);
    }

    #[test]
    fn test_has_port() {
        assert!(!LinkState::Disconnected.has_port());
        assert!(!LinkState::Connecting.has_port());
        assert!(LinkState::Connected.has_port());
        assert!(LinkState::TimedOut.has_port());
    }
}
