//! Session errors

use std::fmt;

use crate::server::LaunchError;

/// Errors surfaced by the collaboration session.
#[derive(Debug)]
pub enum SessionError {
    /// The content server failed to start.
    Launch(LaunchError),
    /// No unused tube candidate is available right now; retried when the next
    /// announcement arrives.
    NoCandidate,
    /// A tube's accepted address failed structural validation. Fatal: the
    /// peer announced a tube the protocol cannot have produced.
    InvalidAddress(String),
    /// The initial tube enumeration failed.
    Enumeration(String),
    /// A channel RPC failed.
    Channel(String),
    /// The session event loop is no longer running.
    NotRunning,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Launch(e) => write!(f, "server launch failed: {}", e),
            SessionError::NoCandidate => write!(f, "no tube candidate available"),
            SessionError::InvalidAddress(e) => write!(f, "invalid tube address: {}", e),
            SessionError::Enumeration(e) => write!(f, "tube enumeration failed: {}", e),
            SessionError::Channel(e) => write!(f, "channel error: {}", e),
            SessionError::NotRunning => write!(f, "session is not running"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<LaunchError> for SessionError {
    fn from(e: LaunchError) -> Self {
        SessionError::Launch(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SessionError::NoCandidate;
        assert_eq!(err.to_string(), "no tube candidate available");

        let err = SessionError::InvalidAddress("port 70000 out of range".to_string());
        assert_eq!(err.to_string(), "invalid tube address: port 70000 out of range");

        let err = SessionError::NotRunning;
        assert_eq!(err.to_string(), "session is not running");

        let err = SessionError::Channel("bus disconnected".to_string());
        assert_eq!(err.to_string(), "channel error: bus disconnected");

        let err = SessionError::from(LaunchError::PortInUse(2500));
        assert_eq!(err.to_string(), "server launch failed: port 2500 is already in use");
    }

    #[test]
    fn test_session_error_is_error_trait() {
        let err: Box<dyn std::error::Error> = Box::new(SessionError::NoCandidate);
        assert!(!err.to_string().is_empty());
    }
}
