//! Peer address validation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::SessionError;

use super::channel::RawTubeAddress;

/// A validated peer socket address resolved from an accepted tube.
///
/// Created once per successful acceptance and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddr {
    /// Host the tube's local socket listens on. Never empty.
    pub host: String,
    /// Listening port.
    pub port: u16,
}

impl PeerAddr {
    /// Validate the raw two-element record returned by tube acceptance.
    ///
    /// IPv4 stream tubes are defined to yield a (host, port) pair: the host
    /// must be a non-empty string and the port strictly between 0 and 65536.
    /// A violation means the peer announced an inconsistent tube; the error
    /// is fatal for the session, not retried.
    pub fn from_raw(raw: RawTubeAddress) -> Result<Self, SessionError> {
        let (host, port) = raw;
        if host.is_empty() {
            return Err(SessionError::InvalidAddress("empty host".to_string()));
        }
        if port <= 0 || port >= 65536 {
            return Err(SessionError::InvalidAddress(format!(
                "port {} out of range",
                port
            )));
        }
        Ok(Self {
            host,
            port: port as u16,
        })
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
