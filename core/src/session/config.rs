//! Session configuration

use std::path::PathBuf;

use crate::power::POWERD_INHIBIT_DIR;
use crate::view;

/// Default port the content server binds.
///
/// Fixed rather than negotiated; see the launcher for the port-probe caveat.
pub const DEFAULT_PORT: u16 = 2500;

/// Role of this participant. Fixed at creation; a joiner never becomes a
/// sharer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Our local server is the authoritative content source.
    Sharer,
    /// We reach a sharer's content through a tube.
    Joiner,
}

/// Configuration for a collaboration session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Role of this participant.
    pub role: SessionRole,

    /// Joiner only: the shell reports the activity was already joined when
    /// the session was constructed, so no "joined" transition will arrive.
    pub already_joined: bool,

    /// Port the content server binds (sharer side).
    /// Default: 2500
    pub port: u16,

    /// Directory of documents the server exposes.
    pub content_root: PathBuf,

    /// Writable state directory; the server runs with this as its working
    /// directory.
    pub state_dir: PathBuf,

    /// External file-server program, invoked as `<program> <content_root>
    /// <port>`.
    pub server_program: PathBuf,

    /// Marker directory of the power manager.
    /// Default: /var/run/powerd-inhibit-suspend
    pub powerd_dir: PathBuf,

    /// Capacity of the app-layer event channel.
    /// Default: 64
    pub event_capacity: usize,
}

impl SessionConfig {
    /// Config for a sharing participant serving `content_root`.
    pub fn sharer(
        content_root: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
        server_program: impl Into<PathBuf>,
    ) -> Self {
        Self {
            role: SessionRole::Sharer,
            content_root: content_root.into(),
            state_dir: state_dir.into(),
            server_program: server_program.into(),
            ..Self::joiner()
        }
    }

    /// Config for a joining participant.
    pub fn joiner() -> Self {
        Self {
            role: SessionRole::Joiner,
            already_joined: false,
            port: DEFAULT_PORT,
            content_root: PathBuf::from("web"),
            state_dir: PathBuf::from("."),
            server_program: PathBuf::from("journal-http-server"),
            powerd_dir: PathBuf::from(POWERD_INHIBIT_DIR),
            event_capacity: 64,
        }
    }

    /// Config with a tmp-friendly layout for tests.
    pub fn for_testing(role: SessionRole) -> Self {
        let tmp = std::env::temp_dir();
        Self {
            role,
            already_joined: false,
            port: DEFAULT_PORT,
            content_root: tmp.clone(),
            state_dir: tmp.clone(),
            // Spawnable everywhere; exits on its own, killable either way.
            server_program: PathBuf::from("sleep"),
            powerd_dir: tmp,
            event_capacity: 64,
        }
    }

    /// URL of our own server's index document (sharer side).
    pub fn local_url(&self) -> String {
        view::content_url("0.0.0.0", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharer_defaults() {
        let config = SessionConfig::sharer("web", "/tmp/state", "journal-http-server");
        assert_eq!(config.role, SessionRole::Sharer);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.already_joined);
        assert_eq!(config.powerd_dir, PathBuf::from(POWERD_INHIBIT_DIR));
    }

    #[test]
    fn test_local_url_uses_port() {
        let mut config = SessionConfig::sharer("web", ".", "journal-http-server");
        config.port = 2500;
        assert_eq!(config.local_url(), "http://0.0.0.0:2500/web/index.html");
    }
}
