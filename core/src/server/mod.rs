//! Content server lifecycle
//!
//! The HTTP file server is an external program; the core starts it on a
//! chosen port, remembers the port, and kills the process on shutdown. Its
//! request handling is not our concern.

use std::fmt;
use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Error starting the content server.
#[derive(Debug)]
pub enum LaunchError {
    /// The chosen port is already bound.
    PortInUse(u16),
    /// The server process could not be spawned.
    Spawn(String),
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::PortInUse(port) => write!(f, "port {} is already in use", port),
            LaunchError::Spawn(e) => write!(f, "failed to spawn server: {}", e),
        }
    }
}

impl std::error::Error for LaunchError {}

/// Handle to the running content server process.
///
/// Owned by the sharer role only; created at session construction and torn
/// down at close.
#[derive(Debug)]
pub struct ContentServer {
    child: Option<Child>,
    port: u16,
}

impl ContentServer {
    /// Spawn the file server on `port`, serving `content_root`.
    ///
    /// The program is invoked as `<program> <content_root> <port>` with
    /// `state_dir` as its working directory and stdio nulled.
    // TODO: probe for a free port instead of failing when the default is taken
    pub fn start(
        program: &Path,
        content_root: &Path,
        state_dir: &Path,
        port: u16,
    ) -> Result<Self, LaunchError> {
        if !port_available(port) {
            return Err(LaunchError::PortInUse(port));
        }

        let child = Command::new(program)
            .arg(content_root)
            .arg(port.to_string())
            .current_dir(state_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LaunchError::Spawn(format!("{}: {}", program.display(), e)))?;

        info!(port = port, program = %program.display(), "content server started");
        Ok(Self {
            child: Some(child),
            port,
        })
    }

    /// Port the server was started on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Force-kill the server process. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, port = self.port, "failed to kill content server");
            } else {
                info!(port = self.port, "content server stopped");
            }
        }
    }
}

/// Returns `true` when `port` can still be bound locally.
fn port_available(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tmp() -> PathBuf {
        std::env::temp_dir()
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut server =
            ContentServer::start(Path::new("sleep"), &tmp(), &tmp(), port).unwrap();
        assert_eq!(server.port(), port);

        server.stop();
        server.stop();
    }

    #[tokio::test]
    async fn test_bound_port_is_rejected() {
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let err = ContentServer::start(Path::new("sleep"), &tmp(), &tmp(), port).unwrap_err();
        assert!(matches!(err, LaunchError::PortInUse(p) if p == port));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = ContentServer::start(
            Path::new("/nonexistent/journal-http-server"),
            &tmp(),
            &tmp(),
            port,
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn(_)));
    }
}
