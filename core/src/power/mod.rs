//! Suspend inhibition
//!
//! The power manager's marker directory exists while powerd is running; a
//! file in it named by our decimal pid inhibits suspend while present. Both
//! operations are best-effort: failures are logged, never fatal.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

/// Marker directory watched by the power manager.
pub const POWERD_INHIBIT_DIR: &str = "/var/run/powerd-inhibit-suspend";

/// Best-effort suspend inhibitor scoped to this process.
///
/// The marker is removed on [`allow`](Self::allow) and, as a backstop, when
/// the inhibitor is dropped.
#[derive(Debug)]
pub struct SuspendInhibitor {
    dir: PathBuf,
    inhibited: bool,
}

impl SuspendInhibitor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            inhibited: false,
        }
    }

    /// Whether the power manager facility is present.
    pub fn powerd_running(&self) -> bool {
        self.dir.is_dir()
    }

    fn marker_path(&self) -> PathBuf {
        self.dir.join(std::process::id().to_string())
    }

    /// Create the pid marker. Returns whether inhibition was applied.
    pub fn inhibit(&mut self) -> bool {
        if !self.powerd_running() {
            debug!(dir = %self.dir.display(), "powerd not running, suspend inhibition skipped");
            return false;
        }
        let path = self.marker_path();
        match fs::File::create(&path) {
            Ok(_) => {
                debug!(path = %path.display(), "suspend inhibited");
                self.inhibited = true;
                true
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to create suspend marker");
                false
            }
        }
    }

    /// Remove the pid marker if present. Idempotent; returns whether the
    /// facility was active.
    pub fn allow(&mut self) -> bool {
        self.inhibited = false;
        if !self.powerd_running() {
            return false;
        }
        let path = self.marker_path();
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!(error = %e, path = %path.display(), "failed to remove suspend marker");
            }
        }
        true
    }
}

impl Drop for SuspendInhibitor {
    fn drop(&mut self) {
        if self.inhibited {
            self.allow();
        }
    }
}
