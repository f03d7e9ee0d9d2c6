//! View coordination
//!
//! Decides which URL the (external) content viewer loads, based on role and
//! connection state. The viewer itself lives in the shell; it consumes
//! [`ActivityEvent::LoadUrl`] from the session's event stream.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::session::ActivityEvent;
use crate::tubes::PeerAddr;

/// Fixed document path served as the activity's index.
const INDEX_PATH: &str = "/web/index.html";

/// Viewer connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Uninitialized,
    /// Joiner only: waiting for a tube to resolve a peer address.
    AwaitingPeer,
    Connected,
    Closed,
}

/// Builds the viewer URL for a host and port.
pub fn content_url(host: &str, port: u16) -> String {
    format!("http://{}:{}{}", host, port, INDEX_PATH)
}

/// Tracks what the content viewer should display.
#[derive(Debug)]
pub struct ViewCoordinator {
    state: ViewState,
    event_tx: mpsc::Sender<ActivityEvent>,
}

impl ViewCoordinator {
    pub fn new(event_tx: mpsc::Sender<ActivityEvent>) -> Self {
        Self {
            state: ViewState::Uninitialized,
            event_tx,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Sharer path: load our own server's URL immediately.
    pub async fn connect_local(&mut self, port: u16) {
        self.state = ViewState::Connected;
        let url = content_url("0.0.0.0", port);
        info!(url = %url, "loading local content");
        let _ = self.event_tx.send(ActivityEvent::LoadUrl(url)).await;
    }

    /// Joiner path: wait for the connector to resolve a peer address.
    pub fn await_peer(&mut self) {
        if self.state == ViewState::Uninitialized {
            self.state = ViewState::AwaitingPeer;
        }
    }

    /// Joiner path: load the resolved peer URL.
    ///
    /// A resolved address feeds exactly one load-URL action; anything arriving
    /// after the first is dropped. Returns whether the URL was loaded.
    pub async fn connect_peer(&mut self, addr: &PeerAddr) -> bool {
        if self.state == ViewState::Connected {
            debug!(addr = %addr, "already connected, ignoring address");
            return false;
        }
        self.state = ViewState::Connected;
        let url = content_url(&addr.host, addr.port);
        info!(url = %url, "loading peer content");
        let _ = self.event_tx.send(ActivityEvent::LoadUrl(url)).await;
        true
    }

    /// Session termination.
    pub async fn close(&mut self) {
        if self.state == ViewState::Closed {
            return;
        }
        self.state = ViewState::Closed;
        let _ = self.event_tx.send(ActivityEvent::Closed).await;
    }
}
