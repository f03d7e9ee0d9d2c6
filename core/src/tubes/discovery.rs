//! Tube discovery
//!
//! Watches the channel's announcement stream for content-share tubes and
//! tracks the candidates the connector has not consumed yet.

use std::collections::BTreeSet;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::session::SessionError;

use super::channel::{TubeChannel, TubeId, TubeInfo, JOURNAL_STREAM_SERVICE};

/// Candidate tubes not yet handed to the connector.
#[derive(Debug, Default)]
pub struct TubeDiscovery {
    unused: BTreeSet<TubeId>,
}

impl TubeDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the service filter to an announced tube.
    ///
    /// Returns `true` when the tube is a new content-share candidate, so the
    /// caller can schedule a connection attempt. Tubes for other services are
    /// dropped entirely; so are duplicate announcements.
    pub fn observe(&mut self, info: &TubeInfo) -> bool {
        if info.service != JOURNAL_STREAM_SERVICE {
            debug!(
                tube = info.id,
                service = %info.service,
                "ignoring tube for foreign service"
            );
            return false;
        }
        debug!(
            tube = info.id,
            initiator = info.initiator,
            state = ?info.state,
            "content tube announced"
        );
        self.unused.insert(info.id)
    }

    /// Remove and return one unconsumed candidate, lowest id first.
    ///
    /// An id leaves the set exactly once, at the moment it is handed out.
    pub fn take_candidate(&mut self) -> Option<TubeId> {
        self.unused.pop_first()
    }

    pub fn len(&self) -> usize {
        self.unused.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unused.is_empty()
    }
}

/// Subscribe to tube announcements and replay the tubes already open.
///
/// The live subscription is registered before the enumeration so a tube
/// announced in between is not missed; the candidate set deduplicates any
/// overlap. Enumeration failure is logged and not retried — discovery then
/// relies on live announcements alone.
pub async fn watch<C: TubeChannel>(channel: &C, announce_tx: mpsc::Sender<TubeInfo>) {
    channel.subscribe_new_tubes(announce_tx.clone()).await;
    match channel.list_tubes().await {
        Ok(tubes) => {
            for info in tubes {
                if announce_tx.send(info).await.is_err() {
                    return;
                }
            }
        }
        Err(e) => {
            let e = SessionError::Enumeration(e.to_string());
            warn!(error = %e, "relying on live announcements only");
        }
    }
}
