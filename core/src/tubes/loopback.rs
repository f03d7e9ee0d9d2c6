//! In-process tube channel for same-host collaboration.
//!
//! A pair of channel ends sharing one registry: a tube offered on one end is
//! announced to subscribers of the other end, and accepting it returns the
//! address the offerer registered. Used by the demo binary and integration
//! tests; the real transport is provided by the embedding shell.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use super::channel::{
    AccessControl, ChannelError, RawTubeAddress, TransportFamily, TubeChannel, TubeId, TubeInfo,
    TubeParams, TubeState, TubeType,
};

#[derive(Default)]
struct Registry {
    next_id: TubeId,
    tubes: HashMap<TubeId, (TubeInfo, RawTubeAddress)>,
    /// Announcement subscribers, per end.
    subscribers: [Vec<mpsc::Sender<TubeInfo>>; 2],
}

/// One end of an in-process channel pair.
#[derive(Clone)]
pub struct LoopbackChannel {
    registry: Arc<Mutex<Registry>>,
    end: usize,
}

impl LoopbackChannel {
    /// Create a connected pair of channel ends.
    pub fn pair() -> (Self, Self) {
        let registry = Arc::new(Mutex::new(Registry::default()));
        (
            Self {
                registry: registry.clone(),
                end: 0,
            },
            Self { registry, end: 1 },
        )
    }
}

impl TubeChannel for LoopbackChannel {
    async fn subscribe_new_tubes(&self, tx: mpsc::Sender<TubeInfo>) {
        self.registry.lock().await.subscribers[self.end].push(tx);
    }

    async fn list_tubes(&self) -> Result<Vec<TubeInfo>, ChannelError> {
        let registry = self.registry.lock().await;
        Ok(registry
            .tubes
            .values()
            .map(|(info, _)| info.clone())
            .collect())
    }

    async fn accept_stream_tube(
        &self,
        id: TubeId,
        _family: TransportFamily,
        _access: AccessControl,
        _flags: u32,
    ) -> Result<RawTubeAddress, ChannelError> {
        let registry = self.registry.lock().await;
        registry
            .tubes
            .get(&id)
            .map(|(_, addr)| addr.clone())
            .ok_or_else(|| ChannelError::Rpc(format!("unknown tube {}", id)))
    }

    async fn offer_stream_tube(
        &self,
        service: &str,
        params: TubeParams,
        _family: TransportFamily,
        host: &str,
        port: u16,
        _access: AccessControl,
        _flags: u32,
    ) -> Result<TubeId, ChannelError> {
        let (info, peers) = {
            let mut registry = self.registry.lock().await;
            let id = registry.next_id;
            registry.next_id += 1;
            let info = TubeInfo {
                id,
                initiator: self.end as u64,
                tube_type: TubeType::Stream,
                service: service.to_string(),
                params,
                state: TubeState::Open,
            };
            registry
                .tubes
                .insert(id, (info.clone(), (host.to_string(), port as i64)));
            // Snapshot the peers so announcements go out without the lock held.
            (info, registry.subscribers[1 - self.end].clone())
        };

        for tx in peers {
            let _ = tx.send(info.clone()).await;
        }
        debug!(tube = info.id, service = service, "loopback tube offered");
        Ok(info.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tubes::channel::JOURNAL_STREAM_SERVICE;

    #[tokio::test]
    async fn test_offer_announces_to_other_end() {
        let (sharer_end, joiner_end) = LoopbackChannel::pair();

        let (tx, mut rx) = mpsc::channel(4);
        joiner_end.subscribe_new_tubes(tx).await;

        let id = sharer_end
            .offer_stream_tube(
                JOURNAL_STREAM_SERVICE,
                TubeParams::new(),
                TransportFamily::Ipv4,
                "127.0.0.1",
                2500,
                AccessControl::Localhost,
                0,
            )
            .await
            .unwrap();

        let announced = rx.recv().await.unwrap();
        assert_eq!(announced.id, id);
        assert_eq!(announced.service, JOURNAL_STREAM_SERVICE);
        assert_eq!(announced.state, TubeState::Open);
    }

    #[tokio::test]
    async fn test_accept_returns_offered_address() {
        let (sharer_end, joiner_end) = LoopbackChannel::pair();

        let id = sharer_end
            .offer_stream_tube(
                JOURNAL_STREAM_SERVICE,
                TubeParams::new(),
                TransportFamily::Ipv4,
                "127.0.0.1",
                2500,
                AccessControl::Localhost,
                0,
            )
            .await
            .unwrap();

        // Offered before the joiner subscribed; enumeration still sees it.
        let listed = joiner_end.list_tubes().await.unwrap();
        assert_eq!(listed.len(), 1);

        let addr = joiner_end
            .accept_stream_tube(id, TransportFamily::Ipv4, AccessControl::Localhost, 0)
            .await
            .unwrap();
        assert_eq!(addr, ("127.0.0.1".to_string(), 2500));
    }

    #[tokio::test]
    async fn test_accept_unknown_tube_fails() {
        let (_sharer_end, joiner_end) = LoopbackChannel::pair();
        let err = joiner_end
            .accept_stream_tube(99, TransportFamily::Ipv4, AccessControl::Localhost, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Rpc(_)));
    }
}
