//! Scripted tube channel.
//!
//! A [`TubeChannel`] whose responses are queued by the test: enumeration
//! results, acceptance results (well-formed or malformed), and push-style
//! announcements. Accept and offer calls are recorded for assertions.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::tubes::{
    AccessControl, ChannelError, RawTubeAddress, TransportFamily, TubeChannel, TubeId, TubeInfo,
    TubeParams,
};

/// A recorded `accept_stream_tube` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptCall {
    pub id: TubeId,
    pub family: TransportFamily,
    pub access: AccessControl,
    pub flags: u32,
}

/// A recorded `offer_stream_tube` call.
#[derive(Debug, Clone)]
pub struct OfferCall {
    /// Tube id handed back to the offerer.
    pub id: TubeId,
    pub service: String,
    pub family: TransportFamily,
    pub host: String,
    pub port: u16,
    pub access: AccessControl,
    pub flags: u32,
}

#[derive(Default)]
struct Script {
    list_result: Option<Result<Vec<TubeInfo>, ChannelError>>,
    accept_results: VecDeque<Result<RawTubeAddress, ChannelError>>,
    accepts: Vec<AcceptCall>,
    offers: Vec<OfferCall>,
    subscribers: Vec<mpsc::Sender<TubeInfo>>,
    next_offer_id: TubeId,
}

/// A channel whose behavior is scripted by the test.
#[derive(Clone, Default)]
pub struct ScriptedChannel {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the enumeration result. Unscripted enumeration returns no tubes.
    pub async fn script_list(&self, result: Result<Vec<TubeInfo>, ChannelError>) {
        self.inner.lock().await.list_result = Some(result);
    }

    /// Queue a response for the next accept call.
    pub async fn script_accept(&self, result: Result<RawTubeAddress, ChannelError>) {
        self.inner.lock().await.accept_results.push_back(result);
    }

    /// Announce a tube to live subscribers.
    pub async fn announce(&self, info: TubeInfo) {
        let subscribers = self.inner.lock().await.subscribers.clone();
        for tx in subscribers {
            let _ = tx.send(info.clone()).await;
        }
    }

    /// Number of registered announcement subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }

    /// Accept calls recorded so far.
    pub async fn accepts(&self) -> Vec<AcceptCall> {
        self.inner.lock().await.accepts.clone()
    }

    /// Offer calls recorded so far.
    pub async fn offers(&self) -> Vec<OfferCall> {
        self.inner.lock().await.offers.clone()
    }
}

impl TubeChannel for ScriptedChannel {
    async fn subscribe_new_tubes(&self, tx: mpsc::Sender<TubeInfo>) {
        self.inner.lock().await.subscribers.push(tx);
    }

    async fn list_tubes(&self) -> Result<Vec<TubeInfo>, ChannelError> {
        self.inner
            .lock()
            .await
            .list_result
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn accept_stream_tube(
        &self,
        id: TubeId,
        family: TransportFamily,
        access: AccessControl,
        flags: u32,
    ) -> Result<RawTubeAddress, ChannelError> {
        let mut script = self.inner.lock().await;
        script.accepts.push(AcceptCall {
            id,
            family,
            access,
            flags,
        });
        script
            .accept_results
            .pop_front()
            .unwrap_or_else(|| Err(ChannelError::Rpc("unscripted accept call".to_string())))
    }

    async fn offer_stream_tube(
        &self,
        service: &str,
        _params: TubeParams,
        family: TransportFamily,
        host: &str,
        port: u16,
        access: AccessControl,
        flags: u32,
    ) -> Result<TubeId, ChannelError> {
        let mut script = self.inner.lock().await;
        let id = script.next_offer_id;
        script.next_offer_id += 1;
        script.offers.push(OfferCall {
            id,
            service: service.to_string(),
            family,
            host: host.to_string(),
            port,
            access,
            flags,
        });
        Ok(id)
    }
}
