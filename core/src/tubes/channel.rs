//! Tube channel seam
//!
//! The peer channel itself is owned by the embedding shell; it is an RPC-like
//! bus over the presence transport. This module defines the operations the
//! negotiation core needs from it, plus the wire-facing types.
//!
//! Implementations: the shell provides the real transport,
//! [`LoopbackChannel`](super::LoopbackChannel) covers same-host use, and
//! [`ScriptedChannel`](crate::testing::ScriptedChannel) covers tests.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Well-known service name advertised by content-share tubes.
///
/// The offerer and the discovery filter must match on this exactly.
pub const JOURNAL_STREAM_SERVICE: &str = "journal-activity-http";

/// Identifier of a tube within its channel.
pub type TubeId = u64;

/// Parameter map attached to a tube announcement (variant-typed on the wire).
pub type TubeParams = HashMap<String, serde_json::Value>;

/// Raw socket address returned by tube acceptance: a two-element record of
/// host string and port integer, not yet validated.
///
/// Validated into a [`PeerAddr`](super::PeerAddr) before use.
pub type RawTubeAddress = (String, i64);

/// Kind of a tube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TubeType {
    /// Message-bus tube (not used by this activity).
    DBus,
    /// Byte-stream tube tunneling a TCP connection.
    Stream,
}

/// Channel state of an announced tube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TubeState {
    NotOffered,
    LocalPending,
    RemotePending,
    Open,
}

/// Address family requested for the tube's local socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportFamily {
    Ipv4,
    Ipv6,
}

/// Access control applied to the tube's local socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessControl {
    /// Only connections from the local host are accepted.
    Localhost,
    /// Only connections from a declared source port are accepted.
    Port,
}

/// A tube announcement as delivered by the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TubeInfo {
    /// Tube identifier within the channel.
    pub id: TubeId,
    /// Handle of the participant that offered the tube.
    pub initiator: u64,
    /// Tube kind.
    pub tube_type: TubeType,
    /// Service name the tube advertises.
    pub service: String,
    /// Service-defined parameters.
    pub params: TubeParams,
    /// Channel state at announcement time.
    pub state: TubeState,
}

/// Errors surfaced by the channel transport.
#[derive(Debug, Clone)]
pub enum ChannelError {
    /// An RPC call on the channel failed.
    Rpc(String),
    /// The channel is gone (the shell closed it or the session left).
    Closed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Rpc(e) => write!(f, "channel rpc failed: {}", e),
            ChannelError::Closed => write!(f, "channel is closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Peer-channel operations used by the negotiation core.
///
/// Futures are `Send` so channel calls can run off the session loop; results
/// re-enter the loop as queued commands, never from inside a completion
/// callback.
pub trait TubeChannel: Send + Sync + 'static {
    /// Register a live feed of newly announced tubes.
    fn subscribe_new_tubes(&self, tx: mpsc::Sender<TubeInfo>) -> impl Future<Output = ()> + Send;

    /// Enumerate currently open tubes.
    fn list_tubes(&self) -> impl Future<Output = Result<Vec<TubeInfo>, ChannelError>> + Send;

    /// Accept a previously announced stream tube.
    ///
    /// Returns the raw listening address of the local socket the tube
    /// forwards through.
    fn accept_stream_tube(
        &self,
        id: TubeId,
        family: TransportFamily,
        access: AccessControl,
        flags: u32,
    ) -> impl Future<Output = Result<RawTubeAddress, ChannelError>> + Send;

    /// Offer a stream tube forwarding to a local address, returning the id of
    /// the new tube.
    fn offer_stream_tube(
        &self,
        service: &str,
        params: TubeParams,
        family: TransportFamily,
        host: &str,
        port: u16,
        access: AccessControl,
        flags: u32,
    ) -> impl Future<Output = Result<TubeId, ChannelError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::Rpc("timeout".to_string());
        assert_eq!(err.to_string(), "channel rpc failed: timeout");

        let err = ChannelError::Closed;
        assert_eq!(err.to_string(), "channel is closed");
    }

    #[test]
    fn test_tube_info_roundtrip() {
        let info = TubeInfo {
            id: 7,
            initiator: 3,
            tube_type: TubeType::Stream,
            service: JOURNAL_STREAM_SERVICE.to_string(),
            params: TubeParams::new(),
            state: TubeState::Open,
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: TubeInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 7);
        assert_eq!(back.service, JOURNAL_STREAM_SERVICE);
        assert_eq!(back.state, TubeState::Open);
    }
}
