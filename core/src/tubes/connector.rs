//! Tube acceptance for the joining side.

use tracing::{info, warn};

use crate::session::SessionError;

use super::address::PeerAddr;
use super::channel::{AccessControl, TransportFamily, TubeChannel, TubeId};

/// Accept a discovered tube and validate the listening address it returns.
///
/// The request is pinned to an IPv4 stream socket restricted to the local
/// host, with flags 0. A malformed accepted address is
/// [`SessionError::InvalidAddress`] and fatal for the session; an RPC failure
/// is [`SessionError::Channel`], after which the next candidate may be tried.
pub async fn accept_tube<C: TubeChannel>(channel: &C, id: TubeId) -> Result<PeerAddr, SessionError> {
    let raw = channel
        .accept_stream_tube(id, TransportFamily::Ipv4, AccessControl::Localhost, 0)
        .await
        .map_err(|e| {
            warn!(tube = id, error = %e, "tube acceptance failed");
            SessionError::Channel(e.to_string())
        })?;

    info!(tube = id, host = %raw.0, port = raw.1, "accepted stream tube");
    PeerAddr::from_raw(raw)
}
