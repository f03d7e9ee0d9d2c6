//! Tube publication for the sharing side.

use tracing::info;

use crate::session::SessionError;

use super::channel::{
    AccessControl, TransportFamily, TubeChannel, TubeId, TubeParams, JOURNAL_STREAM_SERVICE,
};

/// Loopback address the offered tube forwards to.
const LOCAL_HOST: &str = "127.0.0.1";

/// Publish the content-share tube forwarding to the local server.
///
/// Runs once, on the shared transition; the content server is already
/// listening on `port` by then.
pub async fn offer_tube<C: TubeChannel>(channel: &C, port: u16) -> Result<TubeId, SessionError> {
    let id = channel
        .offer_stream_tube(
            JOURNAL_STREAM_SERVICE,
            TubeParams::new(),
            TransportFamily::Ipv4,
            LOCAL_HOST,
            port,
            AccessControl::Localhost,
            0,
        )
        .await
        .map_err(|e| SessionError::Channel(e.to_string()))?;

    info!(tube = id, port = port, "offered content tube");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChannel;

    #[tokio::test]
    async fn test_offer_forwards_to_local_server() {
        let channel = ScriptedChannel::new();
        let id = offer_tube(&channel, 2500).await.unwrap();

        let offers = channel.offers().await;
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].service, JOURNAL_STREAM_SERVICE);
        assert_eq!(offers[0].host, "127.0.0.1");
        assert_eq!(offers[0].port, 2500);
        assert_eq!(offers[0].family, TransportFamily::Ipv4);
        assert_eq!(offers[0].access, AccessControl::Localhost);
        assert_eq!(offers[0].flags, 0);
        assert_eq!(offers[0].id, id);
    }
}
