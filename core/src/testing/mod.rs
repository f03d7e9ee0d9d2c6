//! Testing utilities
//!
//! Provides an in-process scripted tube channel for testing the negotiation
//! core without a real peer transport.
//!
//! # Example
//!
//! ```ignore
//! let channel = ScriptedChannel::new();
//! channel.script_accept(Ok(("10.0.0.5".to_string(), 3400))).await;
//!
//! let session = Session::start(config, channel.clone()).await?;
//! channel.announce(stream_tube(7, JOURNAL_STREAM_SERVICE)).await;
//! // ... assert on session events and channel.accepts() ...
//! ```

pub mod channel;

pub use channel::{AcceptCall, OfferCall, ScriptedChannel};

use crate::tubes::{TubeId, TubeInfo, TubeParams, TubeState, TubeType};

/// Build an open stream-tube announcement for `service`.
pub fn stream_tube(id: TubeId, service: &str) -> TubeInfo {
    TubeInfo {
        id,
        initiator: 1,
        tube_type: TubeType::Stream,
        service: service.to_string(),
        params: TubeParams::new(),
        state: TubeState::Open,
    }
}
