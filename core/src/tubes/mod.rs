//! Tube transport: the channel seam and the negotiation components.
//!
//! - `channel.rs`: `TubeChannel` trait and wire types
//! - `discovery.rs`: announcement filter and candidate set
//! - `connector.rs`: tube acceptance (joiner side)
//! - `offerer.rs`: tube publication (sharer side)
//! - `address.rs`: peer address validation
//! - `loopback.rs`: in-process channel pair

mod address;
mod channel;
mod connector;
mod discovery;
mod loopback;
mod offerer;

pub use address::PeerAddr;
pub use channel::{
    AccessControl, ChannelError, RawTubeAddress, TransportFamily, TubeChannel, TubeId, TubeInfo,
    TubeParams, TubeState, TubeType, JOURNAL_STREAM_SERVICE,
};
pub use connector::accept_tube;
pub use discovery::{watch, TubeDiscovery};
pub use loopback::LoopbackChannel;
pub use offerer::offer_tube;
