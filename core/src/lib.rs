//! JournalShare Core
//!
//! Collaboration core for a document-share activity: the sharing participant
//! serves its documents over a local HTTP server and publishes a stream tube
//! to it; joining participants discover the tube, accept it, and hand the
//! resolved address to their content viewer.
//!
//! This crate covers the peer negotiation and server lifecycle only. The GUI
//! shell, the embedded web view, and the file server's request handling live
//! outside it; the shell drives the session through role transitions and
//! consumes [`ActivityEvent`]s.
//!
//! # Module Structure
//!
//! - `session/`: Public interface (Session lifecycle, config, events, errors)
//! - `tubes/`: Channel seam, discovery, connector, offerer, loopback transport
//! - `server/`: Content server process lifecycle
//! - `power/`: Suspend-inhibit marker handling
//! - `view/`: Viewer URL coordination
//! - `testing/`: Scripted channel for tests
//!
//! # Quick Start
//!
//! ```ignore
//! use journalshare_core::{LoopbackChannel, Session, SessionConfig};
//!
//! let (sharer_end, _joiner_end) = LoopbackChannel::pair();
//! let config = SessionConfig::sharer("web", ".", "journal-http-server");
//! let session = Session::start(config, sharer_end).await?;
//!
//! // Shell flips the collaboration toggle:
//! session.shared()?;
//!
//! // Viewer consumes session.events() ...
//! session.close().await;
//! ```

// Public interface
pub mod session;

// Infrastructure modules
pub mod power;
pub mod server;
pub mod testing;
pub mod tubes;
pub mod view;

// Re-export main API types for convenience
pub use session::{ActivityEvent, Session, SessionConfig, SessionError, SessionRole, DEFAULT_PORT};

pub use power::{SuspendInhibitor, POWERD_INHIBIT_DIR};
pub use server::{ContentServer, LaunchError};
pub use tubes::{
    AccessControl, ChannelError, LoopbackChannel, PeerAddr, RawTubeAddress, TransportFamily,
    TubeChannel, TubeDiscovery, TubeId, TubeInfo, TubeParams, TubeState, TubeType,
    JOURNAL_STREAM_SERVICE,
};
pub use view::{content_url, ViewState};
