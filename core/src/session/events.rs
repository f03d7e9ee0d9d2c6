//! Session events for the application layer
//!
//! The embedding shell consumes these to drive the content viewer and its
//! collaboration UI.

/// Events emitted by the session for the embedding shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    /// The content viewer should load this URL.
    LoadUrl(String),
    /// The content tube was published (sharer side).
    TubeOffered(u64),
    /// The session closed and released its resources.
    Closed,
}
