//! Continuous network source discovery.
//!
//! A [`DiscoveryService`] owns the library finder and polls it on a
//! background thread, publishing [`ndilink_ipc::BridgeEvent::SourcesChanged`]
//! whenever the visible source set differs from the previous poll.

mod error;
mod service;
mod snapshot;

pub use error::DiscoveryError;
pub use service::{poll_once, DiscoveryService, SourceTracker};
pub use snapshot::SourceSnapshot;

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
