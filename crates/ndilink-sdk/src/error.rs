//! Error types for the library contract.

use thiserror::Error;

/// Errors reported by the discovery/receive library.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Library could not be brought up (missing runtime, no network).
    #[error("Library unavailable: {0}")]
    Unavailable(String),

    /// Library used before `initialize`.
    #[error("Library not initialized")]
    NotInitialized,

    /// Finder creation failed.
    #[error("Could not create source finder")]
    FinderUnavailable,

    /// Receiver creation failed.
    #[error("Could not create receiver: {0}")]
    ReceiverUnavailable(String),

    /// Connection to a source failed.
    #[error("Could not connect to source: {0}")]
    ConnectFailed(String),
}
