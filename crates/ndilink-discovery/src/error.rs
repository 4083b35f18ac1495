//! Error types for the discovery module.

use thiserror::Error;

use ndilink_sdk::SdkError;

/// Errors that can occur while starting discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The library could not be initialized.
    #[error("Could not initialize discovery library: {0}")]
    Initialize(#[source] SdkError),

    /// The library refused to create a finder.
    #[error("Could not create source finder: {0}")]
    Finder(#[source] SdkError),

    /// The poll thread could not be spawned.
    #[error("Could not spawn discovery thread: {0}")]
    Spawn(#[from] std::io::Error),
}
