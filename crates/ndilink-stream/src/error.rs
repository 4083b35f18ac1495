//! Error types for the stream module.

use thiserror::Error;

use ndilink_sdk::SdkError;

/// Errors that can occur while constructing a stream worker.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The source is not in the latest discovery snapshot.
    #[error("Could not find source: {0}")]
    SourceNotFound(String),

    /// The library refused to create a receiver.
    #[error("Could not create receiver: {0}")]
    Receiver(#[source] SdkError),

    /// The receiver could not connect to the source.
    #[error("Could not connect to source: {0}")]
    Connect(#[source] SdkError),

    /// The capture thread could not be spawned.
    #[error("Could not spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
}
