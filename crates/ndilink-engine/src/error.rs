//! Error types for the engine.

use thiserror::Error;

use ndilink_stream::StreamError;

/// Errors returned when starting a stream.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A worker already feeds this texture.
    #[error("There's already a stream running for {0}")]
    AlreadyStreaming(String),

    /// The binding selects no source.
    #[error("Won't create stream for {0} without a source")]
    NoSource(String),

    /// The worker could not be constructed.
    #[error("Could not start stream: {0}")]
    Worker(#[from] StreamError),
}

/// Errors returned by the binding store.
#[derive(Debug, Error)]
pub enum BindingError {
    /// No binding has this texture id.
    #[error("Unknown texture: {0}")]
    UnknownTexture(String),
}

/// Errors returned by a scene store.
#[derive(Debug, Error)]
pub enum SceneError {
    /// No prim exists at the path.
    #[error("Could not find prim at {0}")]
    PrimNotFound(String),

    /// The scene document could not be read or written.
    #[error("Invalid scene document: {0}")]
    Document(#[from] serde_json::Error),
}

/// Errors returned by bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A binding already uses the sanitized texture name.
    #[error("There's already a texture with the name {0}")]
    DuplicateTexture(String),

    /// Scene access failed.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Binding update failed.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// Stream start failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
