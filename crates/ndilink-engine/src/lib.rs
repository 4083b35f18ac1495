//! Core of the ndilink bridge.
//!
//! This crate ties discovery, stream workers and the scene together: the
//! [`StreamRegistry`] owns the running workers, the [`BindingStore`] mirrors
//! which texture reads from which source, and the [`Bridge`] drives both from
//! the host's update tick.

mod bindings;
mod bridge;
mod error;
mod naming;
mod registry;
mod scene;

pub use bindings::{Binding, BindingStore, BindingView, ReconcileReport, SourceEntry};
pub use bridge::{Bridge, PLACEHOLDER_RGBA};
pub use error::{BindingError, BridgeError, RegistryError, SceneError};
pub use naming::make_valid_identifier;
pub use registry::StreamRegistry;
pub use scene::{
    AttributeValue, DynamicPrim, MemoryScene, Prim, PrimKind, SceneStore, BANDWIDTH_ATTRIBUTE,
    DYNAMIC_PREFIX, LIGHT_TEXTURE_ATTRIBUTE, LOOKS_SCOPE, SHADER_TEXTURE_INPUT, SOURCE_ATTRIBUTE,
};

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
