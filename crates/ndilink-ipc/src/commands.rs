//! Commands sent from the host UI to the bridge.

use serde::{Deserialize, Serialize};

/// Commands that a presentation layer can send to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BridgeCommand {
    /// Create a dynamic texture material with the given (unsanitized) name.
    CreateDynamicTexture { name: String },

    /// Rescan the scene for dynamic texture prims.
    Rescan,

    /// Select a source for a texture.
    SetBindingSource { texture_id: String, source: String },

    /// Toggle the low bandwidth profile for a texture.
    SetLowBandwidth { texture_id: String, low_bandwidth: bool },

    /// Start streaming into a texture.
    StartStream { texture_id: String },

    /// Stop streaming into a texture.
    StopStream { texture_id: String },

    /// Stop every running stream.
    StopAllStreams,

    /// Shutdown the bridge completely.
    Shutdown,
}
