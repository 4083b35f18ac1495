//! Events published on the bridge event bus.

use serde::{Deserialize, Serialize};

/// Events exchanged between the bridge components and the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeEvent {
    /// Discovery observed a different set of sources.
    SourcesChanged {
        /// Full list of currently visible sources, in discovery order.
        sources: Vec<String>,
    },

    /// The binding list was rebuilt from a scene scan.
    BindingsChanged,

    /// The source catalog gained entries or changed activity.
    SourceCatalogChanged {
        /// Every catalog entry, sentinels first.
        sources: Vec<String>,
    },

    /// At least one source flipped between active and inactive.
    SourceActivityChanged,

    /// A stream worker timed out and was reaped.
    StreamStoppedUnexpectedly {
        /// Texture id of the reaped worker.
        id: String,
    },

    /// A source selector changed value.
    BindingComboChanged {
        /// Texture id the selector belongs to.
        id: String,

        /// Position of the selector's panel.
        index: usize,

        /// Selected source name.
        value: String,
    },

    /// A stream worker was started.
    StreamStarted {
        /// Texture id of the worker.
        id: String,
    },

    /// A stream worker was stopped on request.
    StreamStopped {
        /// Texture id of the worker.
        id: String,
    },
}

impl BridgeEvent {
    /// Returns a simple string representation of the event kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SourcesChanged { .. } => "SourcesChanged",
            Self::BindingsChanged => "BindingsChanged",
            Self::SourceCatalogChanged { .. } => "SourceCatalogChanged",
            Self::SourceActivityChanged => "SourceActivityChanged",
            Self::StreamStoppedUnexpectedly { .. } => "StreamStoppedUnexpectedly",
            Self::BindingComboChanged { .. } => "BindingComboChanged",
            Self::StreamStarted { .. } => "StreamStarted",
            Self::StreamStopped { .. } => "StreamStopped",
        }
    }
}
