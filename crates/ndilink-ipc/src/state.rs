//! Binding status shown next to each texture.

use serde::{Deserialize, Serialize};

/// Colour-coded activity of a binding, combining source visibility with
/// whether a stream is running for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityIndicator {
    /// Source visible, stream running.
    Playing,

    /// Source visible, no stream.
    Stopped,

    /// Stream running but the source is no longer visible.
    Warning,

    /// Source not visible, no stream.
    Inactive,
}

impl ActivityIndicator {
    /// Derive the indicator from source activity and playback state.
    pub fn from_state(source_active: bool, playing: bool) -> Self {
        match (source_active, playing) {
            (true, true) => Self::Playing,
            (true, false) => Self::Stopped,
            (false, true) => Self::Warning,
            (false, false) => Self::Inactive,
        }
    }

    /// Returns the display colour for this indicator.
    pub fn color(self) -> &'static str {
        match self {
            Self::Playing => "#78B159",
            Self::Stopped => "#E6E7E8",
            Self::Warning => "#F4900C",
            Self::Inactive => "#DD2E45",
        }
    }

    /// Returns a simple string representation of the indicator.
    pub fn name(self) -> &'static str {
        match self {
            Self::Playing => "Playing",
            Self::Stopped => "Stopped",
            Self::Warning => "Warning",
            Self::Inactive => "Inactive",
        }
    }
}
