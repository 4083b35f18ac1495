//! Source descriptors and receiver settings.

use serde::{Deserialize, Serialize};

/// A source as reported by the finder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique name assigned by the producer, e.g. `"MY-PC (Test Pattern)"`.
    pub name: String,

    /// Network address, when the library exposes it.
    pub url_address: Option<String>,
}

impl SourceDescriptor {
    /// Create a descriptor without an address.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_address: None,
        }
    }
}

/// Negotiated stream quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bandwidth {
    /// Native resolution and quality.
    #[default]
    Highest,

    /// Reduced-bandwidth preview stream.
    Lowest,
}

impl Bandwidth {
    /// Profile matching a binding's low bandwidth flag.
    pub fn from_low_bandwidth(low_bandwidth: bool) -> Self {
        if low_bandwidth {
            Self::Lowest
        } else {
            Self::Highest
        }
    }
}

/// Pixel layout requested from the receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorFormat {
    /// BGRX for opaque frames, BGRA when alpha is present.
    #[default]
    BgrxBgra,
}

/// Settings used to create a receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverSettings {
    /// Bandwidth profile.
    pub bandwidth: Bandwidth,

    /// Pixel layout of delivered frames.
    pub color_format: ColorFormat,
}

impl ReceiverSettings {
    /// Settings for a binding's low bandwidth flag.
    pub fn for_low_bandwidth(low_bandwidth: bool) -> Self {
        Self {
            bandwidth: Bandwidth::from_low_bandwidth(low_bandwidth),
            color_format: ColorFormat::BgrxBgra,
        }
    }
}
