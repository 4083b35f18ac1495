//! Common types used across bridge messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Catalog entry meaning "no source selected".
pub const NONE_SOURCE: &str = "NONE";

/// Catalog entry selecting the synthetic test pattern.
pub const PROXY_SOURCE: &str = "PROXY (1080p30) - RED";

/// Parse the frame rate out of a proxy label such as `"PROXY (1080p30) - RED"`.
pub fn proxy_fps_from_label(label: &str) -> Option<f32> {
    let open = label.find('(')?;
    let close = label[open..].find(')')? + open;
    let (_, rate) = label[open + 1..close].split_once('p')?;
    rate.trim()
        .parse::<f32>()
        .ok()
        .filter(|fps| fps.is_finite() && *fps > 0.0)
}

/// Frame rate statistics of one stream worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FpsSnapshot {
    /// Rate derived from the interval between the last two frames.
    pub current: f32,

    /// Mean rate since the first delivered frame.
    /// `None` until the first frame has been delivered.
    pub average: Option<f32>,

    /// Rate the worker is pacing towards.
    pub expected: f32,
}

/// Configuration for the whole bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Host update cadence in milliseconds.
    pub tick_interval_ms: u64,

    /// Discovery loop settings.
    pub discovery: DiscoverySettings,

    /// Stream worker settings.
    pub stream: StreamSettings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            discovery: DiscoverySettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Host update cadence.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Discovery loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Time between two polls in milliseconds (default: 2000).
    pub poll_interval_ms: u64,

    /// Maximum time a single poll may block in milliseconds (default: 100).
    pub poll_timeout_ms: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            poll_timeout_ms: 100,
        }
    }
}

impl DiscoverySettings {
    /// Time between two polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Maximum time a single poll may block.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Stream worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Pacing target of a live worker before its first frame (default: 120).
    pub initial_fps: f32,

    /// Seconds worth of missed frames before a live worker gives up (default: 5).
    pub no_frame_timeout_secs: f32,

    /// Timeout passed to each capture call in milliseconds (default: 0).
    pub capture_timeout_ms: u64,

    /// Synthetic test pattern settings.
    pub proxy: ProxySettings,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            initial_fps: 120.0,
            no_frame_timeout_secs: 5.0,
            capture_timeout_ms: 0,
            proxy: ProxySettings::default(),
        }
    }
}

impl StreamSettings {
    /// Timeout passed to each capture call.
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    /// Number of consecutive empty captures tolerated at `fps`.
    pub fn missed_frame_budget(&self, fps: f32) -> u32 {
        let budget = (self.no_frame_timeout_secs * fps).ceil();
        if budget.is_finite() && budget >= 1.0 {
            budget as u32
        } else {
            1
        }
    }
}

/// Synthetic test pattern configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Full resolution width.
    pub width: u32,

    /// Full resolution height.
    pub height: u32,

    /// Divisor applied to both dimensions in low bandwidth mode.
    pub low_bandwidth_divisor: u32,

    /// Fill colour, RGBA.
    pub rgba: [u8; 4],
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            low_bandwidth_divisor: 3,
            rgba: [255, 0, 0, 255],
        }
    }
}

impl ProxySettings {
    /// Frame dimensions for the given bandwidth mode.
    pub fn dimensions(&self, low_bandwidth: bool) -> (u32, u32) {
        let divisor = if low_bandwidth {
            self.low_bandwidth_divisor.max(1)
        } else {
            1
        };
        ((self.width / divisor).max(1), (self.height / divisor).max(1))
    }
}
