//! Typed host<->bridge messages for ndilink.
//!
//! This crate defines the message types and the in-process event bus used
//! between the discovery service, the stream registry, the binding store and
//! whatever presentation layer the host puts on top of them.

mod bus;
mod commands;
mod events;
mod state;
mod types;

pub use bus::{EventBus, Subscription};
pub use commands::BridgeCommand;
pub use events::BridgeEvent;
pub use state::ActivityIndicator;
pub use types::{
    proxy_fps_from_label, BridgeConfig, DiscoverySettings, FpsSnapshot, ProxySettings,
    StreamSettings, NONE_SOURCE, PROXY_SOURCE,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (host → bridge).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<BridgeCommand>, Receiver<BridgeCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Returns true if `source` is one of the reserved catalog entries.
pub fn is_sentinel(source: &str) -> bool {
    source == NONE_SOURCE || source == PROXY_SOURCE
}
