//! Stream workers for ndilink.
//!
//! A [`StreamWorker`] owns one background thread that paces frame production
//! and pushes every produced frame into a named [`TextureSink`]. Live workers
//! pull frames from a network receiver; proxy workers emit a synthetic
//! solid-colour pattern.

mod error;
mod frame;
mod pixel;
mod sink;
mod stats;
mod worker;

pub use error::StreamError;
pub use frame::{Frame, RGBA_CHANNELS};
pub use pixel::bgra_to_rgba_in_place;
pub use sink::{MemoryTextures, TextureProvider, TextureSink};
pub use stats::FrameStats;
pub use worker::{FrameProducer, LiveProducer, Produced, ProxyProducer, StreamWorker};

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;
