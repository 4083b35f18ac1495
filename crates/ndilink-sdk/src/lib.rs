//! Discovery and receive contract for the network video library.
//!
//! The vendor library itself is an external collaborator. This crate pins
//! down the narrow surface ndilink relies on (runtime, finder, receiver) and
//! ships [`sim::SimulatedNetwork`], an in-process implementation used by the
//! headless host and the test suites.

mod error;
mod frame;
pub mod sim;
mod source;

pub use error::SdkError;
pub use frame::{CaptureOutcome, FrameRate, VideoFrame, BGRA_CHANNELS};
pub use source::{Bandwidth, ColorFormat, ReceiverSettings, SourceDescriptor};

use std::time::Duration;

/// Result type for library operations.
pub type SdkResult<T> = Result<T, SdkError>;

/// Library entry points shared by discovery and receive.
pub trait NdiRuntime: Send + Sync {
    /// Bring the library up. Calling it again once initialized is a no-op.
    fn initialize(&self) -> SdkResult<()>;

    /// Create a source finder. Dropping it releases the finder.
    fn create_finder(&self) -> SdkResult<Box<dyn Finder>>;

    /// Create a receiver. Dropping it releases the receiver.
    fn create_receiver(&self, settings: ReceiverSettings) -> SdkResult<Box<dyn Receiver>>;

    /// Tear the library down.
    fn shutdown(&self);
}

/// Source discovery handle.
pub trait Finder: Send {
    /// Sources currently visible, waiting up to `timeout` for the list to settle.
    fn current_sources(&mut self, timeout: Duration) -> Vec<SourceDescriptor>;
}

/// Receive connection to one source.
pub trait Receiver: Send {
    /// Connect to `source`.
    fn connect(&mut self, source: &SourceDescriptor) -> SdkResult<()>;

    /// Capture at most one frame, waiting up to `timeout`.
    fn capture(&mut self, timeout: Duration) -> CaptureOutcome;
}
