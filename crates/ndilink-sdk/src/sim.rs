//! In-process simulated network.
//!
//! Sources are announced and withdrawn programmatically. Receivers connected
//! to an announced source get a solid-colour BGRA frame on every capture;
//! once the source is withdrawn they only ever see [`CaptureOutcome::None`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{
    Bandwidth, CaptureOutcome, Finder, FrameRate, NdiRuntime, Receiver, ReceiverSettings,
    SdkError, SdkResult, SourceDescriptor, VideoFrame,
};

/// Divisor applied to both dimensions of `Bandwidth::Lowest` streams.
pub const PREVIEW_DIVISOR: u32 = 4;

/// A simulated sender.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSource {
    /// Native width in pixels.
    pub width: u32,

    /// Native height in pixels.
    pub height: u32,

    /// Declared frame rate.
    pub frame_rate: FrameRate,

    /// Fill colour in BGRA order.
    pub bgra: [u8; 4],
}

impl Default for SimSource {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: FrameRate::new(30, 1),
            bgra: [0, 0, 255, 255],
        }
    }
}

impl SimSource {
    /// Dimensions delivered for the given profile.
    pub fn dimensions(&self, bandwidth: Bandwidth) -> (u32, u32) {
        match bandwidth {
            Bandwidth::Highest => (self.width, self.height),
            Bandwidth::Lowest => (
                (self.width / PREVIEW_DIVISOR).max(1),
                (self.height / PREVIEW_DIVISOR).max(1),
            ),
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    sources: RwLock<Vec<(String, SimSource)>>,
    unavailable: AtomicBool,
    initialized: AtomicBool,
    open_finders: AtomicUsize,
    open_receivers: AtomicUsize,
}

impl SimState {
    fn lookup(&self, name: &str) -> Option<SimSource> {
        self.sources
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, source)| source.clone())
    }
}

/// Simulated network implementing [`NdiRuntime`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedNetwork {
    state: Arc<SimState>,
}

impl SimulatedNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a source visible, replacing any source with the same name.
    pub fn announce(&self, name: impl Into<String>, source: SimSource) {
        let name = name.into();
        let mut sources = self.state.sources.write();
        match sources.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = source,
            None => {
                debug!(source = %name, "Simulated source announced");
                sources.push((name, source));
            }
        }
    }

    /// Remove a source. Connected receivers stop getting frames.
    pub fn withdraw(&self, name: &str) {
        self.state.sources.write().retain(|(n, _)| n != name);
        debug!(source = %name, "Simulated source withdrawn");
    }

    /// Make `initialize` fail, as if the library were missing.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Whether the library is currently initialized.
    pub fn is_initialized(&self) -> bool {
        self.state.initialized.load(Ordering::SeqCst)
    }

    /// Number of finders not yet dropped.
    pub fn open_finders(&self) -> usize {
        self.state.open_finders.load(Ordering::SeqCst)
    }

    /// Number of receivers not yet dropped.
    pub fn open_receivers(&self) -> usize {
        self.state.open_receivers.load(Ordering::SeqCst)
    }

    fn ensure_initialized(&self) -> SdkResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(SdkError::NotInitialized)
        }
    }
}

impl NdiRuntime for SimulatedNetwork {
    fn initialize(&self) -> SdkResult<()> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(SdkError::Unavailable(
                "simulated library marked unavailable".to_string(),
            ));
        }
        if !self.state.initialized.swap(true, Ordering::SeqCst) {
            info!("Simulated network initialized");
        }
        Ok(())
    }

    fn create_finder(&self) -> SdkResult<Box<dyn Finder>> {
        self.ensure_initialized()?;
        self.state.open_finders.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimFinder {
            state: Arc::clone(&self.state),
        }))
    }

    fn create_receiver(&self, settings: ReceiverSettings) -> SdkResult<Box<dyn Receiver>> {
        self.ensure_initialized()?;
        self.state.open_receivers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimReceiver {
            state: Arc::clone(&self.state),
            settings,
            connected: None,
        }))
    }

    fn shutdown(&self) {
        if self.state.initialized.swap(false, Ordering::SeqCst) {
            info!("Simulated network shut down");
        }
    }
}

struct SimFinder {
    state: Arc<SimState>,
}

impl Finder for SimFinder {
    fn current_sources(&mut self, _timeout: Duration) -> Vec<SourceDescriptor> {
        self.state
            .sources
            .read()
            .iter()
            .map(|(name, _)| SourceDescriptor {
                name: name.clone(),
                url_address: Some(format!("sim://{name}")),
            })
            .collect()
    }
}

impl Drop for SimFinder {
    fn drop(&mut self) {
        self.state.open_finders.fetch_sub(1, Ordering::SeqCst);
    }
}

struct SimReceiver {
    state: Arc<SimState>,
    settings: ReceiverSettings,
    connected: Option<String>,
}

impl Receiver for SimReceiver {
    fn connect(&mut self, source: &SourceDescriptor) -> SdkResult<()> {
        if self.state.lookup(&source.name).is_none() {
            return Err(SdkError::ConnectFailed(source.name.clone()));
        }
        self.connected = Some(source.name.clone());
        Ok(())
    }

    fn capture(&mut self, timeout: Duration) -> CaptureOutcome {
        let source = self
            .connected
            .as_deref()
            .and_then(|name| self.state.lookup(name));

        let Some(source) = source else {
            if !timeout.is_zero() {
                thread::sleep(timeout);
            }
            return CaptureOutcome::None;
        };

        let (width, height) = source.dimensions(self.settings.bandwidth);
        let pixels = width as usize * height as usize;
        let mut data = BytesMut::with_capacity(pixels * source.bgra.len());
        for _ in 0..pixels {
            data.extend_from_slice(&source.bgra);
        }

        CaptureOutcome::Video(VideoFrame {
            width,
            height,
            frame_rate: source.frame_rate,
            data,
        })
    }
}

impl Drop for SimReceiver {
    fn drop(&mut self) {
        self.state.open_receivers.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_source() -> SimSource {
        SimSource {
            width: 8,
            height: 4,
            ..SimSource::default()
        }
    }

    #[test]
    fn test_unavailable_library_fails_initialize() {
        let net = SimulatedNetwork::new();
        net.set_unavailable(true);
        assert!(matches!(net.initialize(), Err(SdkError::Unavailable(_))));
        assert!(matches!(
            net.create_finder().err(),
            Some(SdkError::NotInitialized)
        ));
    }

    #[test]
    fn test_finder_lists_announced_sources_in_order() {
        let net = SimulatedNetwork::new();
        net.initialize().unwrap();
        net.announce("CAM2", small_source());
        net.announce("CAM1", small_source());

        let mut finder = net.create_finder().unwrap();
        let names: Vec<_> = finder
            .current_sources(Duration::ZERO)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["CAM2", "CAM1"]);

        net.withdraw("CAM2");
        assert_eq!(finder.current_sources(Duration::ZERO).len(), 1);

        assert_eq!(net.open_finders(), 1);
        drop(finder);
        assert_eq!(net.open_finders(), 0);
    }

    #[test]
    fn test_receiver_delivers_until_withdrawn() {
        let net = SimulatedNetwork::new();
        net.initialize().unwrap();
        net.announce("CAM1", small_source());

        let mut receiver = net
            .create_receiver(ReceiverSettings::for_low_bandwidth(false))
            .unwrap();
        receiver.connect(&SourceDescriptor::new("CAM1")).unwrap();

        match receiver.capture(Duration::ZERO) {
            CaptureOutcome::Video(frame) => {
                assert_eq!((frame.width, frame.height), (8, 4));
                assert!(frame.is_valid());
                assert_eq!(&frame.data[..4], &[0, 0, 255, 255]);
            }
            other => panic!("expected video, got {other:?}"),
        }

        net.withdraw("CAM1");
        assert!(matches!(
            receiver.capture(Duration::ZERO),
            CaptureOutcome::None
        ));
    }

    #[test]
    fn test_low_bandwidth_receiver_gets_preview_size() {
        let net = SimulatedNetwork::new();
        net.initialize().unwrap();
        net.announce("CAM1", SimSource::default());

        let mut receiver = net
            .create_receiver(ReceiverSettings::for_low_bandwidth(true))
            .unwrap();
        receiver.connect(&SourceDescriptor::new("CAM1")).unwrap();

        let CaptureOutcome::Video(frame) = receiver.capture(Duration::ZERO) else {
            panic!("expected video");
        };
        assert_eq!((frame.width, frame.height), (320, 180));
    }

    #[test]
    fn test_connect_to_unknown_source_fails() {
        let net = SimulatedNetwork::new();
        net.initialize().unwrap();
        let mut receiver = net.create_receiver(ReceiverSettings::default()).unwrap();
        assert!(matches!(
            receiver.connect(&SourceDescriptor::new("GHOST")),
            Err(SdkError::ConnectFailed(_))
        ));
        assert_eq!(net.open_receivers(), 1);
        drop(receiver);
        assert_eq!(net.open_receivers(), 0);
    }
}
