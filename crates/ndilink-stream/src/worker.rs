//! Stream worker and its pacing loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, trace, warn};

use ndilink_discovery::SourceSnapshot;
use ndilink_ipc::{FpsSnapshot, StreamSettings};
use ndilink_sdk::{CaptureOutcome, NdiRuntime, Receiver, ReceiverSettings};

use crate::error::StreamError;
use crate::frame::Frame;
use crate::pixel::bgra_to_rgba_in_place;
use crate::sink::{TextureProvider, TextureSink};
use crate::stats::FrameStats;
use crate::StreamResult;

/// Longest uninterrupted sleep while waiting for the next frame slot.
const PACING_SLICE: Duration = Duration::from_millis(5);

/// What one production attempt yielded.
#[derive(Debug)]
pub enum Produced {
    /// A frame ready for the sink, with the rate declared by its sender.
    Video { frame: Frame, fps: Option<f32> },

    /// Nothing arrived.
    Missed,

    /// Something other than video arrived.
    Other,
}

/// Source of frames driven by the pacing loop.
pub trait FrameProducer: Send {
    /// Attempt to produce one frame.
    fn produce(&mut self, sequence: u64) -> Produced;
}

/// Pulls frames from a connected network receiver.
pub struct LiveProducer {
    receiver: Box<dyn Receiver>,
    capture_timeout: Duration,
}

impl LiveProducer {
    /// Wrap an already connected receiver.
    pub fn new(receiver: Box<dyn Receiver>, capture_timeout: Duration) -> Self {
        Self {
            receiver,
            capture_timeout,
        }
    }
}

impl FrameProducer for LiveProducer {
    fn produce(&mut self, sequence: u64) -> Produced {
        match self.receiver.capture(self.capture_timeout) {
            CaptureOutcome::Video(mut video) => {
                if !video.is_valid() {
                    warn!(
                        width = video.width,
                        height = video.height,
                        len = video.data.len(),
                        "Dropping video frame with mismatched buffer"
                    );
                    return Produced::Other;
                }
                bgra_to_rgba_in_place(&mut video.data);
                let fps = video.frame_rate.as_fps();
                let frame = Frame::new(video.data.freeze(), video.width, video.height, sequence);
                Produced::Video { frame, fps }
            }
            CaptureOutcome::None => Produced::Missed,
            CaptureOutcome::Other => Produced::Other,
        }
    }
}

/// Emits the same solid-colour frame forever.
pub struct ProxyProducer {
    frame: Frame,
}

impl ProxyProducer {
    /// Create a producer for a `width` x `height` frame of `rgba`.
    pub fn new(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            frame: Frame::solid(width, height, rgba),
        }
    }
}

impl FrameProducer for ProxyProducer {
    fn produce(&mut self, sequence: u64) -> Produced {
        Produced::Video {
            frame: self.frame.with_sequence(sequence),
            fps: None,
        }
    }
}

struct WorkerShared {
    running: AtomicBool,
    stats: FrameStats,
}

/// A background thread feeding one texture sink.
pub struct StreamWorker {
    id: String,
    source: String,
    low_bandwidth: bool,
    shared: Arc<WorkerShared>,
    capture_thread: Option<JoinHandle<()>>,
}

impl StreamWorker {
    /// Connect to `source` and start pushing its frames into the sink `id`.
    #[instrument(name = "stream_live", skip_all, fields(id = %id, source = %source))]
    pub fn live(
        id: &str,
        source: &str,
        low_bandwidth: bool,
        snapshot: &SourceSnapshot,
        runtime: &dyn NdiRuntime,
        textures: &dyn TextureProvider,
        settings: &StreamSettings,
    ) -> StreamResult<Self> {
        let descriptor = snapshot.find(source).ok_or_else(|| {
            warn!("Source is not in the discovery snapshot");
            StreamError::SourceNotFound(source.to_string())
        })?;

        let mut receiver = runtime
            .create_receiver(ReceiverSettings::for_low_bandwidth(low_bandwidth))
            .map_err(StreamError::Receiver)?;
        receiver
            .connect(&descriptor)
            .map_err(StreamError::Connect)?;

        let producer = LiveProducer::new(receiver, settings.capture_timeout());
        Self::spawn(
            id,
            source,
            low_bandwidth,
            Box::new(producer),
            textures.create_sink(id),
            settings,
            settings.initial_fps,
        )
    }

    /// Start pushing the synthetic test pattern into the sink `id` at `fps`.
    #[instrument(name = "stream_proxy", skip_all, fields(id = %id, fps = fps))]
    pub fn proxy(
        id: &str,
        source: &str,
        fps: f32,
        low_bandwidth: bool,
        textures: &dyn TextureProvider,
        settings: &StreamSettings,
    ) -> StreamResult<Self> {
        let (width, height) = settings.proxy.dimensions(low_bandwidth);
        let producer = ProxyProducer::new(width, height, settings.proxy.rgba);
        Self::spawn(
            id,
            source,
            low_bandwidth,
            Box::new(producer),
            textures.create_sink(id),
            settings,
            fps,
        )
    }

    fn spawn(
        id: &str,
        source: &str,
        low_bandwidth: bool,
        producer: Box<dyn FrameProducer>,
        sink: Box<dyn TextureSink>,
        settings: &StreamSettings,
        fps: f32,
    ) -> StreamResult<Self> {
        let shared = Arc::new(WorkerShared {
            running: AtomicBool::new(true),
            stats: FrameStats::new(fps),
        });

        let loop_shared = Arc::clone(&shared);
        let loop_settings = settings.clone();
        let loop_id = id.to_string();
        let handle = thread::Builder::new()
            .name(format!("ndilink-stream-{id}"))
            .spawn(move || {
                capture_loop(&loop_id, producer, sink, &loop_shared, &loop_settings, fps)
            })?;

        info!(id, source, low_bandwidth, "Stream worker started");

        Ok(Self {
            id: id.to_string(),
            source: source.to_string(),
            low_bandwidth,
            shared,
            capture_thread: Some(handle),
        })
    }

    /// Texture id this worker feeds.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source this worker reads from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the low bandwidth profile is in use.
    pub fn low_bandwidth(&self) -> bool {
        self.low_bandwidth
    }

    /// False once the worker stopped itself or was destroyed.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Frame rate statistics.
    pub fn fps(&self) -> FpsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Number of frames pushed to the sink.
    pub fn frames_delivered(&self) -> u64 {
        self.shared.stats.frames()
    }

    /// Stop the loop and join the thread. The receive connection is released
    /// when the thread returns. Safe to call repeatedly.
    #[instrument(name = "stream_destroy", skip(self), fields(id = %self.id))]
    pub fn destroy(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.capture_thread.take() {
            let _ = handle.join();
            info!(frames = self.frames_delivered(), "Stream worker destroyed");
        }
    }
}

impl Drop for StreamWorker {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn pacing_period(fps: f32) -> Duration {
    Duration::try_from_secs_f32(1.0 / fps).unwrap_or(Duration::ZERO)
}

/// Sleep in slices until `deadline`. Returns false if `running` was cleared.
fn wait_until(deadline: Instant, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(PACING_SLICE));
    }
}

fn capture_loop(
    id: &str,
    mut producer: Box<dyn FrameProducer>,
    mut sink: Box<dyn TextureSink>,
    shared: &WorkerShared,
    settings: &StreamSettings,
    mut fps: f32,
) {
    debug!(id, fps, "Capture loop started");

    let mut budget = settings.missed_frame_budget(fps);
    let mut remaining = budget;
    let mut last_read = Instant::now();
    let mut sequence = 0u64;

    while wait_until(last_read + pacing_period(fps), &shared.running) {
        last_read = Instant::now();

        match producer.produce(sequence) {
            Produced::Video {
                frame,
                fps: declared,
            } => {
                if let Some(declared) = declared.filter(|f| f.is_finite() && *f > 0.0) {
                    if declared != fps {
                        debug!(id, from = fps, to = declared, "Pacing target changed");
                        fps = declared;
                        budget = settings.missed_frame_budget(fps);
                        shared.stats.set_expected(fps);
                    }
                }

                sink.push_frame(&frame);
                shared.stats.record_frame(Instant::now());
                remaining = budget;

                if sequence == 0 {
                    debug!(id, width = frame.width, height = frame.height, "First frame");
                } else if sequence % 100 == 0 {
                    trace!(id, sequence, "Frame pushed");
                }
                sequence += 1;
            }
            Produced::Missed => {
                remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    info!(id, "No frame received in time, stopping stream");
                    shared.running.store(false, Ordering::SeqCst);
                }
            }
            Produced::Other => remaining = budget,
        }
    }

    debug!(id, frames = sequence, "Capture loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use crate::sink::MemoryTextures;
    use ndilink_sdk::sim::{SimSource, SimulatedNetwork};
    use ndilink_sdk::{FrameRate, SourceDescriptor};

    fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn small_source() -> SimSource {
        SimSource {
            width: 8,
            height: 4,
            frame_rate: FrameRate::new(30, 1),
            bgra: [0, 0, 255, 255],
        }
    }

    fn network_with(name: &str) -> (SimulatedNetwork, SourceSnapshot) {
        let net = SimulatedNetwork::new();
        net.initialize().unwrap();
        net.announce(name, small_source());
        let snapshot = SourceSnapshot::new();
        snapshot.replace(vec![SourceDescriptor::new(name)]);
        (net, snapshot)
    }

    struct ScriptedProducer {
        script: VecDeque<Produced>,
        calls: Arc<AtomicUsize>,
    }

    impl FrameProducer for ScriptedProducer {
        fn produce(&mut self, _sequence: u64) -> Produced {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script.pop_front().unwrap_or(Produced::Missed)
        }
    }

    #[test]
    fn test_proxy_pushes_solid_frames() {
        let textures = MemoryTextures::new();
        let settings = StreamSettings::default();

        let mut worker =
            StreamWorker::proxy("tex1", "PROXY", 200.0, true, &textures, &settings).unwrap();

        assert!(wait_for(Duration::from_secs(5), || textures.push_count("tex1") >= 3));
        let frame = textures.last_frame("tex1").unwrap();
        assert_eq!((frame.width, frame.height, frame.channels), (640, 360, 4));
        assert_eq!(frame.pixel(0, 0), Some([255, 0, 0, 255]));
        assert!(worker.is_running());
        assert_eq!(worker.fps().expected, 200.0);

        worker.destroy();
        assert!(!worker.is_running());
    }

    #[test]
    fn test_live_converts_to_rgba_and_adopts_declared_rate() {
        let (net, snapshot) = network_with("CAM1");
        let textures = MemoryTextures::new();
        let settings = StreamSettings::default();

        let mut worker =
            StreamWorker::live("tex1", "CAM1", false, &snapshot, &net, &textures, &settings)
                .unwrap();

        assert!(wait_for(Duration::from_secs(5), || worker.frames_delivered() >= 2));
        let frame = textures.last_frame("tex1").unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
        assert_eq!(frame.pixel(7, 3), Some([255, 0, 0, 255]));

        let fps = worker.fps();
        assert_eq!(fps.expected, 30.0);
        assert!(fps.average.is_some());

        worker.destroy();
        assert_eq!(net.open_receivers(), 0);
    }

    #[test]
    fn test_live_stops_itself_when_source_disappears() {
        let (net, snapshot) = network_with("CAM1");
        let textures = MemoryTextures::new();
        let settings = StreamSettings {
            no_frame_timeout_secs: 0.1,
            ..StreamSettings::default()
        };

        let mut worker =
            StreamWorker::live("tex1", "CAM1", true, &snapshot, &net, &textures, &settings)
                .unwrap();
        assert!(wait_for(Duration::from_secs(5), || worker.frames_delivered() >= 1));

        net.withdraw("CAM1");
        assert!(wait_for(Duration::from_secs(5), || !worker.is_running()));

        worker.destroy();
        worker.destroy();
        assert_eq!(net.open_receivers(), 0);
    }

    #[test]
    fn test_live_requires_source_in_snapshot() {
        let (net, _) = network_with("CAM1");
        let textures = MemoryTextures::new();

        let result = StreamWorker::live(
            "tex1",
            "CAM1",
            false,
            &SourceSnapshot::new(),
            &net,
            &textures,
            &StreamSettings::default(),
        );

        assert!(matches!(result, Err(StreamError::SourceNotFound(name)) if name == "CAM1"));
        assert_eq!(net.open_receivers(), 0);
    }

    #[test]
    fn test_live_fails_without_library() {
        let (net, snapshot) = network_with("CAM1");
        net.shutdown();
        let textures = MemoryTextures::new();

        let result = StreamWorker::live(
            "tex1",
            "CAM1",
            false,
            &snapshot,
            &net,
            &textures,
            &StreamSettings::default(),
        );
        assert!(matches!(result, Err(StreamError::Receiver(_))));
    }

    #[test]
    fn test_other_frames_reset_missed_countdown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let producer = ScriptedProducer {
            script: VecDeque::from(vec![
                Produced::Missed,
                Produced::Other,
                Produced::Missed,
                Produced::Other,
                Produced::Missed,
            ]),
            calls: Arc::clone(&calls),
        };
        // Two misses allowed at 8 fps.
        let settings = StreamSettings {
            no_frame_timeout_secs: 0.25,
            ..StreamSettings::default()
        };
        let textures = MemoryTextures::new();

        let mut worker = StreamWorker::spawn(
            "tex1",
            "SCRIPT",
            false,
            Box::new(producer),
            textures.create_sink("tex1"),
            &settings,
            8.0,
        )
        .unwrap();

        assert!(wait_for(Duration::from_secs(5), || !worker.is_running()));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(worker.frames_delivered(), 0);
        assert_eq!(worker.fps().average, None);
        worker.destroy();
    }

    #[test]
    fn test_video_frames_refill_budget_at_declared_rate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let video = |fps| Produced::Video {
            frame: Frame::solid(1, 1, [0, 255, 0, 255]),
            fps,
        };
        let producer = ScriptedProducer {
            script: VecDeque::from(vec![
                video(Some(16.0)),
                Produced::Missed,
                Produced::Missed,
                Produced::Missed,
                video(Some(f32::NAN)),
            ]),
            calls: Arc::clone(&calls),
        };
        // Two misses allowed at 8 fps, four at 16 fps.
        let settings = StreamSettings {
            no_frame_timeout_secs: 0.25,
            ..StreamSettings::default()
        };
        let textures = MemoryTextures::new();

        let mut worker = StreamWorker::spawn(
            "tex1",
            "SCRIPT",
            false,
            Box::new(producer),
            textures.create_sink("tex1"),
            &settings,
            8.0,
        )
        .unwrap();

        assert!(wait_for(Duration::from_secs(5), || !worker.is_running()));
        assert_eq!(calls.load(Ordering::SeqCst), 9);
        assert_eq!(worker.frames_delivered(), 2);
        assert_eq!(worker.fps().expected, 16.0);
        assert_eq!(textures.push_count("tex1"), 2);
        worker.destroy();
    }

    #[test]
    fn test_pacing_period() {
        assert_eq!(pacing_period(4.0), Duration::from_millis(250));
        assert_eq!(pacing_period(0.0), Duration::ZERO);
        assert_eq!(pacing_period(-1.0), Duration::ZERO);
    }
}
