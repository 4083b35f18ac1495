//! Running stream workers, keyed by texture id.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use ndilink_discovery::SourceSnapshot;
use ndilink_ipc::{
    proxy_fps_from_label, BridgeEvent, EventBus, FpsSnapshot, StreamSettings, NONE_SOURCE,
    PROXY_SOURCE,
};
use ndilink_sdk::NdiRuntime;
use ndilink_stream::{StreamWorker, TextureProvider};

use crate::error::RegistryError;
use crate::RegistryResult;

/// Rate used when a proxy label carries no usable rate.
const DEFAULT_PROXY_FPS: f32 = 30.0;

/// Owns every running [`StreamWorker`]. At most one worker per texture id.
pub struct StreamRegistry {
    runtime: Arc<dyn NdiRuntime>,
    textures: Arc<dyn TextureProvider>,
    snapshot: SourceSnapshot,
    bus: Arc<EventBus>,
    settings: StreamSettings,
    workers: Vec<StreamWorker>,
}

impl StreamRegistry {
    /// Create an empty registry.
    pub fn new(
        runtime: Arc<dyn NdiRuntime>,
        textures: Arc<dyn TextureProvider>,
        snapshot: SourceSnapshot,
        bus: Arc<EventBus>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            runtime,
            textures,
            snapshot,
            bus,
            settings,
            workers: Vec::new(),
        }
    }

    /// Start a worker feeding `id` from `source`.
    #[instrument(name = "registry_try_add", skip(self))]
    pub fn try_add(&mut self, id: &str, source: &str, low_bandwidth: bool) -> RegistryResult<()> {
        if self.contains(id) {
            warn!("There's already a stream running for {}", id);
            return Err(RegistryError::AlreadyStreaming(id.to_string()));
        }

        if source == NONE_SOURCE {
            warn!("Won't create stream without a source");
            return Err(RegistryError::NoSource(id.to_string()));
        }

        let worker = if source == PROXY_SOURCE {
            let fps = proxy_fps_from_label(source).unwrap_or(DEFAULT_PROXY_FPS);
            StreamWorker::proxy(
                id,
                source,
                fps,
                low_bandwidth,
                self.textures.as_ref(),
                &self.settings,
            )
        } else {
            StreamWorker::live(
                id,
                source,
                low_bandwidth,
                &self.snapshot,
                self.runtime.as_ref(),
                self.textures.as_ref(),
                &self.settings,
            )
        };

        let worker = worker.map_err(|e| {
            error!("Stream start failed: {}", e);
            RegistryError::Worker(e)
        })?;

        self.workers.push(worker);
        self.bus.publish(BridgeEvent::StreamStarted { id: id.to_string() });
        Ok(())
    }

    /// Stop the worker of `id`, if any.
    #[instrument(name = "registry_stop", skip(self))]
    pub fn stop(&mut self, id: &str) {
        let Some(index) = self.workers.iter().position(|w| w.id() == id) else {
            return;
        };

        let mut worker = self.workers.remove(index);
        worker.destroy();
        self.bus.publish(BridgeEvent::StreamStopped { id: id.to_string() });
    }

    /// Stop every worker.
    pub fn stop_all(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        info!(count = self.workers.len(), "Stopping all streams");

        for mut worker in self.workers.drain(..) {
            worker.destroy();
            self.bus.publish(BridgeEvent::StreamStopped {
                id: worker.id().to_string(),
            });
        }
    }

    /// Reap workers that stopped on their own. Returns their ids.
    pub fn sweep(&mut self) -> Vec<String> {
        if self.workers.iter().all(StreamWorker::is_running) {
            return Vec::new();
        }

        let (stopped, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.workers)
            .into_iter()
            .partition(|w| !w.is_running());
        self.workers = running;

        stopped
            .into_iter()
            .map(|mut worker| {
                worker.destroy();
                let id = worker.id().to_string();
                info!(id = %id, source = worker.source(), "Stream stopped unexpectedly");
                self.bus
                    .publish(BridgeEvent::StreamStoppedUnexpectedly { id: id.clone() });
                id
            })
            .collect()
    }

    /// Number of running workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns true if no worker is running.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Returns true if a worker feeds `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.workers.iter().any(|w| w.id() == id)
    }

    /// Texture ids of every worker, in start order.
    pub fn ids(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.id().to_string()).collect()
    }

    /// Frame rate statistics of the worker feeding `id`.
    pub fn fps(&self, id: &str) -> Option<FpsSnapshot> {
        self.worker(id).map(StreamWorker::fps)
    }

    /// The worker feeding `id`.
    pub fn worker(&self, id: &str) -> Option<&StreamWorker> {
        self.workers.iter().find(|w| w.id() == id)
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    use ndilink_ipc::{ProxySettings, Subscription};
    use ndilink_sdk::sim::{SimSource, SimulatedNetwork};
    use ndilink_sdk::SourceDescriptor;
    use ndilink_stream::MemoryTextures;
    use proptest::prelude::*;

    struct Fixture {
        net: SimulatedNetwork,
        snapshot: SourceSnapshot,
        textures: MemoryTextures,
        sub: Subscription,
        registry: StreamRegistry,
    }

    fn fixture(no_frame_timeout_secs: f32) -> Fixture {
        let net = SimulatedNetwork::new();
        net.initialize().unwrap();
        let snapshot = SourceSnapshot::new();
        let textures = MemoryTextures::new();
        let bus = Arc::new(EventBus::new());
        let sub = bus.subscribe();
        let settings = StreamSettings {
            no_frame_timeout_secs,
            proxy: ProxySettings {
                width: 16,
                height: 9,
                ..ProxySettings::default()
            },
            ..StreamSettings::default()
        };
        let registry = StreamRegistry::new(
            Arc::new(net.clone()),
            Arc::new(textures.clone()),
            snapshot.clone(),
            bus,
            settings,
        );
        Fixture {
            net,
            snapshot,
            textures,
            sub,
            registry,
        }
    }

    fn announce(f: &Fixture, name: &str) {
        f.net.announce(
            name,
            SimSource {
                width: 8,
                height: 4,
                ..SimSource::default()
            },
        );
        f.snapshot.replace(vec![SourceDescriptor::new(name)]);
    }

    #[test]
    fn test_proxy_start_stop_all_restart() {
        let mut f = fixture(5.0);

        f.registry.try_add("tex1", PROXY_SOURCE, false).unwrap();
        assert!(f.registry.contains("tex1"));
        assert_eq!(f.registry.fps("tex1").map(|s| s.expected), Some(30.0));

        f.registry.stop_all();
        assert!(f.registry.is_empty());

        f.registry.try_add("tex1", PROXY_SOURCE, false).unwrap();
        assert_eq!(f.registry.ids(), vec!["tex1"]);

        assert_eq!(
            f.sub.drain(),
            vec![
                BridgeEvent::StreamStarted { id: "tex1".into() },
                BridgeEvent::StreamStopped { id: "tex1".into() },
                BridgeEvent::StreamStarted { id: "tex1".into() },
            ]
        );
    }

    #[test]
    fn test_duplicate_and_none_are_rejected() {
        let mut f = fixture(5.0);
        f.registry.try_add("tex1", PROXY_SOURCE, true).unwrap();

        assert!(matches!(
            f.registry.try_add("tex1", PROXY_SOURCE, true),
            Err(RegistryError::AlreadyStreaming(_))
        ));
        assert!(matches!(
            f.registry.try_add("tex2", NONE_SOURCE, false),
            Err(RegistryError::NoSource(_))
        ));
        assert_eq!(f.registry.len(), 1);
    }

    #[test]
    fn test_unknown_live_source_retains_nothing() {
        let mut f = fixture(5.0);
        assert!(matches!(
            f.registry.try_add("tex1", "CAM1", false),
            Err(RegistryError::Worker(_))
        ));
        assert!(f.registry.is_empty());
        assert!(f.sub.drain().is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut f = fixture(5.0);
        f.registry.try_add("tex1", PROXY_SOURCE, false).unwrap();
        f.sub.drain();

        f.registry.stop("tex1");
        f.registry.stop("tex1");
        assert_eq!(
            f.sub.drain(),
            vec![BridgeEvent::StreamStopped { id: "tex1".into() }]
        );
    }

    #[test]
    fn test_live_stream_feeds_texture() {
        let mut f = fixture(5.0);
        announce(&f, "CAM1");

        f.registry.try_add("tex1", "CAM1", false).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while f.textures.push_count("tex1") == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(f.textures.push_count("tex1") > 0);

        f.registry.stop("tex1");
        assert_eq!(f.net.open_receivers(), 0);
    }

    #[test]
    fn test_sweep_reaps_timed_out_worker_once() {
        let mut f = fixture(0.05);
        announce(&f, "CAM1");
        f.registry.try_add("tex1", "CAM1", false).unwrap();
        f.registry.try_add("tex2", PROXY_SOURCE, false).unwrap();
        f.sub.drain();

        f.net.withdraw("CAM1");
        let deadline = Instant::now() + Duration::from_secs(5);
        while f.registry.worker("tex1").is_some_and(StreamWorker::is_running)
            && Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(f.registry.sweep(), vec!["tex1"]);
        assert!(f.registry.sweep().is_empty());
        assert_eq!(f.registry.ids(), vec!["tex2"]);
        assert_eq!(
            f.sub.drain(),
            vec![BridgeEvent::StreamStoppedUnexpectedly { id: "tex1".into() }]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn test_none_never_creates_worker(id in "[a-z]{1,8}", low_bandwidth in any::<bool>()) {
            let mut f = fixture(5.0);
            prop_assert!(f.registry.try_add(&id, NONE_SOURCE, low_bandwidth).is_err());
            prop_assert!(f.registry.is_empty());
        }

        #[test]
        fn test_repeated_adds_keep_one_worker(id in "[a-z]{1,8}", attempts in 2usize..5) {
            let mut f = fixture(5.0);
            let accepted = (0..attempts)
                .filter(|_| f.registry.try_add(&id, PROXY_SOURCE, true).is_ok())
                .count();
            prop_assert_eq!(accepted, 1);
            prop_assert_eq!(f.registry.len(), 1);
        }

        #[test]
        fn test_interleaved_adds_and_stops_track_live_ids(
            steps in proptest::collection::vec((any::<bool>(), 0usize..3), 1..12)
        ) {
            const IDS: [&str; 3] = ["tex1", "tex2", "tex3"];
            let mut f = fixture(5.0);
            let mut live = std::collections::BTreeSet::new();

            for (add, index) in steps {
                let id = IDS[index];
                if add {
                    let result = f.registry.try_add(id, PROXY_SOURCE, true);
                    prop_assert_eq!(result.is_ok(), live.insert(id));
                } else {
                    f.registry.stop(id);
                    live.remove(id);
                }

                let mut ids = f.registry.ids();
                prop_assert_eq!(f.registry.len(), live.len());
                ids.sort_unstable();
                let before = ids.len();
                ids.dedup();
                prop_assert_eq!(ids.len(), before);
                prop_assert_eq!(ids, live.iter().copied().collect::<Vec<_>>());
            }
        }
    }
}
