//! Discovery service and its poll loop.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument};

use ndilink_ipc::{BridgeEvent, DiscoverySettings, EventBus};
use ndilink_sdk::{Finder, NdiRuntime, SourceDescriptor};

use crate::error::DiscoveryError;
use crate::snapshot::SourceSnapshot;
use crate::DiscoveryResult;

/// Longest uninterrupted sleep of the poll loop.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Poll the finder once and return the visible source names.
pub fn poll_once(finder: &mut dyn Finder, timeout: Duration) -> BTreeSet<String> {
    source_names(&finder.current_sources(timeout))
}

fn source_names(sources: &[SourceDescriptor]) -> BTreeSet<String> {
    sources.iter().map(|s| s.name.clone()).collect()
}

/// Remembers the last source set and reports when it changes.
#[derive(Debug, Default)]
pub struct SourceTracker {
    previous: BTreeSet<String>,
}

impl SourceTracker {
    /// Create a tracker that has seen nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current`. Returns the full new set when its symmetric
    /// difference with the previous set is non-empty.
    pub fn observe(&mut self, current: BTreeSet<String>) -> Option<Vec<String>> {
        if current.symmetric_difference(&self.previous).next().is_none() {
            return None;
        }
        self.previous = current;
        Some(self.previous.iter().cloned().collect())
    }
}

/// Background source discovery.
pub struct DiscoveryService {
    runtime: Arc<dyn NdiRuntime>,
    snapshot: SourceSnapshot,
    should_stop: Arc<AtomicBool>,
    poll_thread: Option<JoinHandle<()>>,
}

impl DiscoveryService {
    /// Initialize the library, create a finder and start polling.
    #[instrument(name = "discovery_start", skip_all)]
    pub fn start(
        runtime: Arc<dyn NdiRuntime>,
        bus: Arc<EventBus>,
        settings: DiscoverySettings,
    ) -> DiscoveryResult<Self> {
        runtime.initialize().map_err(|e| {
            error!("Could not initialize discovery library: {}", e);
            DiscoveryError::Initialize(e)
        })?;

        let finder = match runtime.create_finder() {
            Ok(finder) => finder,
            Err(e) => {
                error!("Could not create source finder: {}", e);
                runtime.shutdown();
                return Err(DiscoveryError::Finder(e));
            }
        };

        let snapshot = SourceSnapshot::new();
        let should_stop = Arc::new(AtomicBool::new(false));

        let loop_snapshot = snapshot.clone();
        let loop_stop = Arc::clone(&should_stop);
        let handle = thread::Builder::new()
            .name("ndilink-discovery".to_string())
            .spawn(move || discovery_loop(finder, loop_snapshot, bus, settings, loop_stop));

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                runtime.shutdown();
                return Err(DiscoveryError::Spawn(e));
            }
        };

        info!("Discovery started");

        Ok(Self {
            runtime,
            snapshot,
            should_stop,
            poll_thread: Some(handle),
        })
    }

    /// Shared view of the latest poll result.
    pub fn snapshot(&self) -> SourceSnapshot {
        self.snapshot.clone()
    }

    /// Names seen by the latest poll.
    pub fn sources(&self) -> Vec<String> {
        self.snapshot.names()
    }

    /// Returns true while the poll thread is alive.
    pub fn is_running(&self) -> bool {
        self.poll_thread.is_some()
    }

    /// Stop polling, join the thread and shut the library down.
    ///
    /// Must not be called from the poll thread.
    #[instrument(name = "discovery_destroy", skip(self))]
    pub fn destroy(&mut self) {
        let Some(handle) = self.poll_thread.take() else {
            return;
        };

        self.should_stop.store(true, Ordering::SeqCst);
        let _ = handle.join();
        self.runtime.shutdown();

        info!("Discovery stopped");
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn discovery_loop(
    mut finder: Box<dyn Finder>,
    snapshot: SourceSnapshot,
    bus: Arc<EventBus>,
    settings: DiscoverySettings,
    should_stop: Arc<AtomicBool>,
) {
    debug!("Discovery loop started");

    let mut tracker = SourceTracker::new();

    while !should_stop.load(Ordering::SeqCst) {
        let next_poll = Instant::now() + settings.poll_interval();

        let sources = finder.current_sources(settings.poll_timeout());
        let changed = tracker.observe(source_names(&sources)).is_some();
        let names: Vec<String> = sources.iter().map(|s| s.name.clone()).collect();
        snapshot.replace(sources);

        if changed {
            info!(count = names.len(), "Visible sources changed");
            bus.publish(BridgeEvent::SourcesChanged { sources: names });
        }

        sleep_until(next_poll, &should_stop);
    }

    // The finder is released here, before the owner shuts the library down.
    drop(finder);
    debug!("Discovery loop exiting");
}

fn sleep_until(deadline: Instant, should_stop: &AtomicBool) {
    loop {
        if should_stop.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(STOP_CHECK_INTERVAL));
    }
}
