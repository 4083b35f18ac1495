//! Host controller tying discovery, bindings, streams and the scene together.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info, instrument, warn};

use ndilink_discovery::{DiscoveryService, SourceSnapshot};
use ndilink_ipc::{
    ActivityIndicator, BridgeCommand, BridgeConfig, BridgeEvent, EventBus, FpsSnapshot,
    Subscription,
};
use ndilink_sdk::NdiRuntime;
use ndilink_stream::{Frame, TextureProvider};

use crate::bindings::BindingStore;
use crate::error::{BindingError, BridgeError};
use crate::naming::make_valid_identifier;
use crate::registry::StreamRegistry;
use crate::scene::{SceneStore, DYNAMIC_PREFIX};
use crate::BridgeResult;

/// Colour a freshly created dynamic texture is filled with.
pub const PLACEHOLDER_RGBA: [u8; 4] = [255, 0, 255, 255];

/// The bridge between the network and the scene's dynamic textures.
///
/// Everything here runs on the host thread; only discovery and the stream
/// workers have threads of their own.
pub struct Bridge {
    config: BridgeConfig,
    bus: Arc<EventBus>,
    subscription: Subscription,
    discovery: Option<DiscoveryService>,
    registry: StreamRegistry,
    store: BindingStore,
    scene: Box<dyn SceneStore>,
    textures: Arc<dyn TextureProvider>,
}

impl Bridge {
    /// Start discovery, build the stores and scan the scene.
    ///
    /// A discovery failure is logged and the bridge keeps working without it.
    #[instrument(name = "bridge_new", skip_all)]
    pub fn new(
        runtime: Arc<dyn NdiRuntime>,
        scene: Box<dyn SceneStore>,
        textures: Arc<dyn TextureProvider>,
        config: BridgeConfig,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let subscription = bus.subscribe();

        let discovery = match DiscoveryService::start(
            Arc::clone(&runtime),
            Arc::clone(&bus),
            config.discovery.clone(),
        ) {
            Ok(service) => Some(service),
            Err(e) => {
                error!("Discovery unavailable: {}", e);
                None
            }
        };

        let snapshot = discovery
            .as_ref()
            .map(DiscoveryService::snapshot)
            .unwrap_or_else(SourceSnapshot::new);

        let registry = StreamRegistry::new(
            runtime,
            Arc::clone(&textures),
            snapshot,
            Arc::clone(&bus),
            config.stream.clone(),
        );
        let store = BindingStore::new(Arc::clone(&bus));

        let mut bridge = Self {
            config,
            bus,
            subscription,
            discovery,
            registry,
            store,
            scene,
            textures,
        };
        bridge.rescan();

        info!(discovery = bridge.discovery.is_some(), "Bridge ready");
        bridge
    }

    /// Process pending events, then reap workers that stopped on their own.
    ///
    /// Returns every event drained during this tick.
    pub fn tick(&mut self) -> Vec<BridgeEvent> {
        let events = self.subscription.drain();

        for event in &events {
            match event {
                BridgeEvent::SourcesChanged { sources } => {
                    self.store.reconcile_discovered_sources(sources);
                }
                BridgeEvent::BindingComboChanged { id, value, .. } => {
                    if let Err(e) = self.set_binding_source(id, value) {
                        warn!("Could not apply source selection: {}", e);
                    }
                }
                _ => {}
            }
        }

        self.registry.sweep();
        events
    }

    /// Create a material reading a new dynamic texture. Returns the sanitized name.
    #[instrument(name = "create_dynamic_texture", skip(self))]
    pub fn create_dynamic_texture(&mut self, name: &str) -> BridgeResult<String> {
        let safe_name = make_valid_identifier(name);
        if safe_name != name {
            warn!(
                "Name \"{}\" was not a valid identifier, changed it to \"{}\"",
                name, safe_name
            );
        }

        if self.store.find(&safe_name).is_some() {
            warn!("There's already a texture with the name {}", safe_name);
            return Err(BridgeError::DuplicateTexture(safe_name));
        }

        self.scene.create_dynamic_texture_material(&safe_name)?;
        self.textures
            .create_sink(&safe_name)
            .push_frame(&Frame::solid(1, 1, PLACEHOLDER_RGBA));
        self.rescan();

        Ok(safe_name)
    }

    /// Rebuild the bindings from the scene.
    pub fn rescan(&mut self) {
        let prims = self.scene.scan_dynamic_bindings();
        self.store.update_from_scan(prims);
    }

    /// Select `source` for `texture_id` and persist it on the texture's prims.
    pub fn set_binding_source(&mut self, texture_id: &str, source: &str) -> BridgeResult<()> {
        self.store.bind(texture_id, source)?;
        for path in self.prim_paths(texture_id) {
            self.scene.write_source_attribute(&path, source)?;
        }
        Ok(())
    }

    /// Set the low bandwidth flag of `texture_id` and persist it.
    pub fn set_low_bandwidth(&mut self, texture_id: &str, value: bool) -> BridgeResult<()> {
        self.store.set_low_bandwidth(texture_id, value)?;
        for path in self.prim_paths(texture_id) {
            self.scene.write_bandwidth_attribute(&path, value)?;
        }
        Ok(())
    }

    /// Start streaming the bound source into `texture_id`.
    pub fn start_stream(&mut self, texture_id: &str) -> BridgeResult<()> {
        let binding = self
            .store
            .find(texture_id)
            .ok_or_else(|| BindingError::UnknownTexture(texture_id.to_string()))?;
        let (source, low_bandwidth) = (binding.source.clone(), binding.low_bandwidth);

        self.registry.try_add(texture_id, &source, low_bandwidth)?;
        Ok(())
    }

    /// Stop streaming into `texture_id`.
    pub fn stop_stream(&mut self, texture_id: &str) {
        self.registry.stop(texture_id);
    }

    /// Stop every stream.
    pub fn stop_all_streams(&mut self) {
        self.registry.stop_all();
    }

    /// Frame rate statistics of the stream feeding `texture_id`.
    pub fn fps(&self, texture_id: &str) -> Option<FpsSnapshot> {
        self.registry.fps(texture_id)
    }

    /// Status light of `texture_id`.
    pub fn activity(&self, texture_id: &str) -> ActivityIndicator {
        let source_active = self
            .store
            .find(texture_id)
            .and_then(|b| self.store.source(&b.source))
            .is_some_and(|s| s.active);
        ActivityIndicator::from_state(source_active, self.registry.contains(texture_id))
    }

    /// Asset path of the dynamic texture `texture_id`.
    pub fn dynamic_texture_url(&self, texture_id: &str) -> String {
        format!("{DYNAMIC_PREFIX}{texture_id}")
    }

    /// The binding store.
    pub fn bindings(&self) -> &BindingStore {
        &self.store
    }

    /// The stream registry.
    pub fn streams(&self) -> &StreamRegistry {
        &self.registry
    }

    /// The scene.
    pub fn scene(&self) -> &dyn SceneStore {
        self.scene.as_ref()
    }

    /// The event bus, for presentation layers to subscribe to or publish on.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Returns true if discovery is running.
    pub fn has_discovery(&self) -> bool {
        self.discovery.is_some()
    }

    /// Handle a command. Returns false if the bridge should stop.
    pub fn handle_command(&mut self, command: BridgeCommand) -> bool {
        debug!(?command, "Handling command");

        let result = match command {
            BridgeCommand::CreateDynamicTexture { name } => {
                self.create_dynamic_texture(&name).map(|_| ())
            }
            BridgeCommand::Rescan => {
                self.rescan();
                Ok(())
            }
            BridgeCommand::SetBindingSource { texture_id, source } => {
                self.set_binding_source(&texture_id, &source)
            }
            BridgeCommand::SetLowBandwidth {
                texture_id,
                low_bandwidth,
            } => self.set_low_bandwidth(&texture_id, low_bandwidth),
            BridgeCommand::StartStream { texture_id } => self.start_stream(&texture_id),
            BridgeCommand::StopStream { texture_id } => {
                self.stop_stream(&texture_id);
                Ok(())
            }
            BridgeCommand::StopAllStreams => {
                self.stop_all_streams();
                Ok(())
            }
            BridgeCommand::Shutdown => {
                self.shutdown();
                return false;
            }
        };

        if let Err(e) = result {
            warn!("Command failed: {}", e);
        }
        true
    }

    /// Run the command loop (blocking), ticking at the configured interval.
    #[instrument(name = "bridge_run", skip_all)]
    pub fn run(&mut self, commands: Receiver<BridgeCommand>) {
        info!("Bridge loop starting");
        let interval = self.config.tick_interval();
        let mut last_tick = Instant::now();

        loop {
            match commands.recv_timeout(interval) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Command channel disconnected, shutting down");
                    self.shutdown();
                    break;
                }
            }

            if last_tick.elapsed() >= interval {
                self.tick();
                last_tick = Instant::now();
            }
        }

        info!("Bridge loop stopped");
    }

    /// Stop every stream and discovery. Safe to call repeatedly.
    #[instrument(name = "bridge_shutdown", skip(self))]
    pub fn shutdown(&mut self) {
        self.registry.stop_all();
        if let Some(mut discovery) = self.discovery.take() {
            discovery.destroy();
        }
    }

    fn prim_paths(&self, texture_id: &str) -> Vec<String> {
        self.store
            .prims_for(texture_id)
            .into_iter()
            .map(|p| p.path.clone())
            .collect()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
