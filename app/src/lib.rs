//! Headless host for the ndilink bridge.
//!
//! Loads the configuration and scene, brings up a simulated network and
//! drives the bridge through a short scripted session: one proxy texture and
//! one texture fed by a simulated camera.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::Sender;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ndilink_engine::{make_valid_identifier, Bridge, MemoryScene};
use ndilink_ipc::{command_channel, BridgeCommand, BridgeConfig, BridgeEvent, Subscription, PROXY_SOURCE};
use ndilink_sdk::sim::{SimSource, SimulatedNetwork};
use ndilink_stream::MemoryTextures;

/// Name of the simulated camera announced by the demo session.
pub const DEMO_CAMERA: &str = "SIM (Camera 1)";

/// Command line options.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "ndilink", version, about = "Headless host for the ndilink bridge", long_about = None)]
pub struct Options {
    /// JSON file holding a bridge configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON file holding the scene
    #[arg(long)]
    pub scene: Option<PathBuf>,

    /// Seconds the streams run before shutdown
    #[arg(long, default_value = "5", value_parser = parse_duration)]
    pub duration: Duration,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    let secs: f32 = value.parse().map_err(|e| format!("{}", e))?;
    Duration::try_from_secs_f32(secs).map_err(|e| format!("{}", e))
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "ndilink=debug,ndilink_app=debug,ndilink_engine=debug,ndilink_discovery=debug,ndilink_stream=debug,ndilink_sdk=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Read a [`BridgeConfig`] from JSON. Missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<BridgeConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read config {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid config {}", path.display()))
}

/// Read a [`MemoryScene`] from JSON.
pub fn load_scene(path: &Path) -> Result<MemoryScene> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read scene {}", path.display()))?;
    MemoryScene::from_json(&json).with_context(|| format!("Invalid scene {}", path.display()))
}

/// Run the host with the given command line options.
pub fn run(options: Options) -> Result<()> {
    init_logging();

    let config = match &options.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };
    let scene = match &options.scene {
        Some(path) => load_scene(path)?,
        None => MemoryScene::new(),
    };

    info!("ndilink starting");

    let network = SimulatedNetwork::new();
    network.announce(DEMO_CAMERA, SimSource::default());

    let textures = MemoryTextures::new();
    let mut bridge = Bridge::new(
        Arc::new(network.clone()),
        Box::new(scene),
        Arc::new(textures.clone()),
        config,
    );

    let (command_tx, command_rx) = command_channel();
    let events = bridge.bus().subscribe();
    let duration = options.duration;
    let session = thread::Builder::new()
        .name("ndilink-session".to_string())
        .spawn(move || demo_session(command_tx, events, duration))
        .context("Could not spawn session thread")?;

    bridge.run(command_rx);

    if session.join().is_err() {
        warn!("Session thread panicked");
    }

    for name in textures.names() {
        info!(
            texture = %name,
            frames = textures.push_count(&name),
            "Texture summary"
        );
    }

    info!("ndilink stopped");
    Ok(())
}

fn demo_session(commands: Sender<BridgeCommand>, events: Subscription, duration: Duration) {
    let proxy_texture = make_valid_identifier("Proxy Screen");
    let camera_texture = make_valid_identifier("Camera Screen");

    let script = [
        BridgeCommand::CreateDynamicTexture {
            name: "Proxy Screen".to_string(),
        },
        BridgeCommand::SetBindingSource {
            texture_id: proxy_texture.clone(),
            source: PROXY_SOURCE.to_string(),
        },
        BridgeCommand::StartStream {
            texture_id: proxy_texture,
        },
        BridgeCommand::CreateDynamicTexture {
            name: "Camera Screen".to_string(),
        },
    ];
    for command in script {
        if commands.send(command).is_err() {
            return;
        }
    }

    let camera_seen = watch_events(&events, Duration::from_secs(10), |event| {
        matches!(event, BridgeEvent::SourcesChanged { sources } if sources.iter().any(|s| s == DEMO_CAMERA))
    });
    if camera_seen {
        let _ = commands.send(BridgeCommand::SetBindingSource {
            texture_id: camera_texture.clone(),
            source: DEMO_CAMERA.to_string(),
        });
        let _ = commands.send(BridgeCommand::StartStream {
            texture_id: camera_texture,
        });
    } else {
        warn!("Simulated camera never showed up");
    }

    watch_events(&events, duration, |_| false);
    let _ = commands.send(BridgeCommand::Shutdown);
}

/// Log events until `stop` matches one or `timeout` elapses. Returns true on a match.
fn watch_events(
    events: &Subscription,
    timeout: Duration,
    mut stop: impl FnMut(&BridgeEvent) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        if let Some(event) = events.recv_timeout(remaining) {
            info!(event = event.name(), "Bridge event");
            if stop(&event) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let options = Options::try_parse_from([
            "ndilink",
            "--config",
            "bridge.json",
            "--scene",
            "stage.json",
            "--duration",
            "0.5",
        ])
        .unwrap();
        assert_eq!(options.config, Some(PathBuf::from("bridge.json")));
        assert_eq!(options.scene, Some(PathBuf::from("stage.json")));
        assert_eq!(options.duration, Duration::from_millis(500));

        let options = Options::try_parse_from(["ndilink"]).unwrap();
        assert_eq!(options.config, None);
        assert_eq!(options.scene, None);
        assert_eq!(options.duration, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Options::try_parse_from(["ndilink", "--verbose"]).is_err());
        assert!(Options::try_parse_from(["ndilink", "--config"]).is_err());
        assert!(Options::try_parse_from(["ndilink", "--duration", "soon"]).is_err());
        assert!(Options::try_parse_from(["ndilink", "--duration=-1"]).is_err());
    }

    #[test]
    fn test_load_config_reads_file() {
        let path = std::env::temp_dir().join(format!("ndilink-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"tick_interval_ms": 40}"#).unwrap();

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.tick_interval_ms, 40);
        assert!(load_config(&path).is_err());
    }
}
