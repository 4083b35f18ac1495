//! Named texture sinks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::frame::Frame;

/// Hands out sinks by texture name. The renderer side of the bridge.
pub trait TextureProvider: Send + Sync {
    /// Create (or reopen) the sink called `name`.
    fn create_sink(&self, name: &str) -> Box<dyn TextureSink>;
}

/// Destination of the frames of one texture.
pub trait TextureSink: Send {
    /// Replace the texture contents with `frame`.
    fn push_frame(&mut self, frame: &Frame);
}

#[derive(Debug, Default)]
struct TextureRecord {
    last: Option<Frame>,
    pushes: u64,
}

/// In-memory texture registry. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTextures {
    textures: Arc<RwLock<HashMap<String, TextureRecord>>>,
}

impl MemoryTextures {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last frame pushed to `name`.
    pub fn last_frame(&self, name: &str) -> Option<Frame> {
        self.textures.read().get(name).and_then(|t| t.last.clone())
    }

    /// Number of frames pushed to `name`.
    pub fn push_count(&self, name: &str) -> u64 {
        self.textures.read().get(name).map_or(0, |t| t.pushes)
    }

    /// Names of every sink created so far, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.textures.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl TextureProvider for MemoryTextures {
    fn create_sink(&self, name: &str) -> Box<dyn TextureSink> {
        self.textures.write().entry(name.to_string()).or_default();
        Box::new(MemorySink {
            name: name.to_string(),
            textures: Arc::clone(&self.textures),
        })
    }
}

struct MemorySink {
    name: String,
    textures: Arc<RwLock<HashMap<String, TextureRecord>>>,
}

impl TextureSink for MemorySink {
    fn push_frame(&mut self, frame: &Frame) {
        let mut textures = self.textures.write();
        let record = textures.entry(self.name.clone()).or_default();
        record.last = Some(frame.clone());
        record.pushes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinks_with_same_name_share_texture() {
        let textures = MemoryTextures::new();
        let mut a = textures.create_sink("tex1");
        let mut b = textures.create_sink("tex1");
        assert_eq!(textures.push_count("tex1"), 0);
        assert_eq!(textures.last_frame("tex1"), None);

        a.push_frame(&Frame::solid(1, 1, [1, 1, 1, 1]));
        b.push_frame(&Frame::solid(1, 1, [2, 2, 2, 2]));

        assert_eq!(textures.push_count("tex1"), 2);
        assert_eq!(
            textures.last_frame("tex1").and_then(|f| f.pixel(0, 0)),
            Some([2, 2, 2, 2])
        );
        assert_eq!(textures.names(), vec!["tex1"]);
    }
}
