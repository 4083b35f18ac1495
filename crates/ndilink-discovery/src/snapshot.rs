//! Latest finder result shared with stream workers.

use std::sync::Arc;

use parking_lot::RwLock;

use ndilink_sdk::SourceDescriptor;

/// The source list seen by the most recent poll.
///
/// Written only by the discovery thread; read under the lock by live stream
/// workers resolving their source at construction time.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    sources: Arc<RwLock<Vec<SourceDescriptor>>>,
}

impl SourceSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list.
    pub fn replace(&self, sources: Vec<SourceDescriptor>) {
        *self.sources.write() = sources;
    }

    /// Look up a source by name.
    pub fn find(&self, name: &str) -> Option<SourceDescriptor> {
        self.sources.read().iter().find(|s| s.name == name).cloned()
    }

    /// Names of every source, in finder order.
    pub fn names(&self) -> Vec<String> {
        self.sources.read().iter().map(|s| s.name.clone()).collect()
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    /// Returns true if no source is visible.
    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}
