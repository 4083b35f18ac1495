//! Binding store and source catalog.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use ndilink_ipc::{is_sentinel, BridgeEvent, EventBus, NONE_SOURCE, PROXY_SOURCE};

use crate::error::BindingError;
use crate::scene::DynamicPrim;
use crate::BindingResult;

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    pub active: bool,
}

impl SourceEntry {
    fn new(name: &str, active: bool) -> Self {
        Self {
            name: name.to_string(),
            active,
        }
    }
}

/// Which source a texture reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub texture_id: String,
    pub source: String,
    pub low_bandwidth: bool,
}

/// A binding with the prim it came from and its catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingView<'a> {
    pub binding: &'a Binding,
    pub prim: Option<&'a DynamicPrim>,
    pub source: Option<&'a SourceEntry>,
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Sources seen for the first time.
    pub added: Vec<String>,

    /// Known sources that became active.
    pub activated: Vec<String>,

    /// Sources that are no longer visible.
    pub deactivated: Vec<String>,

    /// Sources that were and still are active.
    pub still_active: Vec<String>,
}

impl ReconcileReport {
    /// Returns true if the catalog changed.
    pub fn is_changed(&self) -> bool {
        !(self.added.is_empty() && self.activated.is_empty() && self.deactivated.is_empty())
    }
}

/// Bindings rebuilt from scene scans, plus the catalog of every source seen.
pub struct BindingStore {
    bus: Arc<EventBus>,
    prims: Vec<DynamicPrim>,
    bindings: Vec<Binding>,
    sources: Vec<SourceEntry>,
}

impl BindingStore {
    /// Create a store whose catalog holds only the sentinels.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            prims: Vec::new(),
            bindings: Vec::new(),
            sources: vec![
                SourceEntry::new(NONE_SOURCE, false),
                SourceEntry::new(PROXY_SOURCE, true),
            ],
        }
    }

    /// Replace the prim list and rebuild every binding from it.
    ///
    /// Prims sharing a texture id share one binding.
    pub fn update_from_scan(&mut self, prims: Vec<DynamicPrim>) {
        for source in prims.iter().filter_map(|p| p.source.as_deref()) {
            self.ensure_source(source);
        }

        // One binding per texture id, read from its first prim.
        self.bindings.clear();
        for prim in &prims {
            if self.bindings.iter().any(|b| b.texture_id == prim.texture_id) {
                continue;
            }
            self.bindings.push(Binding {
                texture_id: prim.texture_id.clone(),
                source: prim
                    .source
                    .clone()
                    .unwrap_or_else(|| NONE_SOURCE.to_string()),
                low_bandwidth: prim.low_bandwidth,
            });
        }
        self.prims = prims;

        debug!(count = self.bindings.len(), "Bindings rebuilt");
        self.bus.publish(BridgeEvent::BindingsChanged);
    }

    /// Merge the sources visible on the network into the catalog.
    pub fn reconcile_discovered_sources(&mut self, live: &[String]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for name in live.iter().filter(|name| !is_sentinel(name)) {
            if self.source(name).is_none() {
                self.sources.push(SourceEntry::new(name, true));
                report.added.push(name.clone());
            }
        }

        for entry in self.sources.iter_mut().filter(|e| !is_sentinel(&e.name)) {
            if report.added.contains(&entry.name) {
                continue;
            }
            let visible = live.contains(&entry.name);
            match (entry.active, visible) {
                (false, true) => report.activated.push(entry.name.clone()),
                (true, false) => report.deactivated.push(entry.name.clone()),
                (true, true) => report.still_active.push(entry.name.clone()),
                (false, false) => {}
            }
            entry.active = visible;
        }

        if report.is_changed() {
            info!(
                added = report.added.len(),
                activated = report.activated.len(),
                deactivated = report.deactivated.len(),
                "Source catalog changed"
            );
            self.bus.publish(BridgeEvent::SourceCatalogChanged {
                sources: self.source_names(),
            });
            self.bus.publish(BridgeEvent::SourceActivityChanged);
        }

        report
    }

    /// Point `texture_id` at `source`, adding the source to the catalog if unseen.
    pub fn bind(&mut self, texture_id: &str, source: &str) -> BindingResult<()> {
        let index = self.binding_index(texture_id)?;
        self.ensure_source(source);
        self.bindings[index].source = source.to_string();
        debug!(texture_id, source, "Binding updated");
        Ok(())
    }

    /// Set the low bandwidth flag of `texture_id`.
    pub fn set_low_bandwidth(&mut self, texture_id: &str, value: bool) -> BindingResult<()> {
        let index = self.binding_index(texture_id)?;
        self.bindings[index].low_bandwidth = value;
        Ok(())
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if there are no bindings.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The binding at `index` with its first prim and catalog entry.
    pub fn get(&self, index: usize) -> Option<BindingView<'_>> {
        let binding = self.bindings.get(index)?;
        Some(BindingView {
            binding,
            prim: self.prims.iter().find(|p| p.texture_id == binding.texture_id),
            source: self.source(&binding.source),
        })
    }

    /// Every binding, in scan order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// The binding of `texture_id`.
    pub fn find(&self, texture_id: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.texture_id == texture_id)
    }

    /// Prims of the last scan rendering `texture_id`.
    pub fn prims_for(&self, texture_id: &str) -> Vec<&DynamicPrim> {
        self.prims
            .iter()
            .filter(|p| p.texture_id == texture_id)
            .collect()
    }

    /// The catalog entry called `name`.
    pub fn source(&self, name: &str) -> Option<&SourceEntry> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Every catalog name, sentinels first.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }

    /// The whole catalog.
    pub fn sources(&self) -> &[SourceEntry] {
        &self.sources
    }

    fn binding_index(&self, texture_id: &str) -> BindingResult<usize> {
        self.bindings
            .iter()
            .position(|b| b.texture_id == texture_id)
            .ok_or_else(|| {
                error!(texture_id, "No binding for texture");
                BindingError::UnknownTexture(texture_id.to_string())
            })
    }

    fn ensure_source(&mut self, name: &str) {
        if self.source(name).is_none() {
            debug!(source = name, "Source added to catalog as inactive");
            self.sources.push(SourceEntry::new(name, false));
        }
    }
}
