//! Scene contract and an in-memory scene.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::error::SceneError;
use crate::SceneResult;

/// String attribute holding the selected source.
pub const SOURCE_ATTRIBUTE: &str = "ndi:source";

/// Bool attribute holding the low bandwidth flag.
pub const BANDWIDTH_ATTRIBUTE: &str = "ndi:lowbandwidth";

/// Asset prefix marking a texture as dynamic.
pub const DYNAMIC_PREFIX: &str = "dynamic://";

/// Scope created under the default prim to hold generated materials.
pub const LOOKS_SCOPE: &str = "NDI_Looks";

/// Shader input carrying the texture asset.
pub const SHADER_TEXTURE_INPUT: &str = "inputs:diffuse_texture";

/// Rect light attribute carrying the texture asset.
pub const LIGHT_TEXTURE_ATTRIBUTE: &str = "texture:file";

const DEFAULT_PRIM: &str = "/World";

/// A prim that renders a dynamic texture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicPrim {
    /// Scene path of the prim.
    pub path: String,

    /// Texture id, the asset path without its prefix.
    pub texture_id: String,

    /// Persisted source selection.
    pub source: Option<String>,

    /// Persisted low bandwidth flag.
    pub low_bandwidth: bool,
}

/// Access to the host scene.
pub trait SceneStore: Send {
    /// Every prim rendering a dynamic texture, shaders before rect lights.
    ///
    /// Several prims may share a texture id.
    fn scan_dynamic_bindings(&self) -> Vec<DynamicPrim>;

    /// Persist the source selection on the prim at `path`.
    fn write_source_attribute(&mut self, path: &str, value: &str) -> SceneResult<()>;

    /// Persist the low bandwidth flag on the prim at `path`.
    fn write_bandwidth_attribute(&mut self, path: &str, value: bool) -> SceneResult<()>;

    /// Create a material reading the dynamic texture `name`. Returns its path.
    fn create_dynamic_texture_material(&mut self, name: &str) -> SceneResult<String>;
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    String(String),
    Bool(bool),
    Asset(String),
    Token(String),
}

impl AttributeValue {
    fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Asset(s) | Self::Token(s) => Some(s.as_str()),
            Self::Bool(_) => None,
        }
    }
}

/// Prim type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimKind {
    Xform,
    Scope,
    Material,
    Shader,
    RectLight,
    Mesh,
}

/// One scene prim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prim {
    pub path: String,
    pub kind: PrimKind,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Prim {
    fn texture_id(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)?
            .as_str()?
            .strip_prefix(DYNAMIC_PREFIX)
            .filter(|id| !id.is_empty())
    }

    fn to_dynamic(&self, texture_id: &str) -> DynamicPrim {
        let source = match self.attributes.get(SOURCE_ATTRIBUTE) {
            Some(AttributeValue::String(s)) => Some(s.clone()),
            _ => None,
        };
        let low_bandwidth = matches!(
            self.attributes.get(BANDWIDTH_ATTRIBUTE),
            Some(AttributeValue::Bool(true))
        );

        DynamicPrim {
            path: self.path.clone(),
            texture_id: texture_id.to_string(),
            source,
            low_bandwidth,
        }
    }
}

fn default_prim() -> String {
    DEFAULT_PRIM.to_string()
}

/// Scene held in memory, loadable from and savable to JSON.
///
/// Prims are kept in traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryScene {
    #[serde(default = "default_prim")]
    default_prim: String,

    #[serde(default)]
    prims: Vec<Prim>,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self {
            default_prim: default_prim(),
            prims: Vec::new(),
        }
    }
}

impl MemoryScene {
    /// Create an empty scene with `/World` as default prim.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a scene from JSON.
    pub fn from_json(json: &str) -> SceneResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the scene to pretty JSON.
    pub fn to_json(&self) -> SceneResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Path of the default prim.
    pub fn default_prim(&self) -> &str {
        &self.default_prim
    }

    /// Every prim, in traversal order.
    pub fn prims(&self) -> &[Prim] {
        &self.prims
    }

    /// The prim at `path`.
    pub fn prim(&self, path: &str) -> Option<&Prim> {
        self.prims.iter().find(|p| p.path == path)
    }

    /// Define a prim, keeping an existing prim at `path` untouched.
    pub fn define_prim(&mut self, path: &str, kind: PrimKind) -> &mut Prim {
        let index = match self.prims.iter().position(|p| p.path == path) {
            Some(index) => index,
            None => {
                self.prims.push(Prim {
                    path: path.to_string(),
                    kind,
                    attributes: BTreeMap::new(),
                });
                self.prims.len() - 1
            }
        };
        &mut self.prims[index]
    }

    /// Set an attribute on an existing prim.
    pub fn set_attribute(
        &mut self,
        path: &str,
        name: &str,
        value: AttributeValue,
    ) -> SceneResult<()> {
        let prim = self
            .prims
            .iter_mut()
            .find(|p| p.path == path)
            .ok_or_else(|| SceneError::PrimNotFound(path.to_string()))?;
        prim.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Read an attribute.
    pub fn attribute(&self, path: &str, name: &str) -> Option<&AttributeValue> {
        self.prim(path)?.attributes.get(name)
    }

    fn scan_kind(&self, kind: PrimKind, attribute: &str, found: &mut Vec<DynamicPrim>) {
        for prim in self.prims.iter().filter(|p| p.kind == kind) {
            if let Some(id) = prim.texture_id(attribute) {
                found.push(prim.to_dynamic(id));
            }
        }
    }
}

impl SceneStore for MemoryScene {
    fn scan_dynamic_bindings(&self) -> Vec<DynamicPrim> {
        let mut found = Vec::new();
        self.scan_kind(PrimKind::Shader, SHADER_TEXTURE_INPUT, &mut found);
        self.scan_kind(PrimKind::RectLight, LIGHT_TEXTURE_ATTRIBUTE, &mut found);
        debug!(count = found.len(), "Scanned scene for dynamic textures");
        found
    }

    fn write_source_attribute(&mut self, path: &str, value: &str) -> SceneResult<()> {
        self.set_attribute(path, SOURCE_ATTRIBUTE, AttributeValue::String(value.to_string()))
            .inspect_err(|_| error!(path, "Could not set the source attribute"))
    }

    fn write_bandwidth_attribute(&mut self, path: &str, value: bool) -> SceneResult<()> {
        self.set_attribute(path, BANDWIDTH_ATTRIBUTE, AttributeValue::Bool(value))
            .inspect_err(|_| error!(path, "Could not set the bandwidth attribute"))
    }

    #[instrument(name = "create_material", skip(self))]
    fn create_dynamic_texture_material(&mut self, name: &str) -> SceneResult<String> {
        let root = self.default_prim.trim_end_matches('/').to_string();
        if !root.is_empty() {
            self.define_prim(&root, PrimKind::Xform);
        }

        let scope = format!("{root}/{LOOKS_SCOPE}");
        self.define_prim(&scope, PrimKind::Scope);

        let material = format!("{scope}/{name}");
        self.define_prim(&material, PrimKind::Material);

        let shader = format!("{material}/Shader");
        let prim = self.define_prim(&shader, PrimKind::Shader);
        let attributes = [
            ("info:id", AttributeValue::Token("OmniPBR".to_string())),
            (
                "info:mdl:sourceAsset",
                AttributeValue::Asset("OmniPBR.mdl".to_string()),
            ),
            (
                SHADER_TEXTURE_INPUT,
                AttributeValue::Asset(format!("{DYNAMIC_PREFIX}{name}")),
            ),
        ];
        for (key, value) in attributes {
            prim.attributes.insert(key.to_string(), value);
        }

        debug!(material = %material, "Dynamic texture material created");
        Ok(material)
    }
}
