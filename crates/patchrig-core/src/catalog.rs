//! Parameter catalog: named, typed descriptors for one synth model
//!
//! A catalog is loaded once (usually from a YAML file shipped per
//! device) and is immutable afterwards, so concurrent reads need no
//! locking. Each descriptor advertises the capabilities it supports;
//! capability probes are plain queries and never fail, so callers can
//! branch on supported operations instead of probing with errors.
//!
//! Default location for catalog files: ~/.config/patchrig/catalogs/

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Value kind of a parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Plain scalar integer
    Int,
    /// Boolean stored as 0/1
    Bool,
    /// Integer index into a lookup table
    Lookup,
    /// Fixed-length integer array (e.g. gated sequencer steps)
    IntArray,
    /// Fixed-length array of lookup indices
    LookupArray,
}

impl ParamKind {
    /// Array-valued kinds require vector access
    pub fn is_array(&self) -> bool {
        matches!(self, ParamKind::IntArray | ParamKind::LookupArray)
    }

    /// Kinds rendered through a lookup table
    pub fn uses_lookup(&self) -> bool {
        matches!(self, ParamKind::Lookup | ParamKind::LookupArray)
    }
}

/// Optional facet a descriptor may support
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Scalar integer get/set
    Int,
    /// Array get/set
    Vector,
    /// Device-update message generation on value change
    LiveEdit,
    /// Per-layer addressing
    MultiLayer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Int => "integer access",
            Capability::Vector => "vector access",
            Capability::LiveEdit => "live edit",
            Capability::MultiLayer => "multi-layer access",
        };
        write!(f, "{}", name)
    }
}

/// Contiguous byte range within a patch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub offset: usize,
    pub len: usize,
}

impl ByteRange {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// NRPN assignment for parameters the device accepts live edits for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEditSpec {
    /// NRPN number of the parameter (first element for arrays)
    pub nrpn: u16,
}

/// Layer geometry of a layered (multi-part) patch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerLayout {
    /// Number of stacked layers
    pub count: usize,
    /// Byte distance between consecutive layers' parameter blocks
    pub stride: usize,
    /// NRPN distance between consecutive layers (0 = same numbers)
    #[serde(default)]
    pub nrpn_stride: u16,
}

fn default_len() -> usize {
    1
}

/// Immutable metadata for one named parameter
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamDescriptor {
    /// Unique name within the catalog
    pub name: String,
    pub kind: ParamKind,
    /// Byte offset within the patch (within layer 0 for per-layer parameters)
    pub offset: usize,
    /// Byte length: 1 for scalars, element count for arrays
    #[serde(default = "default_len")]
    pub len: usize,
    /// Addressable per layer (offset shifts by the layer stride)
    #[serde(default)]
    pub per_layer: bool,
    /// Value names for lookup kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<Vec<String>>,
    /// Present when the device accepts live value updates for this parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_edit: Option<LiveEditSpec>,
}

impl ParamDescriptor {
    /// Byte range covered in layer 0
    pub fn range(&self) -> ByteRange {
        ByteRange {
            offset: self.offset,
            len: self.len,
        }
    }
}

/// Serde schema for a catalog YAML document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogSpec {
    /// Device/model name, e.g. "Prophet Rev2"
    pub name: String,
    /// Total patch size in bytes
    pub patch_size: usize,
    /// Where the whole-patch name lives, if the patch stores one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_range: Option<ByteRange>,
    /// Layer geometry for layered patches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<LayerLayout>,
    /// Per-layer name location, relative to the layer's block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_name_range: Option<ByteRange>,
    pub params: Vec<ParamDescriptor>,
}

/// Parameter catalog for one synth model
///
/// Built once from a [`CatalogSpec`], immutable thereafter; shared
/// read-only by every attribute access via `Arc`.
#[derive(Debug)]
pub struct ParamCatalog {
    name: String,
    patch_size: usize,
    params: Vec<Arc<ParamDescriptor>>,
    by_name: HashMap<String, usize>,
    name_range: Option<ByteRange>,
    layers: Option<LayerLayout>,
    layer_name_range: Option<ByteRange>,
}

impl ParamCatalog {
    /// Build and validate a catalog from its spec
    pub fn new(spec: CatalogSpec) -> anyhow::Result<Self> {
        let mut by_name = HashMap::with_capacity(spec.params.len());
        let mut params = Vec::with_capacity(spec.params.len());

        for descriptor in spec.params {
            if descriptor.len == 0 {
                anyhow::bail!("parameter '{}' has zero length", descriptor.name);
            }
            if !descriptor.kind.is_array() && descriptor.len != 1 {
                anyhow::bail!(
                    "scalar parameter '{}' has length {}",
                    descriptor.name,
                    descriptor.len
                );
            }
            if descriptor.kind.uses_lookup() && descriptor.lookup.is_none() {
                anyhow::bail!("lookup parameter '{}' has no lookup table", descriptor.name);
            }

            let layout = if descriptor.per_layer {
                Some(spec.layers.ok_or_else(|| {
                    anyhow::anyhow!(
                        "per-layer parameter '{}' in a catalog without layers",
                        descriptor.name
                    )
                })?)
            } else {
                None
            };
            let end = worst_case_end(descriptor.range(), layout).ok_or_else(|| {
                anyhow::anyhow!("parameter '{}' byte range overflows", descriptor.name)
            })?;
            if end > spec.patch_size {
                anyhow::bail!(
                    "parameter '{}' extends past patch size ({} > {})",
                    descriptor.name,
                    end,
                    spec.patch_size
                );
            }

            if by_name
                .insert(descriptor.name.clone(), params.len())
                .is_some()
            {
                anyhow::bail!("duplicate parameter name '{}'", descriptor.name);
            }
            params.push(Arc::new(descriptor));
        }

        if let Some(layout) = spec.layers {
            if layout.count == 0 {
                anyhow::bail!("layer count must be at least 1");
            }
            let span = layout.stride.checked_mul(layout.count);
            if span.is_none() || span > Some(spec.patch_size) {
                anyhow::bail!("layer layout extends past patch size");
            }
        }

        if let Some(range) = spec.name_range {
            let end = worst_case_end(range, None)
                .ok_or_else(|| anyhow::anyhow!("name range overflows"))?;
            if end > spec.patch_size {
                anyhow::bail!("name range extends past patch size");
            }
        }

        if let Some(range) = spec.layer_name_range {
            let layout = spec
                .layers
                .ok_or_else(|| anyhow::anyhow!("layer name range in a catalog without layers"))?;
            let end = worst_case_end(range, Some(layout))
                .ok_or_else(|| anyhow::anyhow!("layer name range overflows"))?;
            if end > spec.patch_size {
                anyhow::bail!(
                    "layer name range extends past patch size ({} > {})",
                    end,
                    spec.patch_size
                );
            }
        }

        Ok(Self {
            name: spec.name,
            patch_size: spec.patch_size,
            params,
            by_name,
            name_range: spec.name_range,
            layers: spec.layers,
            layer_name_range: spec.layer_name_range,
        })
    }

    /// Parse a YAML catalog document
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let spec: CatalogSpec = serde_yaml::from_str(yaml)?;
        Self::new(spec)
    }

    /// Device/model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Patch size in bytes
    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    pub fn name_range(&self) -> Option<ByteRange> {
        self.name_range
    }

    pub fn layers(&self) -> Option<LayerLayout> {
        self.layers
    }

    pub fn layer_name_range(&self) -> Option<ByteRange> {
        self.layer_name_range
    }

    /// Look up a descriptor by name
    ///
    /// Scripting hosts tend to write `cutoff_frequency` for a
    /// parameter named "cutoff frequency", so a miss retries with
    /// underscores replaced by spaces before failing.
    pub fn find(&self, name: &str) -> Result<Arc<ParamDescriptor>, Error> {
        if let Some(&idx) = self.by_name.get(name) {
            return Ok(self.params[idx].clone());
        }
        let normalized = name.replace('_', " ");
        if let Some(&idx) = self.by_name.get(&normalized) {
            return Ok(self.params[idx].clone());
        }
        Err(Error::UnknownParameter(name.to_string()))
    }

    /// All descriptors in catalog order
    pub fn params(&self) -> impl Iterator<Item = &Arc<ParamDescriptor>> {
        self.params.iter()
    }

    /// All parameter names in catalog order
    pub fn parameter_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }

    /// Capabilities a descriptor supports within this catalog
    pub fn capabilities_of(&self, descriptor: &ParamDescriptor) -> Vec<Capability> {
        let mut caps = Vec::with_capacity(3);
        if descriptor.kind.is_array() {
            caps.push(Capability::Vector);
        } else {
            caps.push(Capability::Int);
        }
        if descriptor.live_edit.is_some() {
            caps.push(Capability::LiveEdit);
        }
        if descriptor.per_layer && self.layers.is_some() {
            caps.push(Capability::MultiLayer);
        }
        caps
    }

    /// Non-failing capability probe
    pub fn supports(&self, descriptor: &ParamDescriptor, capability: Capability) -> bool {
        match capability {
            Capability::Int => !descriptor.kind.is_array(),
            Capability::Vector => descriptor.kind.is_array(),
            Capability::LiveEdit => descriptor.live_edit.is_some(),
            Capability::MultiLayer => descriptor.per_layer && self.layers.is_some(),
        }
    }
}

/// End offset of a range in its last layer, None on overflow
///
/// Load-time validation must reject absurd offsets instead of
/// panicking on them, so all arithmetic here is checked.
fn worst_case_end(range: ByteRange, layout: Option<LayerLayout>) -> Option<usize> {
    let end = range.offset.checked_add(range.len)?;
    match layout {
        Some(layout) => {
            let shift = layout.stride.checked_mul(layout.count.saturating_sub(1))?;
            end.checked_add(shift)
        }
        None => Some(end),
    }
}

/// Default directory for per-device catalog files
pub fn default_catalog_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patchrig")
        .join("catalogs")
}

/// Load a catalog from a YAML file
pub fn load_catalog(path: &Path) -> anyhow::Result<ParamCatalog> {
    log::info!("load_catalog: Loading from {:?}", path);
    let contents = std::fs::read_to_string(path)?;
    let catalog = ParamCatalog::from_yaml(&contents)?;
    log::info!(
        "load_catalog: Loaded '{}' ({} parameters, {} bytes/patch)",
        catalog.name(),
        catalog.params.len(),
        catalog.patch_size()
    );
    Ok(catalog)
}
