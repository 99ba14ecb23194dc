//! Typed attribute access to one parameter of one patch
//!
//! An [`Attribute`] binds a resolved descriptor to a patch, optionally
//! pinned to one layer. The layer is fixed at construction: every
//! subsequent byte-range computation targets that layer's sub-range,
//! so a single accessor never switches layers over its lifetime.

use crate::catalog::{ByteRange, Capability, ParamDescriptor, ParamKind};
use crate::error::Error;
use crate::patch::Patch;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// A parameter value: scalar integer or integer array
///
/// Booleans are carried as 0/1 integers at this layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Array(Vec<i64>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&[i64]> {
        match self {
            Value::Int(_) => None,
            Value::Array(values) => Some(values),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(if v { 1 } else { 0 })
    }
}

impl From<Vec<i64>> for Value {
    fn from(values: Vec<i64>) -> Self {
        Value::Array(values)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Accessor for one parameter of one patch
///
/// Ephemeral: created per lookup, does not own the patch.
pub struct Attribute {
    patch: Arc<Mutex<Patch>>,
    descriptor: Arc<ParamDescriptor>,
    layer: Option<usize>,
}

impl Attribute {
    /// Bind a descriptor to a patch with no layer pinned
    ///
    /// Per-layer parameters accessed without a pinned layer target
    /// layer 0.
    pub fn bind(patch: Arc<Mutex<Patch>>, descriptor: Arc<ParamDescriptor>) -> Self {
        Self {
            patch,
            descriptor,
            layer: None,
        }
    }

    /// Bind a descriptor pinned to one layer
    ///
    /// Fails with `UnsupportedCapability` for descriptors that are not
    /// addressable per layer, and `InvalidLayer` for layers past the
    /// patch's layer count.
    pub fn bind_layer(
        patch: Arc<Mutex<Patch>>,
        descriptor: Arc<ParamDescriptor>,
        layer: usize,
    ) -> Result<Self, Error> {
        {
            let guard = lock_patch(&patch)?;
            if !guard
                .catalog()
                .supports(&descriptor, Capability::MultiLayer)
            {
                return Err(Error::UnsupportedCapability(format!(
                    "parameter '{}' does not support multi-layer access",
                    descriptor.name
                )));
            }
            let count = guard.layer_count();
            if layer >= count {
                return Err(Error::InvalidLayer { layer, count });
            }
        }
        Ok(Self {
            patch,
            descriptor,
            layer: Some(layer),
        })
    }

    pub fn descriptor(&self) -> &Arc<ParamDescriptor> {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// The layer pinned at construction, if any
    pub fn layer(&self) -> Option<usize> {
        self.layer
    }

    /// Read the current value from the patch
    pub fn get(&self) -> Result<Value, Error> {
        let patch = lock_patch(&self.patch)?;
        if self.descriptor.kind.is_array() {
            if !patch.catalog().supports(&self.descriptor, Capability::Vector) {
                return Err(Error::CapabilityMissing("vector parameter access"));
            }
            let bytes = patch.read_range(self.resolve_range(&patch)?)?;
            Ok(Value::Array(bytes.iter().map(|&b| b as i64).collect()))
        } else {
            if !patch.catalog().supports(&self.descriptor, Capability::Int) {
                return Err(Error::CapabilityMissing("integer parameter access"));
            }
            let bytes = patch.read_range(self.resolve_range(&patch)?)?;
            let byte = bytes.first().ok_or_else(|| {
                Error::InternalInconsistency(format!(
                    "empty byte range for parameter '{}'",
                    self.descriptor.name
                ))
            })?;
            Ok(Value::Int(*byte as i64))
        }
    }

    /// Write a new value into the patch
    ///
    /// Array values are length-checked before any byte is written, so
    /// a failed set never leaves a partial write behind.
    pub fn set(&self, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();
        let mut patch = lock_patch(&self.patch)?;
        match value {
            Value::Int(v) => {
                if !patch.catalog().supports(&self.descriptor, Capability::Int) {
                    return Err(Error::CapabilityMissing("integer parameter access"));
                }
                let byte = match self.descriptor.kind {
                    ParamKind::Bool => u8::from(v != 0),
                    _ => v.clamp(0, u8::MAX as i64) as u8,
                };
                let range = self.resolve_range(&patch)?;
                patch.write_range(range, &[byte])
            }
            Value::Array(values) => {
                if !patch.catalog().supports(&self.descriptor, Capability::Vector) {
                    return Err(Error::CapabilityMissing("vector parameter access"));
                }
                if values.len() != self.descriptor.len {
                    return Err(Error::LengthMismatch {
                        expected: self.descriptor.len,
                        actual: values.len(),
                    });
                }
                let bytes: Vec<u8> = values
                    .iter()
                    .map(|&v| v.clamp(0, u8::MAX as i64) as u8)
                    .collect();
                let range = self.resolve_range(&patch)?;
                patch.write_range(range, &bytes)
            }
        }
    }

    /// Textual rendering of the current value
    ///
    /// Tolerant introspection path: unreadable values and lookup
    /// indices outside the table render as a placeholder instead of
    /// failing.
    pub fn as_text(&self) -> String {
        let value = match self.get() {
            Ok(value) => value,
            Err(_) => return "unknown".to_string(),
        };
        match (&value, self.descriptor.kind) {
            (Value::Int(v), ParamKind::Bool) => {
                if *v != 0 { "on" } else { "off" }.to_string()
            }
            (Value::Int(v), ParamKind::Lookup) => self.lookup_text(*v),
            (Value::Array(values), ParamKind::LookupArray) => {
                let rendered: Vec<String> =
                    values.iter().map(|&v| self.lookup_text(v)).collect();
                format!("[{}]", rendered.join(", "))
            }
            _ => value.to_string(),
        }
    }

    fn lookup_text(&self, value: i64) -> String {
        self.descriptor
            .lookup
            .as_ref()
            .and_then(|table| usize::try_from(value).ok().and_then(|i| table.get(i)))
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Effective byte range, shifted to the pinned layer if any
    fn resolve_range(&self, patch: &Patch) -> Result<ByteRange, Error> {
        let mut offset = self.descriptor.offset;
        if let Some(layer) = self.layer {
            let layout = patch.catalog().layers().ok_or(Error::NotLayered)?;
            offset += layer * layout.stride;
        }
        Ok(ByteRange {
            offset,
            len: self.descriptor.len,
        })
    }
}

/// Lock the patch, mapping poisoning to a program-error report
pub(crate) fn lock_patch(patch: &Arc<Mutex<Patch>>) -> Result<MutexGuard<'_, Patch>, Error> {
    patch
        .lock()
        .map_err(|_| Error::InternalInconsistency("patch lock poisoned".to_string()))
}
