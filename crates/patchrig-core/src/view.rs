//! Layered patch view
//!
//! A [`PatchView`] wraps a shared patch plus an optional layer index
//! and redirects attribute and naming operations to the right
//! layer-aware path. Multiple views may coexist over one patch; none
//! owns it exclusively. A view optionally carries a weak reference to
//! the session that produced it so value changes can be mirrored to
//! the live device.

use crate::accessor::{lock_patch, Attribute, Value};
use crate::catalog::{Capability, ParamDescriptor};
use crate::error::Error;
use crate::live_edit;
use crate::message::MidiMessage;
use crate::patch::Patch;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, Weak};

/// Live-edit routing target, implemented by the owning synth session
///
/// The view holds this weakly: the session may be gone by the time a
/// write happens, and a dead or channel-less sink simply disables the
/// live path.
pub trait LiveEditSink: Send + Sync {
    /// Currently-resolved MIDI channel; None while no device is known
    fn channel(&self) -> Option<u8>;

    /// Forward update messages to the device
    ///
    /// Send failures are the sink's to log; they never propagate back
    /// into the patch write.
    fn send_updates(&self, messages: &[MidiMessage]);
}

/// Name-based view over a shared patch, optionally scoped to a layer
#[derive(Clone)]
pub struct PatchView {
    patch: Arc<Mutex<Patch>>,
    layer: Option<usize>,
    live: Option<Weak<dyn LiveEditSink>>,
}

impl PatchView {
    /// Wrap a patch with no live connection
    pub fn new(patch: Patch) -> Self {
        Self {
            patch: Arc::new(Mutex::new(patch)),
            layer: None,
            live: None,
        }
    }

    /// Wrap a shared patch with a live-edit route back to its session
    pub fn with_live(patch: Arc<Mutex<Patch>>, live: Weak<dyn LiveEditSink>) -> Self {
        Self {
            patch,
            layer: None,
            live: Some(live),
        }
    }

    /// Shared handle to the underlying patch
    pub fn patch(&self) -> Arc<Mutex<Patch>> {
        self.patch.clone()
    }

    /// The layer this view is scoped to, if any
    pub fn layer_index(&self) -> Option<usize> {
        self.layer
    }

    /// Bind an accessor for a named parameter
    ///
    /// The view's layer, if any, is pinned into the accessor.
    pub fn attribute(&self, name: &str) -> Result<Attribute, Error> {
        let descriptor = self.find(name)?;
        match self.layer {
            Some(layer) => Attribute::bind_layer(self.patch.clone(), descriptor, layer),
            None => Ok(Attribute::bind(self.patch.clone(), descriptor)),
        }
    }

    /// Read a parameter value by name
    pub fn get_attr(&self, name: &str) -> Result<Value, Error> {
        self.attribute(name)?.get()
    }

    /// Write a parameter value by name
    ///
    /// When a live session is attached and its channel is valid, a
    /// device update is sent in addition to the in-memory write. The
    /// two steps are independent: a failed send is logged by the sink
    /// and the patch keeps the new value.
    pub fn set_attr(&self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();
        let attr = self.attribute(name)?;
        attr.set(value.clone())?;
        self.send_live_update(attr.descriptor(), &value);
        Ok(())
    }

    fn send_live_update(&self, descriptor: &Arc<ParamDescriptor>, value: &Value) {
        let Some(live) = &self.live else { return };
        let Some(sink) = live.upgrade() else { return };
        let Some(channel) = sink.channel() else { return };

        let messages = {
            let patch = match lock_patch(&self.patch) {
                Ok(patch) => patch,
                Err(_) => return,
            };
            let catalog = patch.catalog();
            if !catalog.supports(descriptor, Capability::LiveEdit) {
                return;
            }
            live_edit::value_update_messages(catalog, descriptor, self.layer, value, channel)
        };
        if !messages.is_empty() {
            log::debug!(
                "PatchView: Mirroring '{}' change to device ({} messages)",
                descriptor.name,
                messages.len()
            );
            sink.send_updates(&messages);
        }
    }

    /// Patch name, or the layer's name when scoped to a layer
    pub fn name(&self) -> Result<String, Error> {
        let patch = lock_patch(&self.patch)?;
        match self.layer {
            Some(layer) => patch.layer_name(layer),
            None => patch.name(),
        }
    }

    /// Rename the patch, or the layer when scoped to a layer
    pub fn set_name(&self, name: &str) -> Result<(), Error> {
        let mut patch = lock_patch(&self.patch)?;
        match self.layer {
            Some(layer) => patch.set_layer_name(layer, name),
            None => patch.set_name(name),
        }
    }

    /// A sibling view scoped to one layer of the same patch
    pub fn layer(&self, layer: usize) -> Result<PatchView, Error> {
        let count = {
            let patch = lock_patch(&self.patch)?;
            if !patch.is_layered() {
                return Err(Error::NotLayered);
            }
            patch.layer_count()
        };
        if layer >= count {
            return Err(Error::InvalidLayer { layer, count });
        }
        Ok(Self {
            patch: self.patch.clone(),
            layer: Some(layer),
            live: self.live.clone(),
        })
    }

    /// All parameter names from the underlying catalog
    pub fn parameter_names(&self) -> Result<Vec<String>, Error> {
        let patch = lock_patch(&self.patch)?;
        Ok(patch.catalog().parameter_names())
    }

    /// Multi-line text dump of every parameter's current value
    pub fn describe(&self) -> Result<String, Error> {
        let names = self.parameter_names()?;
        let mut out = String::new();
        match self.name() {
            Ok(name) => {
                let _ = writeln!(out, "Patch: {}", name);
            }
            Err(_) => {
                let _ = writeln!(out, "Patch");
            }
        }
        for name in names {
            let rendered = self.attribute(&name).map(|a| a.as_text());
            if let Ok(text) = rendered {
                let _ = writeln!(out, "  {}: {}", name, text);
            }
        }
        Ok(out)
    }

    fn find(&self, name: &str) -> Result<Arc<ParamDescriptor>, Error> {
        let patch = lock_patch(&self.patch)?;
        patch.catalog().find(name)
    }
}
