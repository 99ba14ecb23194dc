//! Synth patch model and typed parameter access
//!
//! This crate provides:
//! - A parameter catalog: immutable, named, typed descriptors with
//!   per-descriptor capability probing (integer, vector, live-edit,
//!   multi-layer)
//! - Byte-addressed patch storage with stored-name handling
//! - Attribute accessors: name-based get/set dispatched through the
//!   descriptor's capabilities
//! - Layered patch views that redirect access to one layer's sub-range
//! - NRPN live-edit message generation for connected devices
//! - Typed property sets for device global settings
//!
//! # Architecture
//!
//! ```text
//! PatchView → Attribute → ParamCatalog → Patch bytes
//!     └─ weak LiveEditSink (owning session) → device updates
//! ```
//!
//! Transport, request/reply transactions, and the session façade live
//! in the `patchrig-midi` crate; this crate is pure data and never
//! touches a MIDI port.

mod accessor;
mod catalog;
mod error;
mod live_edit;
mod message;
mod patch;
mod property;
mod view;

pub use accessor::{Attribute, Value};
pub use catalog::{
    default_catalog_dir, load_catalog, ByteRange, Capability, CatalogSpec, LayerLayout,
    LiveEditSpec, ParamCatalog, ParamDescriptor, ParamKind,
};
pub use error::Error;
pub use live_edit::value_update_messages;
pub use message::MidiMessage;
pub use patch::Patch;
pub use property::{Property, PropertySet, PropertyValue};
pub use view::{LiveEditSink, PatchView};
