//! MIDI transport and device communication for patchrig
//!
//! This crate owns everything that touches a wire: the
//! [`MidiTransport`] abstraction with its midir-backed implementation,
//! the blocking [`MidiRequest`] transaction used for request/reply
//! exchanges, per-model device adapters, and the [`SynthSession`]
//! façade that ties transport and adapter together.
//!
//! The in-memory patch model lives in `patchrig-core`; nothing there
//! depends on this crate. Live edits flow the other way through the
//! `LiveEditSink` trait, which [`SynthSession`] implements.

pub mod connection;
pub mod device;
pub mod request;
pub mod session;
pub mod sysex;
pub mod transport;

pub use connection::MidirTransport;
pub use device::{
    DetectionCapability, DeviceAdapter, EditBufferCapability, GlobalSettingsCapability,
    ProgramDumpCapability,
};
pub use request::{MidiRequest, DEFAULT_REPLY_TIMEOUT};
pub use session::{DeviceLocation, SynthSession};
pub use sysex::{join_sysex, load_sysex_file, save_sysex_file, split_sysex};
pub use transport::{
    MessageCallback, MessageDispatcher, MidiTransport, SubscriptionToken, TransportError,
};
