//! Device adapter capabilities
//!
//! A device adapter owns one synth model's wire encoding: how to ask
//! for dumps, how to recognize replies, and how to turn sysex into
//! patches. Each capability is probed through an `Option`-returning
//! query; adapters implement only what their hardware supports and
//! callers branch on presence instead of catching failures.

use patchrig_core::{Error, MidiMessage, ParamCatalog, Patch, Property};
use std::sync::Arc;

/// Responds to a device inquiry (used by auto-detection)
pub trait DetectionCapability: Send + Sync {
    /// Inquiry message(s) broadcast on each candidate output port
    fn inquiry(&self) -> Vec<MidiMessage>;

    /// The resolved MIDI channel if this message is the device's
    /// inquiry reply, None otherwise
    fn matches_inquiry_reply(&self, message: &MidiMessage) -> Option<u8>;
}

/// Can dump and restore the currently-active (unsaved) patch
pub trait EditBufferCapability: Send + Sync {
    fn request_dump(&self, channel: u8) -> Vec<MidiMessage>;

    fn is_edit_buffer_dump(&self, message: &MidiMessage) -> bool;

    /// Serialize a patch as an edit-buffer dump
    fn patch_to_sysex(&self, patch: &Patch) -> Vec<MidiMessage>;
}

/// Can serialize patches as numbered program dumps (bulk save)
pub trait ProgramDumpCapability: Send + Sync {
    fn patch_to_program_dump(&self, patch: &Patch, program: u32) -> Vec<MidiMessage>;
}

/// Can dump its global settings block
pub trait GlobalSettingsCapability: Send + Sync {
    fn request_dump(&self, channel: u8) -> Vec<MidiMessage>;

    fn is_settings_dump(&self, message: &MidiMessage) -> bool;

    /// Decode the settings dump into typed named properties
    fn parse_settings(&self, message: &MidiMessage) -> Result<Vec<Property>, Error>;
}

/// One synth model: its catalog, its codec, and its optional capabilities
pub trait DeviceAdapter: Send + Sync {
    /// Model name, e.g. "Prophet Rev2"
    fn name(&self) -> &str;

    fn catalog(&self) -> Arc<ParamCatalog>;

    /// Decode patches from sysex messages; unrecognized messages are
    /// skipped, so an unusable stream yields an empty vector
    fn load_sysex(&self, messages: &[MidiMessage]) -> Vec<Patch>;

    fn detection(&self) -> Option<&dyn DetectionCapability> {
        None
    }

    fn edit_buffer(&self) -> Option<&dyn EditBufferCapability> {
        None
    }

    fn program_dump(&self) -> Option<&dyn ProgramDumpCapability> {
        None
    }

    fn global_settings(&self) -> Option<&dyn GlobalSettingsCapability> {
        None
    }
}
