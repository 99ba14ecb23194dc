//! Sysex byte-stream and file persistence
//!
//! Pure transformations between serialized byte streams and message
//! lists, plus thin file helpers. No device knowledge lives here;
//! decoding message payloads into patches is the adapter's job.

use patchrig_core::{Error, MidiMessage};
use std::path::Path;

/// Split a raw byte stream into complete sysex messages
///
/// Bytes outside F0..F7 frames are skipped (some .syx files carry
/// stray realtime bytes); an unterminated trailing frame is dropped
/// with a warning.
pub fn split_sysex(bytes: &[u8]) -> Vec<MidiMessage> {
    let mut messages = Vec::new();
    let mut current: Option<Vec<u8>> = None;

    for &byte in bytes {
        match byte {
            0xF0 => {
                if current.is_some() {
                    log::warn!("split_sysex: Unterminated sysex frame dropped");
                }
                current = Some(vec![0xF0]);
            }
            0xF7 => {
                if let Some(mut frame) = current.take() {
                    frame.push(0xF7);
                    messages.push(MidiMessage::new(frame));
                }
            }
            _ => {
                if let Some(frame) = current.as_mut() {
                    frame.push(byte);
                }
            }
        }
    }

    if current.is_some() {
        log::warn!("split_sysex: Trailing unterminated sysex frame dropped");
    }
    messages
}

/// Concatenate messages back into a raw byte stream
pub fn join_sysex(messages: &[MidiMessage]) -> Vec<u8> {
    let total: usize = messages.iter().map(|m| m.len()).sum();
    let mut bytes = Vec::with_capacity(total);
    for message in messages {
        bytes.extend_from_slice(message.bytes());
    }
    bytes
}

/// Load all sysex messages from a .syx file
pub fn load_sysex_file(path: &Path) -> Result<Vec<MidiMessage>, Error> {
    let bytes = std::fs::read(path)?;
    let messages = split_sysex(&bytes);
    log::info!(
        "load_sysex_file: {} message(s) from {:?} ({} bytes)",
        messages.len(),
        path,
        bytes.len()
    );
    Ok(messages)
}

/// Write messages to a .syx file
pub fn save_sysex_file(path: &Path, messages: &[MidiMessage]) -> Result<(), Error> {
    std::fs::write(path, join_sysex(messages))?;
    log::info!(
        "save_sysex_file: {} message(s) to {:?}",
        messages.len(),
        path
    );
    Ok(())
}
