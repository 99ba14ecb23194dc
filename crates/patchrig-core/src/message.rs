//! Owned MIDI message bytes
//!
//! The core never interprets a manufacturer's sysex encoding; it only
//! needs to carry messages between the patch layer (live-edit
//! updates), the transport, and the persistence helpers. A message is
//! an owned byte vector with a few structural queries.

use std::fmt;

/// One complete MIDI message (channel voice or sysex)
#[derive(Clone, PartialEq, Eq)]
pub struct MidiMessage {
    bytes: Vec<u8>,
}

impl MidiMessage {
    /// Wrap raw message bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Build a sysex message from its payload (F0/F7 framing added)
    pub fn sysex(payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(payload.len() + 2);
        bytes.push(0xF0);
        bytes.extend_from_slice(payload);
        bytes.push(0xF7);
        Self { bytes }
    }

    /// Build a Control Change message
    pub fn cc(channel: u8, controller: u8, value: u8) -> Self {
        Self {
            bytes: vec![0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
        }
    }

    /// Raw message bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into the raw byte vector
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check for a complete F0..F7 sysex frame
    pub fn is_sysex(&self) -> bool {
        self.bytes.len() >= 2
            && self.bytes.first() == Some(&0xF0)
            && self.bytes.last() == Some(&0xF7)
    }

    /// Payload between the F0/F7 framing bytes (None for non-sysex)
    pub fn sysex_payload(&self) -> Option<&[u8]> {
        if self.is_sysex() {
            Some(&self.bytes[1..self.bytes.len() - 1])
        } else {
            None
        }
    }
}

impl fmt::Debug for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hex dump, truncated for long sysex dumps
        write!(f, "MidiMessage[{}](", self.bytes.len())?;
        for (i, b) in self.bytes.iter().take(16).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        if self.bytes.len() > 16 {
            write!(f, " ..")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<u8>> for MidiMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}
