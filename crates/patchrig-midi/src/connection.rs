//! midir-backed transport
//!
//! Uses midir for cross-platform MIDI I/O (ALSA on Linux, CoreMIDI on
//! macOS, WinMM on Windows). The input connection is opened once with
//! sysex reception enabled; output connections are opened lazily per
//! port name and cached for reuse. Port patterns are matched
//! case-insensitively as substrings of port names.

use crate::transport::{
    MessageCallback, MessageDispatcher, MidiTransport, SubscriptionToken, TransportError,
};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use patchrig_core::MidiMessage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const CLIENT_NAME: &str = "patchrig";

/// Real MIDI transport over midir
pub struct MidirTransport {
    dispatcher: Arc<MessageDispatcher>,
    /// Kept alive for the duration; messages arrive via the callback.
    /// The mutex is never contended, it only makes the handle shareable.
    _input: Mutex<MidiInputConnection<Arc<MessageDispatcher>>>,
    /// Output connections opened so far, by resolved port name
    outputs: Mutex<HashMap<String, MidiOutputConnection>>,
}

impl MidirTransport {
    /// Connect the inbound side to the first input port matching the pattern
    pub fn connect(port_match: &str) -> Result<Self, TransportError> {
        let pattern = port_match.to_lowercase();

        let mut midi_in = MidiInput::new(CLIENT_NAME)
            .map_err(|e| TransportError::InputInitError(e.to_string()))?;
        // Sysex is filtered out by default; we live on it
        midi_in.ignore(Ignore::None);

        let in_ports = midi_in.ports();
        if in_ports.is_empty() {
            return Err(TransportError::NoInputPorts);
        }

        let input_port = in_ports
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| TransportError::PortNotFound(port_match.to_string()))?;

        let port_name = midi_in
            .port_name(&input_port)
            .map_err(|e| TransportError::PortInfoError(e.to_string()))?;
        log::info!("MIDI: Found input port: {}", port_name);

        let dispatcher = Arc::new(MessageDispatcher::new());
        let input = midi_in
            .connect(
                &input_port,
                "patchrig-input",
                Self::midi_callback,
                dispatcher.clone(),
            )
            .map_err(|e| TransportError::ConnectionError(e.to_string()))?;

        Ok(Self {
            dispatcher,
            _input: Mutex::new(input),
            outputs: Mutex::new(HashMap::new()),
        })
    }

    /// The midir callback: runs on the MIDI driver thread, must be fast
    fn midi_callback(_timestamp: u64, data: &[u8], dispatcher: &mut Arc<MessageDispatcher>) {
        if data.is_empty() {
            return;
        }
        let message = MidiMessage::new(data.to_vec());
        log::trace!("[MIDI IN] {:?}", message);
        dispatcher.dispatch(&message);
    }

    /// List all available MIDI input ports
    pub fn list_input_ports() -> Result<Vec<String>, TransportError> {
        let midi_in = MidiInput::new(CLIENT_NAME)
            .map_err(|e| TransportError::InputInitError(e.to_string()))?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    /// List all available MIDI output ports
    pub fn list_output_ports() -> Result<Vec<String>, TransportError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| TransportError::OutputInitError(e.to_string()))?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect())
    }

    /// Open a connection to the first output port matching the pattern
    fn open_output(port_match: &str) -> Result<MidiOutputConnection, TransportError> {
        let pattern = port_match.to_lowercase();

        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| TransportError::OutputInitError(e.to_string()))?;

        let out_ports = midi_out.ports();
        let output_port = out_ports
            .iter()
            .find(|port| {
                midi_out
                    .port_name(port)
                    .map(|name| name.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            })
            .ok_or_else(|| TransportError::PortNotFound(port_match.to_string()))?;

        let port_name = midi_out
            .port_name(output_port)
            .map_err(|e| TransportError::PortInfoError(e.to_string()))?;
        log::info!("MIDI: Connected to output port: {}", port_name);

        midi_out
            .connect(output_port, "patchrig-output")
            .map_err(|e| TransportError::ConnectionError(e.to_string()))
    }
}

impl MidiTransport for MidirTransport {
    fn output_ports(&self) -> Vec<String> {
        Self::list_output_ports().unwrap_or_default()
    }

    fn send(&self, port: &str, messages: &[MidiMessage]) -> Result<(), TransportError> {
        let mut outputs = self
            .outputs
            .lock()
            .map_err(|_| TransportError::SendError("output table poisoned".to_string()))?;

        if !outputs.contains_key(port) {
            let connection = Self::open_output(port)?;
            outputs.insert(port.to_string(), connection);
        }
        let connection = outputs
            .get_mut(port)
            .ok_or_else(|| TransportError::PortNotFound(port.to_string()))?;

        for message in messages {
            connection
                .send(message.bytes())
                .map_err(|e| TransportError::SendError(e.to_string()))?;
        }
        Ok(())
    }

    fn subscribe(&self, callback: MessageCallback) -> SubscriptionToken {
        self.dispatcher.register(callback)
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        if !self.dispatcher.deregister(token) {
            log::debug!("MIDI: Unsubscribe for unknown token {:?}", token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ports() {
        // Just verifies port enumeration doesn't crash; availability is
        // system-dependent
        let _input_ports = MidirTransport::list_input_ports();
        let _output_ports = MidirTransport::list_output_ports();
    }
}
