//! Transport abstraction and inbound message dispatch
//!
//! A transport exposes named output ports for sending and a
//! subscribable inbound stream. Subscriptions are registered from the
//! caller thread while delivery happens on the transport's own thread
//! (the midir driver callback for real hardware), so the listener
//! registry is the one concurrently-shared structure in this crate.

use patchrig_core::MidiMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Error type for transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInitError(String),

    #[error("Failed to initialize MIDI output: {0}")]
    OutputInitError(String),

    #[error("No MIDI input ports available")]
    NoInputPorts,

    #[error("No MIDI port found matching pattern: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    ConnectionError(String),

    #[error("Failed to send MIDI message: {0}")]
    SendError(String),

    #[error("Failed to get port info: {0}")]
    PortInfoError(String),
}

/// Inbound message listener, invoked on the delivery thread
pub type MessageCallback = Box<dyn Fn(&MidiMessage) + Send + 'static>;

/// Handle for one registered listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// A MIDI transport: named outputs plus a subscribable inbound stream
pub trait MidiTransport: Send + Sync {
    /// Names of the currently available output ports
    fn output_ports(&self) -> Vec<String>;

    /// Send messages on a named output port
    fn send(&self, port: &str, messages: &[MidiMessage]) -> Result<(), TransportError>;

    /// Register an inbound listener; the callback runs on the delivery thread
    fn subscribe(&self, callback: MessageCallback) -> SubscriptionToken;

    /// Remove a listener; safe to call from any thread
    fn unsubscribe(&self, token: SubscriptionToken);
}

/// Thread-safe listener registry shared by transport implementations
///
/// Callbacks run with the registry lock held, so they must not call
/// back into register/deregister; the request layer's callbacks only
/// push into a channel.
#[derive(Default)]
pub struct MessageDispatcher {
    listeners: Mutex<Vec<(SubscriptionToken, MessageCallback)>>,
    next_token: AtomicU64,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, callback: MessageCallback) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((token, callback));
        }
        token
    }

    /// Remove a listener; returns false if the token was already gone
    pub fn deregister(&self, token: SubscriptionToken) -> bool {
        if let Ok(mut listeners) = self.listeners.lock() {
            let before = listeners.len();
            listeners.retain(|(t, _)| *t != token);
            return listeners.len() != before;
        }
        false
    }

    /// Deliver one inbound message to every registered listener
    pub fn dispatch(&self, message: &MidiMessage) {
        if let Ok(listeners) = self.listeners.lock() {
            for (_, callback) in listeners.iter() {
                callback(message);
            }
        }
    }

    /// Number of live registrations (used to verify leak-freedom in tests)
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}
