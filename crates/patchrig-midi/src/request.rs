//! Bounded synchronous request/reply over an asynchronous transport
//!
//! A [`MidiRequest`] sends a request on a named output and blocks the
//! caller until a predicate-matched reply arrives or the timeout
//! elapses. The wait is a real blocking receive on a flume channel
//! (the delivery callback wakes it), never a spin loop.
//!
//! Ordering invariant: the reply listener is registered *before* the
//! request is sent, so a device that answers faster than `send`
//! returns cannot slip past us. Cleanup invariant: the registration is
//! removed exactly once on every exit path (match, timeout, send
//! error), enforced by an RAII guard.

use crate::transport::{MidiTransport, SubscriptionToken};
use patchrig_core::{Error, MidiMessage};
use std::time::{Duration, Instant};

/// Default bound on one request/reply exchange
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(2000);

/// One request-then-wait-for-matching-reply exchange
pub struct MidiRequest<'a> {
    transport: &'a dyn MidiTransport,
    output_port: String,
    request: Vec<MidiMessage>,
    timeout: Duration,
}

/// Deregisters the listener on drop, on success and failure alike
struct SubscriptionGuard<'a> {
    transport: &'a dyn MidiTransport,
    token: SubscriptionToken,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        self.transport.unsubscribe(self.token);
    }
}

impl<'a> MidiRequest<'a> {
    pub fn new(
        transport: &'a dyn MidiTransport,
        output_port: impl Into<String>,
        request: Vec<MidiMessage>,
    ) -> Self {
        Self {
            transport,
            output_port: output_port.into(),
            request,
            timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send the request and block until the first matching reply
    ///
    /// Only the first match is taken; the listener is removed
    /// immediately afterwards, so later matches go to nobody. Fails
    /// with `Error::Timeout` when no match arrives within the bound.
    pub fn block_for_reply<P>(self, predicate: P) -> Result<MidiMessage, Error>
    where
        P: Fn(&MidiMessage) -> bool + Send + 'static,
    {
        let (reply_tx, reply_rx) = flume::bounded::<MidiMessage>(1);

        let token = self.transport.subscribe(Box::new(move |message| {
            if predicate(message) {
                // Full channel means a match already won; drop extras
                let _ = reply_tx.try_send(message.clone());
            }
        }));
        let _guard = SubscriptionGuard {
            transport: self.transport,
            token,
        };

        self.transport
            .send(&self.output_port, &self.request)
            .map_err(|e| Error::Transport(e.to_string()))?;

        let deadline = Instant::now() + self.timeout;
        reply_rx.recv_deadline(deadline).map_err(|_| {
            log::debug!(
                "MidiRequest: No matching reply on '{}' within {:?}",
                self.output_port,
                self.timeout
            );
            Error::Timeout
        })
    }
}
