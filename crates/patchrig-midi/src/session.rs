//! Synth session façade
//!
//! Combines an injected transport and device adapter into the
//! top-level surface a scripting host talks to: detection state,
//! edit-buffer and global-settings retrieval via blocking
//! transactions, and bulk sysex load/save. The transport handle is
//! constructed by the host and passed in; nothing here is a process
//! global.

use crate::device::DeviceAdapter;
use crate::request::{MidiRequest, DEFAULT_REPLY_TIMEOUT};
use crate::sysex;
use crate::transport::MidiTransport;
use patchrig_core::{Error, LiveEditSink, MidiMessage, Patch, PatchView, PropertySet};
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Per-port bound on the detection inquiry (much shorter than a data
/// transaction; silence just means "not on this port")
const DETECTION_REPLY_TIMEOUT: Duration = Duration::from_millis(400);

/// Where a detected device was found
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceLocation {
    /// Output port the device answers on
    pub output_port: String,
    /// MIDI channel resolved from the inquiry reply
    pub channel: u8,
}

struct SessionInner {
    transport: Arc<dyn MidiTransport>,
    adapter: Arc<dyn DeviceAdapter>,
    location: Mutex<Option<DeviceLocation>>,
    reply_timeout: Duration,
}

/// Top-level session for one synth model over one transport
pub struct SynthSession {
    inner: Arc<SessionInner>,
}

impl SynthSession {
    /// Build a session with the default reply timeout
    pub fn new(transport: Arc<dyn MidiTransport>, adapter: Arc<dyn DeviceAdapter>) -> Self {
        Self::with_reply_timeout(transport, adapter, DEFAULT_REPLY_TIMEOUT)
    }

    /// Build a session with a custom bound on data transactions
    pub fn with_reply_timeout(
        transport: Arc<dyn MidiTransport>,
        adapter: Arc<dyn DeviceAdapter>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                transport,
                adapter,
                location: Mutex::new(None),
                reply_timeout,
            }),
        }
    }

    /// Run device detection over all output ports
    ///
    /// Best-effort: tries each port in turn with a short inquiry
    /// transaction and records the first one that answers. Failures
    /// are logged, never surfaced; check [`detected`](Self::detected)
    /// afterwards.
    pub fn detect(&self) {
        let adapter = &self.inner.adapter;
        let Some(detection) = adapter.detection() else {
            log::warn!(
                "SynthSession: {} has no detection capability",
                adapter.name()
            );
            return;
        };

        let inquiry = detection.inquiry();
        for port in self.inner.transport.output_ports() {
            let matcher = self.inner.adapter.clone();
            let result = MidiRequest::new(&*self.inner.transport, &port, inquiry.clone())
                .with_timeout(DETECTION_REPLY_TIMEOUT)
                .block_for_reply(move |message| {
                    matcher
                        .detection()
                        .map(|d| d.matches_inquiry_reply(message).is_some())
                        .unwrap_or(false)
                });

            match result {
                Ok(reply) => {
                    if let Some(channel) = detection.matches_inquiry_reply(&reply) {
                        log::info!(
                            "SynthSession: Detected {} on '{}' (channel {})",
                            adapter.name(),
                            port,
                            channel
                        );
                        self.set_location(Some(DeviceLocation {
                            output_port: port,
                            channel,
                        }));
                        return;
                    }
                }
                Err(Error::Timeout) => {
                    log::debug!("SynthSession: No inquiry reply on '{}'", port);
                }
                Err(e) => {
                    log::debug!("SynthSession: Detection failed on '{}': {}", port, e);
                }
            }
        }
        log::info!(
            "SynthSession: {} not found, running without a live synth",
            adapter.name()
        );
    }

    /// Whether detection resolved a valid communication channel
    pub fn detected(&self) -> bool {
        self.location().is_some()
    }

    /// Where the device was detected, if anywhere
    pub fn location(&self) -> Option<DeviceLocation> {
        self.inner
            .location
            .lock()
            .ok()
            .and_then(|guard| (*guard).clone())
    }

    /// Human-readable location string
    pub fn location_text(&self) -> String {
        match self.location() {
            Some(location) => format!(
                "MIDI OUT: {}, channel: {}",
                location.output_port, location.channel
            ),
            None => "not detected".to_string(),
        }
    }

    /// Fetch the device's current edit buffer as a live patch view
    pub fn edit_buffer(&self) -> Result<PatchView, Error> {
        let location = self.require_location()?;
        let capability = self
            .inner
            .adapter
            .edit_buffer()
            .ok_or(Error::CapabilityMissing("edit buffer retrieval"))?;

        let request = capability.request_dump(location.channel);
        let matcher = self.inner.adapter.clone();
        let reply = MidiRequest::new(&*self.inner.transport, &location.output_port, request)
            .with_timeout(self.inner.reply_timeout)
            .block_for_reply(move |message| {
                matcher
                    .edit_buffer()
                    .map(|c| c.is_edit_buffer_dump(message))
                    .unwrap_or(false)
            })?;

        let mut patches = self.inner.adapter.load_sysex(std::slice::from_ref(&reply));
        if patches.is_empty() {
            return Err(Error::ParseFailure(
                "edit buffer reply produced no patch".to_string(),
            ));
        }
        Ok(self.view_for(patches.remove(0)))
    }

    /// Fetch the device's global settings as a typed property set
    pub fn global_settings(&self) -> Result<PropertySet, Error> {
        let location = self.require_location()?;
        let capability = self
            .inner
            .adapter
            .global_settings()
            .ok_or(Error::CapabilityMissing("global settings download"))?;

        let request = capability.request_dump(location.channel);
        let matcher = self.inner.adapter.clone();
        let reply = MidiRequest::new(&*self.inner.transport, &location.output_port, request)
            .with_timeout(self.inner.reply_timeout)
            .block_for_reply(move |message| {
                matcher
                    .global_settings()
                    .map(|c| c.is_settings_dump(message))
                    .unwrap_or(false)
            })?;

        let properties = capability.parse_settings(&reply)?;
        Ok(PropertySet::from_properties(properties))
    }

    /// Load all patches from a .syx file
    pub fn load_sysex(&self, path: &Path) -> Result<Vec<PatchView>, Error> {
        let messages = sysex::load_sysex_file(path)?;
        let patches = self.inner.adapter.load_sysex(&messages);
        if patches.is_empty() {
            log::warn!(
                "SynthSession: No {} patches in {:?}",
                self.inner.adapter.name(),
                path
            );
        }
        Ok(patches.into_iter().map(|p| self.view_for(p)).collect())
    }

    /// Save patches to a .syx file as numbered program dumps
    pub fn save_sysex(&self, path: &Path, views: &[PatchView]) -> Result<(), Error> {
        let capability = self
            .inner
            .adapter
            .program_dump()
            .ok_or(Error::CapabilityMissing("program dump"))?;

        let mut messages = Vec::new();
        for (program, view) in views.iter().enumerate() {
            let patch = view.patch();
            let guard = lock(&patch)?;
            messages.extend(capability.patch_to_program_dump(&guard, program as u32));
        }
        sysex::save_sysex_file(path, &messages)
    }

    /// Save one patch to a .syx file as an edit-buffer dump
    pub fn save_edit_buffer(&self, path: &Path, view: &PatchView) -> Result<(), Error> {
        let capability = self
            .inner
            .adapter
            .edit_buffer()
            .ok_or(Error::CapabilityMissing("edit buffer retrieval"))?;

        let patch = view.patch();
        let messages = {
            let guard = lock(&patch)?;
            capability.patch_to_sysex(&guard)
        };
        sysex::save_sysex_file(path, &messages)
    }

    /// Wrap a detached patch so its writes route live edits through
    /// this session
    pub fn view_for(&self, patch: Patch) -> PatchView {
        let shared = Arc::new(Mutex::new(patch));
        let sink = Arc::downgrade(&self.inner) as Weak<dyn LiveEditSink>;
        PatchView::with_live(shared, sink)
    }

    fn require_location(&self) -> Result<DeviceLocation, Error> {
        self.location().ok_or(Error::NotDetected)
    }

    fn set_location(&self, location: Option<DeviceLocation>) {
        if let Ok(mut guard) = self.inner.location.lock() {
            *guard = location;
        }
    }
}

impl LiveEditSink for SessionInner {
    fn channel(&self) -> Option<u8> {
        self.location
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|l| l.channel))
    }

    fn send_updates(&self, messages: &[MidiMessage]) {
        let Some(location) = self.location.lock().ok().and_then(|g| (*g).clone()) else {
            return;
        };
        // The in-memory write already happened; a failed device send
        // leaves patch and synth out of sync by design
        if let Err(e) = self.transport.send(&location.output_port, messages) {
            log::warn!("SynthSession: Failed to send live updates: {}", e);
        }
    }
}

fn lock(patch: &Arc<Mutex<Patch>>) -> Result<std::sync::MutexGuard<'_, Patch>, Error> {
    patch
        .lock()
        .map_err(|_| Error::InternalInconsistency("patch lock poisoned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{
        DetectionCapability, EditBufferCapability, GlobalSettingsCapability,
        ProgramDumpCapability,
    };
    use crate::transport::{MessageCallback, MessageDispatcher, SubscriptionToken, TransportError};
    use patchrig_core::{
        ByteRange, CatalogSpec, ParamCatalog, ParamDescriptor, ParamKind, Property,
        PropertyValue, Value,
    };
    use std::thread;
    use std::time::Instant;

    const PATCH_SIZE: usize = 16;
    const EDIT_BUFFER_DUMP: u8 = 0x01;
    const EDIT_BUFFER_REQUEST: u8 = 0x06;
    const PROGRAM_DUMP: u8 = 0x02;
    const INQUIRY: u8 = 0x7E;
    const INQUIRY_REPLY: u8 = 0x7F;
    const SETTINGS_REQUEST: u8 = 0x10;
    const SETTINGS_DUMP: u8 = 0x11;

    fn test_catalog() -> Arc<ParamCatalog> {
        let spec = CatalogSpec {
            name: "Fake Synth".to_string(),
            patch_size: PATCH_SIZE,
            name_range: Some(ByteRange { offset: 0, len: 4 }),
            layers: None,
            layer_name_range: None,
            params: vec![ParamDescriptor {
                name: "cutoff".to_string(),
                kind: ParamKind::Int,
                offset: 4,
                len: 1,
                per_layer: false,
                lookup: None,
                live_edit: None,
            }],
        };
        Arc::new(ParamCatalog::new(spec).unwrap())
    }

    /// Adapter for a simple fake synth with a one-byte opcode protocol
    struct FakeDevice {
        catalog: Arc<ParamCatalog>,
        with_edit_buffer: bool,
        with_program_dump: bool,
        with_settings: bool,
    }

    impl FakeDevice {
        fn new() -> Self {
            Self {
                catalog: test_catalog(),
                with_edit_buffer: true,
                with_program_dump: true,
                with_settings: true,
            }
        }

        fn opcode(message: &MidiMessage) -> Option<u8> {
            message.sysex_payload().and_then(|p| p.get(1)).copied()
        }
    }

    impl DetectionCapability for FakeDevice {
        fn inquiry(&self) -> Vec<MidiMessage> {
            vec![MidiMessage::sysex(&[0x7D, INQUIRY])]
        }

        fn matches_inquiry_reply(&self, message: &MidiMessage) -> Option<u8> {
            let payload = message.sysex_payload()?;
            if payload.first() == Some(&0x7D) && payload.get(1) == Some(&INQUIRY_REPLY) {
                payload.get(2).copied()
            } else {
                None
            }
        }
    }

    impl EditBufferCapability for FakeDevice {
        fn request_dump(&self, channel: u8) -> Vec<MidiMessage> {
            vec![MidiMessage::sysex(&[0x7D, EDIT_BUFFER_REQUEST, channel])]
        }

        fn is_edit_buffer_dump(&self, message: &MidiMessage) -> bool {
            Self::opcode(message) == Some(EDIT_BUFFER_DUMP)
        }

        fn patch_to_sysex(&self, patch: &Patch) -> Vec<MidiMessage> {
            let mut payload = vec![0x7D, EDIT_BUFFER_DUMP];
            payload.extend_from_slice(patch.data());
            vec![MidiMessage::sysex(&payload)]
        }
    }

    impl ProgramDumpCapability for FakeDevice {
        fn patch_to_program_dump(&self, patch: &Patch, program: u32) -> Vec<MidiMessage> {
            let mut payload = vec![0x7D, PROGRAM_DUMP, program as u8];
            payload.extend_from_slice(patch.data());
            vec![MidiMessage::sysex(&payload)]
        }
    }

    impl GlobalSettingsCapability for FakeDevice {
        fn request_dump(&self, channel: u8) -> Vec<MidiMessage> {
            vec![MidiMessage::sysex(&[0x7D, SETTINGS_REQUEST, channel])]
        }

        fn is_settings_dump(&self, message: &MidiMessage) -> bool {
            Self::opcode(message) == Some(SETTINGS_DUMP)
        }

        fn parse_settings(&self, message: &MidiMessage) -> Result<Vec<Property>, Error> {
            let payload = message
                .sysex_payload()
                .ok_or_else(|| Error::ParseFailure("not sysex".to_string()))?;
            let tune = *payload
                .get(2)
                .ok_or_else(|| Error::ParseFailure("settings dump too short".to_string()))?;
            Ok(vec![
                Property {
                    name: "Master Tune".to_string(),
                    value: PropertyValue::Int(tune as i64),
                },
                Property {
                    name: "Local Control".to_string(),
                    value: PropertyValue::Bool(payload.get(3) == Some(&1)),
                },
            ])
        }
    }

    impl DeviceAdapter for FakeDevice {
        fn name(&self) -> &str {
            "Fake Synth"
        }

        fn catalog(&self) -> Arc<ParamCatalog> {
            self.catalog.clone()
        }

        fn load_sysex(&self, messages: &[MidiMessage]) -> Vec<Patch> {
            let mut patches = Vec::new();
            for message in messages {
                let Some(payload) = message.sysex_payload() else { continue };
                if payload.first() != Some(&0x7D) {
                    continue;
                }
                let data = match payload.get(1) {
                    Some(&EDIT_BUFFER_DUMP) => &payload[2..],
                    Some(&PROGRAM_DUMP) => &payload[3..],
                    _ => continue,
                };
                if let Ok(patch) = Patch::from_data(self.catalog.clone(), data.to_vec()) {
                    patches.push(patch);
                }
            }
            patches
        }

        fn detection(&self) -> Option<&dyn DetectionCapability> {
            Some(self)
        }

        fn edit_buffer(&self) -> Option<&dyn EditBufferCapability> {
            self.with_edit_buffer.then_some(self as &dyn EditBufferCapability)
        }

        fn program_dump(&self) -> Option<&dyn ProgramDumpCapability> {
            self.with_program_dump.then_some(self as &dyn ProgramDumpCapability)
        }

        fn global_settings(&self) -> Option<&dyn GlobalSettingsCapability> {
            self.with_settings.then_some(self as &dyn GlobalSettingsCapability)
        }
    }

    /// Transport wired to a scripted fake synth on port "fake out"
    struct ScriptedTransport {
        dispatcher: Arc<MessageDispatcher>,
        sent: Mutex<Vec<(String, MidiMessage)>>,
        /// Answer inquiries (with this channel)
        detection_channel: Option<u8>,
        /// Answer edit buffer requests with this patch data
        edit_buffer_data: Option<Vec<u8>>,
        /// Answer settings requests
        settings_reply: Option<Vec<u8>>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                dispatcher: Arc::new(MessageDispatcher::new()),
                sent: Mutex::new(Vec::new()),
                detection_channel: Some(3),
                edit_buffer_data: Some(vec![0u8; PATCH_SIZE]),
                settings_reply: Some(vec![0x7D, SETTINGS_DUMP, 12, 1]),
            }
        }

        fn reply_later(&self, reply: MidiMessage) {
            let dispatcher = self.dispatcher.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                dispatcher.dispatch(&reply);
            });
        }
    }

    impl MidiTransport for ScriptedTransport {
        fn output_ports(&self) -> Vec<String> {
            vec!["silent out".to_string(), "fake out".to_string()]
        }

        fn send(&self, port: &str, messages: &[MidiMessage]) -> Result<(), TransportError> {
            for message in messages {
                self.sent
                    .lock()
                    .unwrap()
                    .push((port.to_string(), message.clone()));

                if port != "fake out" {
                    continue;
                }
                match FakeDevice::opcode(message) {
                    Some(INQUIRY) => {
                        if let Some(channel) = self.detection_channel {
                            self.reply_later(MidiMessage::sysex(&[
                                0x7D,
                                INQUIRY_REPLY,
                                channel,
                            ]));
                        }
                    }
                    Some(EDIT_BUFFER_REQUEST) => {
                        if let Some(data) = &self.edit_buffer_data {
                            let mut payload = vec![0x7D, EDIT_BUFFER_DUMP];
                            payload.extend_from_slice(data);
                            self.reply_later(MidiMessage::sysex(&payload));
                        }
                    }
                    Some(SETTINGS_REQUEST) => {
                        if let Some(payload) = &self.settings_reply {
                            self.reply_later(MidiMessage::sysex(payload));
                        }
                    }
                    _ => {}
                }
            }
            Ok(())
        }

        fn subscribe(&self, callback: MessageCallback) -> SubscriptionToken {
            self.dispatcher.register(callback)
        }

        fn unsubscribe(&self, token: SubscriptionToken) {
            self.dispatcher.deregister(token);
        }
    }

    fn session_with(transport: ScriptedTransport) -> (SynthSession, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        let session = SynthSession::with_reply_timeout(
            transport.clone(),
            Arc::new(FakeDevice::new()),
            Duration::from_millis(250),
        );
        (session, transport)
    }

    #[test]
    fn test_edit_buffer_requires_detection() {
        let (session, _transport) = session_with(ScriptedTransport::new());
        assert!(!session.detected());
        assert!(matches!(session.edit_buffer(), Err(Error::NotDetected)));
        assert!(matches!(session.global_settings(), Err(Error::NotDetected)));
    }

    #[test]
    fn test_detect_records_location() {
        let (session, _transport) = session_with(ScriptedTransport::new());
        session.detect();
        assert!(session.detected());
        let location = session.location().unwrap();
        assert_eq!(location.output_port, "fake out");
        assert_eq!(location.channel, 3);
        assert!(session.location_text().contains("fake out"));
    }

    #[test]
    fn test_detect_without_device_leaves_undetected() {
        let mut transport = ScriptedTransport::new();
        transport.detection_channel = None;
        let (session, _transport) = session_with(transport);
        session.detect();
        assert!(!session.detected());
        assert_eq!(session.location_text(), "not detected");
    }

    #[test]
    fn test_edit_buffer_round_trip() {
        let mut transport = ScriptedTransport::new();
        let mut data = vec![0u8; PATCH_SIZE];
        data[4] = 77; // cutoff byte
        transport.edit_buffer_data = Some(data);

        let (session, _transport) = session_with(transport);
        session.detect();

        let view = session.edit_buffer().unwrap();
        assert_eq!(view.get_attr("cutoff").unwrap(), Value::Int(77));
    }

    #[test]
    fn test_edit_buffer_timeout_on_silent_device() {
        let mut transport = ScriptedTransport::new();
        transport.edit_buffer_data = None;
        let (session, transport) = session_with(transport);
        session.detect();
        assert!(session.detected());

        let started = Instant::now();
        let result = session.edit_buffer();
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(Error::Timeout)));
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed < Duration::from_millis(2000), "took {:?}", elapsed);
        assert_eq!(transport.dispatcher.listener_count(), 0);
    }

    #[test]
    fn test_edit_buffer_without_capability() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut device = FakeDevice::new();
        device.with_edit_buffer = false;
        let session = SynthSession::new(transport, Arc::new(device));
        session.detect();

        assert!(matches!(
            session.edit_buffer(),
            Err(Error::CapabilityMissing("edit buffer retrieval"))
        ));
    }

    #[test]
    fn test_global_settings() {
        let (session, _transport) = session_with(ScriptedTransport::new());
        session.detect();

        let settings = session.global_settings().unwrap();
        assert_eq!(
            settings.get("Master Tune").unwrap(),
            &PropertyValue::Int(12)
        );
        assert_eq!(
            settings.get("Local Control").unwrap(),
            &PropertyValue::Bool(true)
        );
    }

    #[test]
    fn test_sysex_save_and_load() {
        let (session, _transport) = session_with(ScriptedTransport::new());
        let path = std::env::temp_dir().join(format!(
            "patchrig-session-test-{}.syx",
            std::process::id()
        ));

        let view = session.view_for(Patch::new(test_catalog()));
        view.set_attr("cutoff", 42).unwrap();
        view.set_name("Acid").unwrap();

        session.save_sysex(&path, std::slice::from_ref(&view)).unwrap();
        let loaded = session.load_sysex(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].get_attr("cutoff").unwrap(), Value::Int(42));
        assert_eq!(loaded[0].name().unwrap(), "Acid");
    }

    #[test]
    fn test_save_sysex_without_program_dump() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut device = FakeDevice::new();
        device.with_program_dump = false;
        let session = SynthSession::new(transport, Arc::new(device));

        let view = session.view_for(Patch::new(test_catalog()));
        let path = std::env::temp_dir().join("patchrig-never-written.syx");
        assert!(matches!(
            session.save_sysex(&path, std::slice::from_ref(&view)),
            Err(Error::CapabilityMissing("program dump"))
        ));
    }

    #[test]
    fn test_save_edit_buffer_file() {
        let (session, _transport) = session_with(ScriptedTransport::new());
        let path = std::env::temp_dir().join(format!(
            "patchrig-editbuf-test-{}.syx",
            std::process::id()
        ));

        let view = session.view_for(Patch::new(test_catalog()));
        view.set_attr("cutoff", 9).unwrap();
        session.save_edit_buffer(&path, &view).unwrap();

        let loaded = session.load_sysex(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].get_attr("cutoff").unwrap(), Value::Int(9));
    }

    #[test]
    fn test_live_edit_routes_through_session() {
        // Needs a catalog with a live-edit parameter
        let spec = CatalogSpec {
            name: "Live Synth".to_string(),
            patch_size: PATCH_SIZE,
            name_range: None,
            layers: None,
            layer_name_range: None,
            params: vec![ParamDescriptor {
                name: "cutoff".to_string(),
                kind: ParamKind::Int,
                offset: 4,
                len: 1,
                per_layer: false,
                lookup: None,
                live_edit: Some(patchrig_core::LiveEditSpec { nrpn: 102 }),
            }],
        };
        let catalog = Arc::new(ParamCatalog::new(spec).unwrap());

        let (session, transport) = session_with(ScriptedTransport::new());
        session.detect();

        let view = session.view_for(Patch::new(catalog));
        transport.sent.lock().unwrap().clear();
        view.set_attr("cutoff", 100).unwrap();

        // Four NRPN CC messages went to the detected output
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|(port, _)| port == "fake out"));
        assert_eq!(sent[0].1.bytes(), &[0xB3, 99, 0]);
    }

    #[test]
    fn test_live_edit_skipped_when_undetected() {
        let (session, transport) = session_with(ScriptedTransport::new());
        // No detect(): channel invalid, live path stays off
        let view = session.view_for(Patch::new(test_catalog()));
        view.set_attr("cutoff", 5).unwrap();
        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(view.get_attr("cutoff").unwrap(), Value::Int(5));
    }
}
