//! Live-edit message generation
//!
//! When a synth is connected and a parameter carries an NRPN
//! assignment, value changes can be mirrored to the device as NRPN CC
//! quadruples (CC 99/98 select the parameter, CC 6/38 carry the
//! 14-bit value). Array parameters map to consecutive NRPN numbers,
//! one quadruple per element.

use crate::accessor::Value;
use crate::catalog::{ParamCatalog, ParamDescriptor};
use crate::message::MidiMessage;

/// Build device-ready update messages for a new parameter value
///
/// Returns an empty vector for descriptors without a live-edit
/// assignment; callers should probe `Capability::LiveEdit` first.
pub fn value_update_messages(
    catalog: &ParamCatalog,
    descriptor: &ParamDescriptor,
    layer: Option<usize>,
    value: &Value,
    channel: u8,
) -> Vec<MidiMessage> {
    let Some(spec) = descriptor.live_edit else {
        return Vec::new();
    };

    let mut nrpn = spec.nrpn;
    if let (Some(layer), Some(layout)) = (layer, catalog.layers()) {
        nrpn = nrpn.wrapping_add(layout.nrpn_stride.wrapping_mul(layer as u16));
    }

    let elements: Vec<i64> = match value {
        Value::Int(v) => vec![*v],
        Value::Array(values) => values.clone(),
    };

    let mut messages = Vec::with_capacity(elements.len() * 4);
    for (i, &element) in elements.iter().enumerate() {
        let number = nrpn.wrapping_add(i as u16);
        let v = element.clamp(0, 0x3FFF) as u16;
        messages.push(MidiMessage::cc(channel, 99, ((number >> 7) & 0x7F) as u8));
        messages.push(MidiMessage::cc(channel, 98, (number & 0x7F) as u8));
        messages.push(MidiMessage::cc(channel, 6, ((v >> 7) & 0x7F) as u8));
        messages.push(MidiMessage::cc(channel, 38, (v & 0x7F) as u8));
    }
    messages
}
