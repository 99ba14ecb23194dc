//! Patch byte storage
//!
//! A patch owns its byte buffer exclusively and carries the catalog it
//! was built against. All reads and writes go through bounds-checked
//! byte ranges; a range that falls outside the buffer indicates a
//! malformed catalog and surfaces as `InternalInconsistency`.

use crate::catalog::{ByteRange, ParamCatalog};
use crate::error::Error;
use std::sync::Arc;

/// One synthesizer sound/program as raw bytes plus its catalog
#[derive(Clone, Debug)]
pub struct Patch {
    data: Vec<u8>,
    catalog: Arc<ParamCatalog>,
}

impl Patch {
    /// Default-construct a zero-filled patch
    pub fn new(catalog: Arc<ParamCatalog>) -> Self {
        let data = vec![0u8; catalog.patch_size()];
        Self { data, catalog }
    }

    /// Build a patch from decoded device data
    pub fn from_data(catalog: Arc<ParamCatalog>, data: Vec<u8>) -> Result<Self, Error> {
        if data.len() != catalog.patch_size() {
            return Err(Error::ParseFailure(format!(
                "patch data is {} bytes, expected {}",
                data.len(),
                catalog.patch_size()
            )));
        }
        Ok(Self { data, catalog })
    }

    pub fn catalog(&self) -> &Arc<ParamCatalog> {
        &self.catalog
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Read a byte range
    pub fn read_range(&self, range: ByteRange) -> Result<&[u8], Error> {
        self.data
            .get(range.offset..range.end())
            .ok_or_else(|| out_of_range(range, self.data.len()))
    }

    /// Overwrite a byte range
    ///
    /// `bytes` must match the range length exactly; callers validate
    /// value lengths before getting here.
    pub fn write_range(&mut self, range: ByteRange, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() != range.len {
            return Err(Error::InternalInconsistency(format!(
                "write of {} bytes into range of {}",
                bytes.len(),
                range.len
            )));
        }
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(range.offset..range.end())
            .ok_or_else(|| out_of_range(range, len))?;
        slot.copy_from_slice(bytes);
        Ok(())
    }

    /// Number of layers (1 for non-layered patches)
    pub fn layer_count(&self) -> usize {
        self.catalog.layers().map(|l| l.count).unwrap_or(1)
    }

    pub fn is_layered(&self) -> bool {
        self.catalog.layers().is_some()
    }

    /// Stored whole-patch name
    pub fn name(&self) -> Result<String, Error> {
        let range = self
            .catalog
            .name_range()
            .ok_or(Error::CapabilityMissing("stored patch name"))?;
        Ok(text_from_bytes(self.read_range(range)?))
    }

    /// Change the stored whole-patch name (padded/truncated to fit)
    pub fn set_name(&mut self, name: &str) -> Result<(), Error> {
        let range = self
            .catalog
            .name_range()
            .ok_or(Error::CapabilityMissing("stored patch name"))?;
        let bytes = bytes_from_text(name, range.len);
        self.write_range(range, &bytes)
    }

    /// Stored name of one layer
    pub fn layer_name(&self, layer: usize) -> Result<String, Error> {
        let range = self.layer_name_location(layer)?;
        Ok(text_from_bytes(self.read_range(range)?))
    }

    /// Change the stored name of one layer
    pub fn set_layer_name(&mut self, layer: usize, name: &str) -> Result<(), Error> {
        let range = self.layer_name_location(layer)?;
        let bytes = bytes_from_text(name, range.len);
        self.write_range(range, &bytes)
    }

    fn layer_name_location(&self, layer: usize) -> Result<ByteRange, Error> {
        let layout = self.catalog.layers().ok_or(Error::NotLayered)?;
        if layer >= layout.count {
            return Err(Error::InvalidLayer {
                layer,
                count: layout.count,
            });
        }
        let base = self
            .catalog
            .layer_name_range()
            .ok_or(Error::CapabilityMissing("stored layer name"))?;
        Ok(ByteRange {
            offset: base.offset + layer * layout.stride,
            len: base.len,
        })
    }
}

fn out_of_range(range: ByteRange, size: usize) -> Error {
    Error::InternalInconsistency(format!(
        "byte range {}..{} outside patch of {} bytes",
        range.offset,
        range.end(),
        size
    ))
}

/// Decode stored name bytes: printable ASCII, trailing padding trimmed
fn text_from_bytes(bytes: &[u8]) -> String {
    let text: String = bytes
        .iter()
        .map(|&b| {
            if (0x20..0x7F).contains(&b) {
                b as char
            } else {
                ' '
            }
        })
        .collect();
    text.trim_end().to_string()
}

/// Encode a name into a fixed-size field, space padded
fn bytes_from_text(name: &str, len: usize) -> Vec<u8> {
    let mut bytes = vec![b' '; len];
    for (slot, c) in bytes.iter_mut().zip(name.chars()) {
        *slot = if c.is_ascii() && !c.is_control() {
            c as u8
        } else {
            b' '
        };
    }
    bytes
}
