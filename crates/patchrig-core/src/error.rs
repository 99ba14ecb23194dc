//! Error taxonomy shared by patch access and device transactions
//!
//! One enum covers both halves of the library: construction-time
//! validation failures (`UnknownParameter`, `InvalidLayer`,
//! `UnsupportedCapability`) fail fast at the accessor/view boundary,
//! while `Timeout`/`NotDetected`/`ParseFailure` surface from the
//! session layer. `InternalInconsistency` marks catalog/patch
//! mismatches that are unreachable with a well-formed catalog and
//! should be treated as a bug in the catalog, not recovered from.

/// Error type for all patchrig operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("Missing capability: {0}")]
    CapabilityMissing(&'static str),

    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    #[error("Value length {actual} does not match parameter length {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Invalid layer {layer}, patch has {count} layer(s)")]
    InvalidLayer { layer: usize, count: usize },

    #[error("Patch is not layered")]
    NotLayered,

    #[error("Synth has not been detected yet, run detect() first")]
    NotDetected,

    #[error("Timed out waiting for device reply")]
    Timeout,

    #[error("Failed to parse device data: {0}")]
    ParseFailure(String),

    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    #[error("MIDI transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
