//! Identifier newtypes.
//!
//! Log records are identified by the integer id their store assigns, and
//! visual artifacts by whatever opaque handle the renderer hands back. Both
//! are wrapped so they cannot be mixed with plain integers or titles.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Identifier of a record within one append-only log.
///
/// Ids are assigned by the log producer and strictly increase within a
/// single source. They carry no meaning across sources.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct EventId(pub u64);

impl EventId {
    /// Return the inner integer value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }

    /// The id that follows this one, or `None` at `u64::MAX`.
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Opaque handle to an artifact created by a renderer.
///
/// The engine never interprets the contents; it only stores the handle
/// returned by `create` and passes it back on every `update`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct ArtifactHandle(pub String);

impl ArtifactHandle {
    /// Wrap a renderer-specific handle string.
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Borrow the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
